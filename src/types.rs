//! Shared domain types.
//!
//! Addresses identify voters, owners, strategies and call targets. Transactions
//! are opaque calls; their identity is the content hash computed in
//! [`crate::serialization::hash_transaction`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unix timestamp in seconds. Every period in this crate uses the same unit.
pub type Timestamp = u64;

/// Monotonically increasing proposal identifier, assigned at submission.
pub type ProposalId = u32;

/// Voting weight (token balance, summed NFT weight, or member count).
pub type Weight = u128;

/// Account identifier (20 bytes, rendered as `0x`-prefixed hex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Build an address whose last eight bytes encode `n`. Handy for fixtures.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Parse errors for hex identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], ParseIdError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(trimmed).map_err(|e| ParseIdError::Hex(e.to_string()))?;
    if bytes.len() != N {
        return Err(ParseIdError::Length {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

impl FromStr for Address {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Address)
    }
}

/// Content hash of a [`Transaction`] (SHA-256 over its canonical encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(TxHash)
    }
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let s = String::deserialize(d)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(Address);
hex_serde!(TxHash);

/// How the account dispatches a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    #[default]
    Call,
    DelegateCall,
}

/// A single opaque call carried out by the guarded account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub target: Address,
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub call_type: CallType,
}

impl Transaction {
    pub fn call(target: Address, value: u128, payload: Vec<u8>) -> Self {
        Self {
            target,
            value,
            payload,
            call_type: CallType::Call,
        }
    }
}

/// Ballot options. Discriminants match the wire order used by voters (0 = no).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    No,
    Yes,
    Abstain,
}

/// NFT used as voting weight proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    pub collection: Address,
    pub token_id: u64,
}

/// Extra data a voter supplies to prove weight. Fungible and member strategies
/// ignore it; the NFT strategy requires `Tokens`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightProof {
    #[default]
    None,
    Tokens(Vec<TokenRef>),
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display_and_parse() {
        let addr = Address::from_low_u64(0xbeef);
        let text = addr.to_string();
        assert_eq!(text, "0x000000000000000000000000000000000000beef");
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_parse_rejects_wrong_length() {
        let err = "0xdeadbeef".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            ParseIdError::Length {
                expected: 20,
                actual: 4
            }
        );
    }

    #[test]
    fn test_transaction_json_uses_hex_payload() {
        let tx = Transaction::call(Address::from_low_u64(1), 5, vec![0xab, 0xcd]);
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"abcd\""));
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
    }
}
