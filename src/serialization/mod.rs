//! Canonical encoding and content hashing of transactions.
//!
//! Transactions are encoded as CBOR via `ciborium` (deterministic for a fixed
//! field order) and hashed with SHA-256 under a domain tag. The resulting
//! [`TxHash`] is what proposals store, what the guard checks and what veto
//! votes are cast against.

use crate::types::{CallType, Transaction, TxHash};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Domain separation tag prepended to every transaction hash preimage.
const TX_HASH_DOMAIN: &[u8] = b"tollgate-tx-v1";

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// CBOR encoding failed.
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decoding failed: {0}")]
    Decode(String),
}

/// Serialize to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SerializationError::Encode(format!("{:?}", e)))?;
    Ok(bytes)
}

/// Deserialize from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    ciborium::from_reader(bytes).map_err(|e| SerializationError::Decode(format!("{:?}", e)))
}

/// Field layout that feeds the hash. Byte strings rather than the hex text
/// used in JSON, so the preimage does not depend on display formatting.
#[derive(Serialize)]
struct CanonicalTransaction<'a> {
    target: &'a [u8],
    value: u128,
    #[serde(with = "serde_bytes_slice")]
    payload: &'a [u8],
    call_type: u8,
}

mod serde_bytes_slice {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &&[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }
}

/// Content hash of a transaction.
pub fn hash_transaction(tx: &Transaction) -> Result<TxHash, SerializationError> {
    let canonical = CanonicalTransaction {
        target: tx.target.as_bytes(),
        value: tx.value,
        payload: &tx.payload,
        call_type: match tx.call_type {
            CallType::Call => 0,
            CallType::DelegateCall => 1,
        },
    };
    let encoded = to_cbor(&canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(TX_HASH_DOMAIN);
    hasher.update(&encoded);
    Ok(TxHash(hasher.finalize().into()))
}

impl From<SerializationError> for crate::error::GovernanceError {
    fn from(e: SerializationError) -> Self {
        crate::error::GovernanceError::Serialization(e.to_string())
    }
}
