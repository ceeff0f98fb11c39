//! In-memory weight sources for tests and the scenario simulator.
//!
//! Both ledgers are cheap to clone; clones share state, so a test can keep a
//! handle and move tokens around after the ledger was handed to a strategy.

use super::traits::*;
use crate::types::{Address, Timestamp, Weight};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Checkpointed fungible token ledger.
#[derive(Clone, Default)]
pub struct MockTokenLedger {
    state: Arc<RwLock<TokenState>>,
}

#[derive(Default)]
struct TokenState {
    /// holder -> ascending (timestamp, balance) checkpoints
    balances: HashMap<Address, Vec<(Timestamp, Weight)>>,
    supply: Vec<(Timestamp, Weight)>,
}

/// Ledger errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{holder} has {available}, needs {requested}")]
    InsufficientBalance {
        holder: Address,
        available: Weight,
        requested: Weight,
    },

    #[error("Token {collection}#{token_id} not owned by {holder}")]
    NotTokenOwner {
        collection: Address,
        token_id: u64,
        holder: Address,
    },

    #[error("Token {collection}#{token_id} already minted")]
    AlreadyMinted { collection: Address, token_id: u64 },
}

fn value_at(checkpoints: &[(Timestamp, Weight)], at: Timestamp) -> Weight {
    let idx = checkpoints.partition_point(|(t, _)| *t <= at);
    if idx == 0 {
        0
    } else {
        checkpoints[idx - 1].1
    }
}

fn latest(checkpoints: &[(Timestamp, Weight)]) -> Weight {
    checkpoints.last().map(|(_, v)| *v).unwrap_or(0)
}

fn write_checkpoint(checkpoints: &mut Vec<(Timestamp, Weight)>, at: Timestamp, value: Weight) {
    match checkpoints.last_mut() {
        Some((t, v)) if *t == at => *v = value,
        _ => checkpoints.push((at, value)),
    }
}

impl MockTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` to `to` at time `at`.
    pub fn mint(&self, to: Address, amount: Weight, at: Timestamp) {
        let mut s = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let balance = s.balances.entry(to).or_default();
        let next = latest(balance).saturating_add(amount);
        write_checkpoint(balance, at, next);
        let supply = latest(&s.supply).saturating_add(amount);
        write_checkpoint(&mut s.supply, at, supply);
    }

    /// Move `amount` from `from` to `to` at time `at`.
    pub fn transfer(
        &self,
        from: Address,
        to: Address,
        amount: Weight,
        at: Timestamp,
    ) -> Result<(), LedgerError> {
        let mut s = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let available = s.balances.get(&from).map(|c| latest(c)).unwrap_or(0);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: from,
                available,
                requested: amount,
            });
        }
        let from_cp = s.balances.entry(from).or_default();
        write_checkpoint(from_cp, at, available - amount);
        let to_cp = s.balances.entry(to).or_default();
        let to_next = latest(to_cp).saturating_add(amount);
        write_checkpoint(to_cp, at, to_next);
        Ok(())
    }

    /// Latest balance.
    pub fn balance_of(&self, holder: &Address) -> Weight {
        let s = self.state.read().unwrap_or_else(PoisonError::into_inner);
        s.balances.get(holder).map(|c| latest(c)).unwrap_or(0)
    }
}

impl FungibleWeights for MockTokenLedger {
    fn past_votes(&self, holder: &Address, at: Timestamp) -> Weight {
        let s = self.state.read().unwrap_or_else(PoisonError::into_inner);
        s.balances.get(holder).map(|c| value_at(c, at)).unwrap_or(0)
    }

    fn past_total_supply(&self, at: Timestamp) -> Weight {
        let s = self.state.read().unwrap_or_else(PoisonError::into_inner);
        value_at(&s.supply, at)
    }
}

/// NFT ownership registry.
#[derive(Clone, Default)]
pub struct MockNftRegistry {
    owners: Arc<RwLock<HashMap<(Address, u64), Address>>>,
}

impl MockNftRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, collection: Address, token_id: u64, to: Address) -> Result<(), LedgerError> {
        let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
        if owners.contains_key(&(collection, token_id)) {
            return Err(LedgerError::AlreadyMinted {
                collection,
                token_id,
            });
        }
        owners.insert((collection, token_id), to);
        Ok(())
    }

    pub fn transfer(
        &self,
        collection: Address,
        token_id: u64,
        from: Address,
        to: Address,
    ) -> Result<(), LedgerError> {
        let mut owners = self.owners.write().unwrap_or_else(PoisonError::into_inner);
        match owners.get_mut(&(collection, token_id)) {
            Some(owner) if *owner == from => {
                *owner = to;
                Ok(())
            }
            _ => Err(LedgerError::NotTokenOwner {
                collection,
                token_id,
                holder: from,
            }),
        }
    }
}

impl NftRegistry for MockNftRegistry {
    fn owner_of(&self, collection: &Address, token_id: u64) -> Option<Address> {
        let owners = self.owners.read().unwrap_or_else(PoisonError::into_inner);
        owners.get(&(*collection, token_id)).copied()
    }

    fn owned_ids(&self, holder: &Address, collection: &Address) -> BTreeSet<u64> {
        let owners = self.owners.read().unwrap_or_else(PoisonError::into_inner);
        owners
            .iter()
            .filter(|((c, _), owner)| c == collection && *owner == holder)
            .map(|((_, id), _)| *id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn test_checkpoints_freeze_past_balances() {
        let ledger = MockTokenLedger::new();
        ledger.mint(addr(1), 300, 10);
        ledger.mint(addr(2), 300, 10);
        ledger.transfer(addr(1), addr(2), 100, 20).unwrap();

        assert_eq!(ledger.past_votes(&addr(1), 9), 0);
        assert_eq!(ledger.past_votes(&addr(1), 10), 300);
        assert_eq!(ledger.past_votes(&addr(1), 19), 300);
        assert_eq!(ledger.past_votes(&addr(1), 20), 200);
        assert_eq!(ledger.past_votes(&addr(2), 25), 400);
        assert_eq!(ledger.past_total_supply(15), 600);
        assert_eq!(ledger.balance_of(&addr(2)), 400);
    }

    #[test]
    fn test_transfer_rejects_overdraft() {
        let ledger = MockTokenLedger::new();
        ledger.mint(addr(1), 5, 0);
        let err = ledger.transfer(addr(1), addr(2), 6, 1).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(&addr(1)), 5);
    }

    #[test]
    fn test_nft_registry_ownership() {
        let registry = MockNftRegistry::new();
        let collection = addr(100);
        registry.mint(collection, 1, addr(1)).unwrap();
        registry.mint(collection, 2, addr(1)).unwrap();
        assert!(registry.mint(collection, 2, addr(3)).is_err());

        registry.transfer(collection, 2, addr(1), addr(2)).unwrap();
        assert_eq!(registry.owner_of(&collection, 2), Some(addr(2)));
        assert_eq!(
            registry.owned_ids(&addr(1), &collection),
            BTreeSet::from([1])
        );
        assert!(registry.transfer(collection, 2, addr(1), addr(3)).is_err());
    }

    #[test]
    fn test_voter_weight_adapters() {
        let ledger = MockTokenLedger::new();
        ledger.mint(addr(1), 42, 0);
        let holders = TokenHolderWeights::new(Arc::new(ledger));
        assert_eq!(holders.weight_of(&addr(1), 5), 42);

        let registry = MockNftRegistry::new();
        registry.mint(addr(100), 1, addr(1)).unwrap();
        registry.mint(addr(100), 2, addr(1)).unwrap();
        registry.mint(addr(200), 1, addr(1)).unwrap();
        let nft = NftHolderWeights::new(
            Arc::new(registry),
            [(addr(100), 10), (addr(200), 3)].into_iter().collect(),
        );
        assert_eq!(nft.weight_of(&addr(1), 0), 23);

        let owners = OwnerSetWeights::new([addr(1), addr(2)]);
        assert_eq!(owners.weight_of(&addr(2), 0), 1);
        assert_eq!(owners.weight_of(&addr(3), 0), 0);
    }
}
