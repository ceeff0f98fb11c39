//! Trait abstractions for external weight sources.
//!
//! Token balances and NFT ownership live outside this crate. Strategies and
//! the freeze/veto tracks only ever read them through these traits, which lets
//! tests and the simulator swap in the in-memory ledgers from
//! [`super::mock`].

use crate::types::{Address, Timestamp, Weight};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Checkpoint to read for a snapshot taken at `snapshot`.
///
/// Balances are read as of the previous second, so tokens moved during the
/// snapshot second itself count for neither wallet.
pub fn checkpoint_before(snapshot: Timestamp) -> Timestamp {
    snapshot.saturating_sub(1)
}

/// Checkpointed fungible voting weight (balance or delegated votes).
pub trait FungibleWeights: Send + Sync {
    /// Weight of `holder` as of `at`. Changes after `at` must not affect the result.
    fn past_votes(&self, holder: &Address, at: Timestamp) -> Weight;

    /// Total supply as of `at`.
    fn past_total_supply(&self, at: Timestamp) -> Weight;
}

/// Non-fungible ownership lookups.
pub trait NftRegistry: Send + Sync {
    /// Current owner of `token_id` in `collection`, if minted.
    fn owner_of(&self, collection: &Address, token_id: u64) -> Option<Address>;

    /// Every id of `collection` currently held by `holder`.
    fn owned_ids(&self, holder: &Address, collection: &Address) -> BTreeSet<u64>;
}

/// Weight of a single voter, as used by the freeze and veto tracks.
pub trait VoterWeights: Send + Sync {
    /// Weight of `voter` for a window opened at `snapshot`. Checkpointed
    /// sources read strictly before `snapshot` (see [`checkpoint_before`]).
    fn weight_of(&self, voter: &Address, snapshot: Timestamp) -> Weight;
}

/// Fungible token holders, weighted by checkpointed votes.
#[derive(Clone)]
pub struct TokenHolderWeights {
    source: Arc<dyn FungibleWeights>,
}

impl TokenHolderWeights {
    pub fn new(source: Arc<dyn FungibleWeights>) -> Self {
        Self { source }
    }
}

impl VoterWeights for TokenHolderWeights {
    fn weight_of(&self, voter: &Address, snapshot: Timestamp) -> Weight {
        self.source.past_votes(voter, checkpoint_before(snapshot))
    }
}

/// NFT holders: every owned id in a registered collection counts for that
/// collection's weight.
#[derive(Clone)]
pub struct NftHolderWeights {
    registry: Arc<dyn NftRegistry>,
    collections: BTreeMap<Address, Weight>,
}

impl NftHolderWeights {
    pub fn new(registry: Arc<dyn NftRegistry>, collections: BTreeMap<Address, Weight>) -> Self {
        Self {
            registry,
            collections,
        }
    }
}

impl VoterWeights for NftHolderWeights {
    // Ownership has no checkpoints, so the snapshot is ignored.
    fn weight_of(&self, voter: &Address, _snapshot: Timestamp) -> Weight {
        self.collections
            .iter()
            .map(|(collection, weight)| {
                let held = self.registry.owned_ids(voter, collection).len() as Weight;
                held.saturating_mul(*weight)
            })
            .fold(0, Weight::saturating_add)
    }
}

/// Fixed owner set (multisig-style): each owner has weight 1.
#[derive(Debug, Clone, Default)]
pub struct OwnerSetWeights {
    owners: BTreeSet<Address>,
}

impl OwnerSetWeights {
    pub fn new(owners: impl IntoIterator<Item = Address>) -> Self {
        Self {
            owners: owners.into_iter().collect(),
        }
    }

    pub fn is_owner(&self, who: &Address) -> bool {
        self.owners.contains(who)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl VoterWeights for OwnerSetWeights {
    fn weight_of(&self, voter: &Address, _snapshot: Timestamp) -> Weight {
        Weight::from(self.is_owner(voter))
    }
}
