//! Execution guard.
//!
//! Consulted immediately before the account applies a call. Checks run in a
//! fixed order and the first failure wins:
//!
//! 1. account frozen ([`GovernanceError::DaoFrozen`])
//! 2. no timelock covers the hash ([`GovernanceError::NotTimelocked`])
//! 3. timelock period not over ([`GovernanceError::StillTimelocked`])
//! 4. execution deadline passed ([`GovernanceError::Expired`])
//! 5. hash vetoed ([`GovernanceError::Vetoed`])
//!
//! The guard only reads the freeze and veto tracks.

use crate::clock::SharedClock;
use crate::error::{GovernanceError, GovernanceResult};
use crate::freeze::{FreezeConsensus, VetoConsensus};
use crate::governor::TimelockRecord;
use crate::types::TxHash;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ExecutionGuard {
    freeze: Arc<RwLock<FreezeConsensus>>,
    veto: Arc<RwLock<VetoConsensus>>,
    clock: SharedClock,
}

impl ExecutionGuard {
    pub fn new(
        freeze: Arc<RwLock<FreezeConsensus>>,
        veto: Arc<RwLock<VetoConsensus>>,
        clock: SharedClock,
    ) -> Self {
        Self {
            freeze,
            veto,
            clock,
        }
    }

    /// Decide whether the call hashed to `tx_hash` may run. `record` is the
    /// timelock covering it, if any.
    pub fn check_transaction(
        &self,
        tx_hash: &TxHash,
        record: Option<TimelockRecord>,
    ) -> GovernanceResult<()> {
        let result = self.evaluate(tx_hash, record);
        match &result {
            Ok(()) => debug!(tx_hash = %tx_hash, "guard allowed transaction"),
            Err(e) => warn!(tx_hash = %tx_hash, error = %e, "guard denied transaction"),
        }
        result
    }

    fn evaluate(&self, tx_hash: &TxHash, record: Option<TimelockRecord>) -> GovernanceResult<()> {
        if self.is_frozen() {
            return Err(GovernanceError::DaoFrozen);
        }
        let record = record.ok_or(GovernanceError::NotTimelocked(*tx_hash))?;
        let now = self.clock.now();
        if !record.timelock_elapsed(now) {
            return Err(GovernanceError::StillTimelocked(*tx_hash));
        }
        if record.deadline_elapsed(now) {
            return Err(GovernanceError::Expired(*tx_hash));
        }
        if self.is_vetoed(tx_hash) {
            return Err(GovernanceError::Vetoed(*tx_hash));
        }
        Ok(())
    }

    pub fn is_vetoed(&self, tx_hash: &TxHash) -> bool {
        self.veto
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get_is_vetoed(tx_hash)
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_frozen()
    }
}
