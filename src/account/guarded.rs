//! Direct owner execution behind the execution guard.

use super::traits::SafeAccount;
use crate::error::{GovernanceError, GovernanceResult};
use crate::governor::{DirectExecutionLedger, TimelockLookup};
use crate::guard::ExecutionGuard;
use crate::serialization::hash_transaction;
use crate::types::{Transaction, TxHash};
use tracing::{info, warn};

/// An account whose direct execution path consults the guard first.
///
/// The module path (`inner_mut().execute_from_module`) is left to the
/// governor, which runs its own checks.
pub struct GuardedAccount<A: SafeAccount> {
    inner: A,
    guard: ExecutionGuard,
}

impl<A: SafeAccount> GuardedAccount<A> {
    pub fn new(inner: A, guard: ExecutionGuard) -> Self {
        Self { inner, guard }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut A {
        &mut self.inner
    }

    pub fn guard(&self) -> &ExecutionGuard {
        &self.guard
    }

    /// Run `tx` through the guard, then the account's direct path. A call
    /// that succeeds is recorded with `ledger`, which stops it passing the
    /// guard again.
    pub fn execute(
        &mut self,
        tx: &Transaction,
        ledger: &mut dyn DirectExecutionLedger,
    ) -> GovernanceResult<TxHash> {
        let tx_hash = hash_transaction(tx)?;
        let record = ledger.timelock_record(&tx_hash);
        self.guard.check_transaction(&tx_hash, record)?;
        let proposal_id = record
            .map(|r| r.proposal_id)
            .ok_or(GovernanceError::NotTimelocked(tx_hash))?;
        if !self.inner.execute(tx) {
            warn!(tx_hash = %tx_hash, "direct execution failed");
            return Err(GovernanceError::UnderlyingExecutionFailed(tx_hash));
        }
        let index = ledger.record_direct_execution(proposal_id, &tx_hash)?;
        info!(tx_hash = %tx_hash, proposal_id, index, "direct execution succeeded");
        Ok(tx_hash)
    }
}
