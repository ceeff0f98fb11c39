//! Proposal records and derived state.

use crate::error::GovernanceResult;
use crate::types::{Address, ProposalId, Timestamp, Transaction, TxHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state, derived on every read from the stored record and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalState {
    /// Voting open, or voting over and passed but not yet timelocked.
    Active,
    Canceled,
    /// Voting over without passing. Never timelocked.
    Failed,
    TimeLocked,
    Executable,
    /// Some but not all transactions executed, deadline not reached.
    Executing,
    Executed,
    Expired,
}

impl ProposalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalState::Canceled
                | ProposalState::Failed
                | ProposalState::Executed
                | ProposalState::Expired
        )
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProposalState::Active => "active",
            ProposalState::Canceled => "canceled",
            ProposalState::Failed => "failed",
            ProposalState::TimeLocked => "timelocked",
            ProposalState::Executable => "executable",
            ProposalState::Executing => "executing",
            ProposalState::Executed => "executed",
            ProposalState::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Timing of a timelocked proposal, as seen by the guard and veto track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockRecord {
    pub proposal_id: ProposalId,
    pub timelocked_at: Timestamp,
    pub timelock_period: u64,
    pub execution_period: u64,
}

impl TimelockRecord {
    /// First instant execution is allowed.
    pub fn timelock_end(&self) -> Timestamp {
        self.timelocked_at.saturating_add(self.timelock_period)
    }

    /// Last instant execution is allowed.
    pub fn deadline(&self) -> Timestamp {
        self.timelock_end().saturating_add(self.execution_period)
    }

    pub fn timelock_elapsed(&self, now: Timestamp) -> bool {
        now >= self.timelock_end()
    }

    pub fn deadline_elapsed(&self, now: Timestamp) -> bool {
        now > self.deadline()
    }
}

/// Resolves a transaction hash to the timelock that currently covers it.
pub trait TimelockLookup {
    fn timelock_record(&self, tx_hash: &TxHash) -> Option<TimelockRecord>;
}

/// A [`TimelockLookup`] that also learns about calls the account ran on its
/// direct path, so they can never run a second time on either path.
pub trait DirectExecutionLedger: TimelockLookup {
    /// Mark the first pending position of `tx_hash` in `proposal_id` as
    /// executed and return its index.
    fn record_direct_execution(
        &mut self,
        proposal_id: ProposalId,
        tx_hash: &TxHash,
    ) -> GovernanceResult<usize>;
}

/// Where a call lands on the module path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPosition {
    /// The call is the next one to run, at this index.
    Ready(usize),
    /// The call is not next; this index is.
    Mismatch(usize),
    /// Nothing left to run.
    Done,
}

/// A submitted batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub strategy: Address,
    pub proposer: Address,
    pub transactions: Vec<Transaction>,
    pub tx_hashes: Vec<TxHash>,
    pub metadata: String,
    /// One mark per transaction, set by whichever path ran it.
    pub executed: Vec<bool>,
    pub timelocked_at: Option<Timestamp>,
    /// Snapshotted at submission.
    pub timelock_period: u64,
    pub execution_period: u64,
    pub canceled: bool,
}

impl Proposal {
    pub fn timelock_record(&self) -> Option<TimelockRecord> {
        self.timelocked_at.map(|timelocked_at| TimelockRecord {
            proposal_id: self.id,
            timelocked_at,
            timelock_period: self.timelock_period,
            execution_period: self.execution_period,
        })
    }

    pub fn executed_count(&self) -> usize {
        self.executed.iter().filter(|done| **done).count()
    }

    pub fn is_executed(&self, index: usize) -> bool {
        self.executed.get(index).copied().unwrap_or(false)
    }

    pub fn is_fully_executed(&self) -> bool {
        (0..self.tx_hashes.len()).all(|i| self.is_executed(i))
    }

    /// Positions not yet executed, in batch order.
    pub fn pending(&self) -> impl Iterator<Item = (usize, &TxHash)> + '_ {
        self.tx_hashes
            .iter()
            .enumerate()
            .filter(move |(i, _)| !self.is_executed(*i))
    }

    /// Lowest position not yet executed.
    pub fn first_pending(&self) -> Option<usize> {
        self.pending().map(|(i, _)| i).next()
    }

    /// True when `tx_hash` sits at a position not yet executed.
    pub fn pending_contains(&self, tx_hash: &TxHash) -> bool {
        self.pending().any(|(_, h)| h == tx_hash)
    }

    /// Module-path position of `tx_hash`.
    ///
    /// Pending positions are taken in batch order. A vetoed position can
    /// never run, so it is passed over instead of holding up the rest of the
    /// batch; any other pending position must be run first.
    pub fn next_position(
        &self,
        tx_hash: &TxHash,
        is_vetoed: impl Fn(&TxHash) -> bool,
    ) -> NextPosition {
        let mut first = None;
        for (index, hash) in self.pending() {
            if hash == tx_hash {
                return NextPosition::Ready(index);
            }
            first.get_or_insert(index);
            if !is_vetoed(hash) {
                return NextPosition::Mismatch(index);
            }
        }
        match first {
            Some(index) => NextPosition::Mismatch(index),
            None => NextPosition::Done,
        }
    }

    pub fn mark_executed(&mut self, index: usize) {
        if self.executed.len() < self.tx_hashes.len() {
            self.executed.resize(self.tx_hashes.len(), false);
        }
        if let Some(done) = self.executed.get_mut(index) {
            *done = true;
        }
    }

    /// State once timelocked. `None` while still in voting.
    pub fn timelocked_state(&self, now: Timestamp) -> Option<ProposalState> {
        let record = self.timelock_record()?;
        let state = if self.canceled {
            ProposalState::Canceled
        } else if self.is_fully_executed() {
            ProposalState::Executed
        } else if !record.timelock_elapsed(now) {
            ProposalState::TimeLocked
        } else if record.deadline_elapsed(now) {
            ProposalState::Expired
        } else if self.executed.contains(&true) {
            ProposalState::Executing
        } else {
            ProposalState::Executable
        };
        Some(state)
    }
}
