//! Governance event log.
//!
//! Append-only record of externally visible state changes, one log per
//! authority. Entries are serde-serializable so the operator tooling can dump
//! them as JSON.

use crate::types::{Address, ProposalId, Timestamp, TxHash, VoteChoice, Weight};
use serde::{Deserialize, Serialize};

/// A single state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GovernanceEvent {
    ProposalCreated {
        proposal_id: ProposalId,
        strategy: Address,
        proposer: Address,
        tx_count: usize,
        metadata: String,
    },
    Voted {
        proposal_id: ProposalId,
        voter: Address,
        choice: VoteChoice,
        weight: Weight,
    },
    ProposalTimelocked {
        proposal_id: ProposalId,
        at: Timestamp,
    },
    ProposalExecuted {
        proposal_id: ProposalId,
        index: usize,
        tx_hash: TxHash,
    },
    ProposalsCanceled {
        proposal_ids: Vec<ProposalId>,
    },
    StrategyEnabled {
        strategy: Address,
    },
    StrategyDisabled {
        strategy: Address,
    },
    TimelockPeriodUpdated {
        period: u64,
    },
    ExecutionPeriodUpdated {
        period: u64,
    },
    FreezeProposalCreated {
        creator: Address,
        at: Timestamp,
    },
    FreezeVoteCast {
        voter: Address,
        weight: Weight,
    },
    Frozen {
        until: Timestamp,
    },
    Unfrozen {
        at: Timestamp,
    },
    FreezeParametersUpdated {
        votes_threshold: Weight,
        proposal_period: u64,
        freeze_period: u64,
    },
    VetoVoteCast {
        voter: Address,
        tx_hash: TxHash,
        weight: Weight,
        freeze: bool,
    },
    VetoThresholdUpdated {
        votes_threshold: Weight,
    },
}

/// Append-only event log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<GovernanceEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: GovernanceEvent) {
        self.entries.push(event);
    }

    pub fn entries(&self) -> &[GovernanceEvent] {
        &self.entries
    }

    /// Take all entries, leaving the log empty.
    pub fn drain(&mut self) -> Vec<GovernanceEvent> {
        std::mem::take(&mut self.entries)
    }
}
