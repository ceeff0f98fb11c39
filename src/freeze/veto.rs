//! Veto consensus: per-transaction denial.
//!
//! Votes are cast against a single transaction hash while the proposal
//! containing it is timelocked. A hash is vetoed once its count exceeds the
//! threshold; only that hash is affected. Each hash keeps the threshold that
//! was current when its first veto vote landed, so a later threshold change
//! never revisits a decision already in flight or made.

use super::consensus::FreezeConsensus;
use crate::clock::SharedClock;
use crate::error::{GovernanceError, GovernanceResult};
use crate::events::{EventLog, GovernanceEvent};
use crate::governor::TimelockLookup;
use crate::tally::ThresholdCount;
use crate::types::{Address, TxHash, Weight};
use crate::weights::VoterWeights;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct VetoRecord {
    threshold: Weight,
    count: ThresholdCount,
    voters: HashSet<Address>,
}

impl VetoRecord {
    fn new(threshold: Weight) -> Self {
        Self {
            threshold,
            count: ThresholdCount::default(),
            voters: HashSet::new(),
        }
    }

    fn is_vetoed(&self) -> bool {
        self.count.exceeds(self.threshold)
    }
}

pub struct VetoConsensus {
    owner: Address,
    weights: Arc<dyn VoterWeights>,
    votes_threshold: Weight,
    freeze: Arc<RwLock<FreezeConsensus>>,
    clock: SharedClock,
    records: HashMap<TxHash, VetoRecord>,
    events: EventLog,
}

impl VetoConsensus {
    /// `weights` should be the same source the freeze track reads.
    pub fn new(
        owner: Address,
        weights: Arc<dyn VoterWeights>,
        votes_threshold: Weight,
        freeze: Arc<RwLock<FreezeConsensus>>,
        clock: SharedClock,
    ) -> GovernanceResult<Self> {
        validate_threshold(votes_threshold)?;
        Ok(Self {
            owner,
            weights,
            votes_threshold,
            freeze,
            clock,
            records: HashMap::new(),
            events: EventLog::new(),
        })
    }

    pub fn votes_threshold(&self) -> Weight {
        self.votes_threshold
    }

    pub fn veto_votes(&self, tx_hash: &TxHash) -> Weight {
        self.records
            .get(tx_hash)
            .map(|r| r.count.votes)
            .unwrap_or(0)
    }

    pub fn has_vetoed(&self, tx_hash: &TxHash, voter: &Address) -> bool {
        self.records
            .get(tx_hash)
            .is_some_and(|r| r.voters.contains(voter))
    }

    pub fn get_is_vetoed(&self, tx_hash: &TxHash) -> bool {
        self.records.get(tx_hash).is_some_and(VetoRecord::is_vetoed)
    }

    /// Threshold `tx_hash` is judged against: its own once voted on,
    /// otherwise the current one.
    pub fn threshold_for(&self, tx_hash: &TxHash) -> Weight {
        self.records
            .get(tx_hash)
            .map(|r| r.threshold)
            .unwrap_or(self.votes_threshold)
    }

    /// Cast a veto vote on `tx_hash`. With `also_freeze`, the voter's freeze
    /// vote is cast in the same call unless they already voted in the open
    /// window. Either both votes land or neither does.
    pub fn cast_veto_vote(
        &mut self,
        voter: Address,
        tx_hash: TxHash,
        also_freeze: bool,
        lookup: &dyn TimelockLookup,
    ) -> GovernanceResult<Weight> {
        let now = self.clock.now();
        let record = lookup
            .timelock_record(&tx_hash)
            .ok_or(GovernanceError::NotTimelocked(tx_hash))?;
        if record.deadline_elapsed(now) {
            return Err(GovernanceError::Expired(tx_hash));
        }
        if self.has_vetoed(&tx_hash, &voter) {
            return Err(GovernanceError::AlreadyVoted { voter });
        }
        let weight = self.weights.weight_of(&voter, record.timelocked_at);
        if weight == 0 {
            return Err(GovernanceError::NoVotes { voter });
        }

        if also_freeze {
            let mut freeze = self.freeze.write().unwrap_or_else(PoisonError::into_inner);
            if !freeze.has_voted_in_window(&voter) {
                freeze.cast_freeze_vote(voter)?;
            }
        }

        let threshold = self.votes_threshold;
        let entry = self
            .records
            .entry(tx_hash)
            .or_insert_with(|| VetoRecord::new(threshold));
        let was_vetoed = entry.is_vetoed();
        entry.count.add(weight);
        entry.voters.insert(voter);
        let now_vetoed = entry.is_vetoed();

        debug!(voter = %voter, tx_hash = %tx_hash, weight = %weight, "veto vote cast");
        self.events.push(GovernanceEvent::VetoVoteCast {
            voter,
            tx_hash,
            weight,
            freeze: also_freeze,
        });
        if !was_vetoed && now_vetoed {
            info!(tx_hash = %tx_hash, proposal_id = record.proposal_id, "transaction vetoed");
        }
        Ok(weight)
    }

    /// Applies to hashes that have no veto votes yet.
    pub fn update_votes_threshold(
        &mut self,
        caller: Address,
        votes_threshold: Weight,
    ) -> GovernanceResult<()> {
        if caller != self.owner {
            return Err(GovernanceError::NotOwner { caller });
        }
        validate_threshold(votes_threshold)?;
        self.votes_threshold = votes_threshold;
        self.events
            .push(GovernanceEvent::VetoThresholdUpdated { votes_threshold });
        Ok(())
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        self.events.drain()
    }
}

fn validate_threshold(votes_threshold: Weight) -> GovernanceResult<()> {
    if votes_threshold == 0 {
        return Err(GovernanceError::InvalidConfig(
            "veto votes threshold must be positive".to_string(),
        ));
    }
    Ok(())
}
