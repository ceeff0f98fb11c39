//! Voting strategies.
//!
//! A strategy owns one [`VoteTally`] per received proposal, enforces one vote
//! per voter per proposal and the voting window, and answers whether a
//! proposal passed. Only the weighting differs between variants:
//!
//! - [`LinearFungibleVoting`]: checkpointed token balance at proposal start
//! - [`LinearNftVoting`]: sum of per-collection weights of the NFTs presented
//! - [`MemberVoting`]: one member, one vote over a fixed owner set
//!
//! The pass/fail rule (voting over, quorum, then basis majority) lives once in
//! [`StrategyCore`] and every variant reuses it through the trait's provided
//! methods.

pub mod fungible;
pub mod members;
pub mod nft;

#[cfg(test)]
mod proptests;

pub use fungible::LinearFungibleVoting;
pub use members::MemberVoting;
pub use nft::LinearNftVoting;

use crate::clock::SharedClock;
use crate::error::{GovernanceError, GovernanceResult};
use crate::events::{EventLog, GovernanceEvent};
use crate::tally::{QuorumRule, VoteTally, NUMERATOR_DENOMINATOR, SIMPLE_MAJORITY_BASIS};
use crate::types::{Address, ProposalId, Timestamp, VoteChoice, Weight, WeightProof};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Weighting variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Fungible,
    Nft,
    Members,
}

/// Data the governor hands over when a proposal is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalMetadata {
    pub proposal_id: ProposalId,
    pub proposer: Address,
    pub start: Timestamp,
}

/// A cast vote. Weight is recorded at cast time and never re-derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub choice: VoteChoice,
    pub weight: Weight,
}

/// Per-proposal voting state.
#[derive(Debug, Clone)]
pub struct ProposalVotes {
    pub start: Timestamp,
    pub voting_end: Timestamp,
    /// Quorum fixed at receipt.
    pub quorum: Weight,
    /// Basis numerator fixed at receipt.
    pub basis_numerator: u64,
    pub tally: VoteTally,
    records: HashMap<Address, VoteRecord>,
}

impl ProposalVotes {
    pub fn record(&self, voter: &Address) -> Option<&VoteRecord> {
        self.records.get(voter)
    }

    pub fn voter_count(&self) -> usize {
        self.records.len()
    }
}

/// Shared strategy parameters and bookkeeping.
pub struct StrategyCore {
    address: Address,
    owner: Address,
    governor: Address,
    voting_period: u64,
    quorum: QuorumRule,
    basis_numerator: u64,
    required_proposer_weight: Weight,
    clock: SharedClock,
    proposals: HashMap<ProposalId, ProposalVotes>,
    events: EventLog,
}

/// Construction parameters common to every variant.
#[derive(Debug, Clone)]
pub struct StrategyParams {
    /// Identity of the strategy in the governor's allow-list.
    pub address: Address,
    /// May call the `update_*` setters.
    pub owner: Address,
    /// The only caller allowed to deliver proposals.
    pub governor: Address,
    pub voting_period: u64,
    pub quorum: QuorumRule,
    pub basis_numerator: u64,
    pub required_proposer_weight: Weight,
}

impl StrategyParams {
    pub fn new(address: Address, owner: Address, governor: Address, voting_period: u64) -> Self {
        Self {
            address,
            owner,
            governor,
            voting_period,
            quorum: QuorumRule::Absolute { threshold: 0 },
            basis_numerator: SIMPLE_MAJORITY_BASIS,
            required_proposer_weight: 0,
        }
    }

    pub fn with_quorum(mut self, quorum: QuorumRule) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_basis_numerator(mut self, basis_numerator: u64) -> Self {
        self.basis_numerator = basis_numerator;
        self
    }

    pub fn with_required_proposer_weight(mut self, weight: Weight) -> Self {
        self.required_proposer_weight = weight;
        self
    }
}

fn validate_basis(basis_numerator: u64) -> GovernanceResult<()> {
    if !(SIMPLE_MAJORITY_BASIS..NUMERATOR_DENOMINATOR).contains(&basis_numerator) {
        return Err(GovernanceError::InvalidConfig(format!(
            "basis numerator {} outside [{}, {})",
            basis_numerator, SIMPLE_MAJORITY_BASIS, NUMERATOR_DENOMINATOR
        )));
    }
    Ok(())
}

fn validate_quorum(quorum: &QuorumRule) -> GovernanceResult<()> {
    if let QuorumRule::Fraction { numerator } = quorum {
        if *numerator > NUMERATOR_DENOMINATOR {
            return Err(GovernanceError::InvalidConfig(format!(
                "quorum numerator {} exceeds {}",
                numerator, NUMERATOR_DENOMINATOR
            )));
        }
    }
    Ok(())
}

impl StrategyCore {
    pub fn new(params: StrategyParams, clock: SharedClock) -> GovernanceResult<Self> {
        validate_basis(params.basis_numerator)?;
        validate_quorum(&params.quorum)?;
        if params.voting_period == 0 {
            return Err(GovernanceError::InvalidConfig(
                "voting period must be positive".to_string(),
            ));
        }
        Ok(Self {
            address: params.address,
            owner: params.owner,
            governor: params.governor,
            voting_period: params.voting_period,
            quorum: params.quorum,
            basis_numerator: params.basis_numerator,
            required_proposer_weight: params.required_proposer_weight,
            clock,
            proposals: HashMap::new(),
            events: EventLog::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn governor(&self) -> Address {
        self.governor
    }

    pub fn voting_period(&self) -> u64 {
        self.voting_period
    }

    pub fn quorum_rule(&self) -> QuorumRule {
        self.quorum
    }

    pub fn basis_numerator(&self) -> u64 {
        self.basis_numerator
    }

    pub fn required_proposer_weight(&self) -> Weight {
        self.required_proposer_weight
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn proposal(&self, proposal_id: ProposalId) -> Option<&ProposalVotes> {
        self.proposals.get(&proposal_id)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventLog {
        &mut self.events
    }

    /// Open voting on a proposal. `total_weight` is the variant's total weight
    /// at the proposal start, used by fractional quorums.
    pub fn receive(
        &mut self,
        caller: Address,
        meta: &ProposalMetadata,
        total_weight: Weight,
    ) -> GovernanceResult<()> {
        if caller != self.governor {
            return Err(GovernanceError::Unauthorized { caller });
        }
        if self.proposals.contains_key(&meta.proposal_id) {
            return Err(GovernanceError::InvalidState(format!(
                "proposal {} already received",
                meta.proposal_id
            )));
        }
        let votes = ProposalVotes {
            start: meta.start,
            voting_end: meta.start.saturating_add(self.voting_period),
            quorum: self.quorum.quorum(total_weight),
            basis_numerator: self.basis_numerator,
            tally: VoteTally::default(),
            records: HashMap::new(),
        };
        self.proposals.insert(meta.proposal_id, votes);
        Ok(())
    }

    /// Checks that must hold before a variant reads any weight. Returns the
    /// proposal start, which is the weight snapshot.
    pub fn ensure_can_vote(
        &self,
        proposal_id: ProposalId,
        voter: &Address,
    ) -> GovernanceResult<Timestamp> {
        let votes = self
            .proposals
            .get(&proposal_id)
            .ok_or(GovernanceError::NotSubmitted(proposal_id))?;
        if self.now() > votes.voting_end {
            return Err(GovernanceError::VotingClosed(proposal_id));
        }
        if votes.records.contains_key(voter) {
            return Err(GovernanceError::AlreadyVoted { voter: *voter });
        }
        Ok(votes.start)
    }

    /// Record a vote whose weight the variant already computed.
    pub fn record_vote(
        &mut self,
        proposal_id: ProposalId,
        voter: Address,
        choice: VoteChoice,
        weight: Weight,
    ) -> GovernanceResult<Weight> {
        self.ensure_can_vote(proposal_id, &voter)?;
        if weight == 0 {
            return Err(GovernanceError::NoVotes { voter });
        }
        let votes = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(GovernanceError::NotSubmitted(proposal_id))?;
        votes.records.insert(voter, VoteRecord { choice, weight });
        votes.tally.add(choice, weight);

        debug!(proposal_id, voter = %voter, ?choice, weight = %weight, "vote recorded");
        self.events.push(GovernanceEvent::Voted {
            proposal_id,
            voter,
            choice,
            weight,
        });
        Ok(weight)
    }

    /// `Ok(())` when the proposal passed; otherwise the first failing check.
    pub fn check_passed(&self, proposal_id: ProposalId) -> GovernanceResult<()> {
        let votes = self
            .proposals
            .get(&proposal_id)
            .ok_or(GovernanceError::NotSubmitted(proposal_id))?;
        if self.now() <= votes.voting_end {
            return Err(GovernanceError::VotingNotOver(proposal_id));
        }
        if !votes.tally.meets_quorum(votes.quorum) {
            return Err(GovernanceError::QuorumNotReached(proposal_id));
        }
        if !votes.tally.meets_basis(votes.basis_numerator) {
            return Err(GovernanceError::MajorityNotReached(proposal_id));
        }
        Ok(())
    }

    pub fn ensure_owner(&self, caller: Address) -> GovernanceResult<()> {
        if caller != self.owner {
            return Err(GovernanceError::NotOwner { caller });
        }
        Ok(())
    }

    /// Applies to proposals received after the change.
    pub fn update_voting_period(&mut self, caller: Address, period: u64) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        if period == 0 {
            return Err(GovernanceError::InvalidConfig(
                "voting period must be positive".to_string(),
            ));
        }
        self.voting_period = period;
        Ok(())
    }

    pub fn update_quorum(&mut self, caller: Address, quorum: QuorumRule) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        validate_quorum(&quorum)?;
        self.quorum = quorum;
        Ok(())
    }

    pub fn update_basis_numerator(
        &mut self,
        caller: Address,
        basis_numerator: u64,
    ) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        validate_basis(basis_numerator)?;
        self.basis_numerator = basis_numerator;
        Ok(())
    }

    pub fn update_required_proposer_weight(
        &mut self,
        caller: Address,
        weight: Weight,
    ) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        self.required_proposer_weight = weight;
        Ok(())
    }
}

/// Capability interface the governor holds strategies through.
pub trait VotingStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn core(&self) -> &StrategyCore;

    fn core_mut(&mut self) -> &mut StrategyCore;

    /// Current weight of `who`, used for the proposer check.
    fn weight_of(&self, who: &Address) -> Weight;

    /// Deliver a new proposal. Only the governor may call this.
    fn receive_proposal(&mut self, caller: Address, meta: ProposalMetadata)
        -> GovernanceResult<()>;

    /// Cast a vote, returning the weight recorded.
    fn vote(
        &mut self,
        voter: Address,
        proposal_id: ProposalId,
        choice: VoteChoice,
        proof: &WeightProof,
    ) -> GovernanceResult<Weight>;

    fn address(&self) -> Address {
        self.core().address()
    }

    fn is_proposer(&self, who: &Address) -> bool {
        self.weight_of(who) >= self.core().required_proposer_weight()
    }

    /// `Ok(())` when passed, otherwise `VotingNotOver`, `QuorumNotReached` or
    /// `MajorityNotReached`.
    fn is_passed(&self, proposal_id: ProposalId) -> GovernanceResult<()> {
        self.core().check_passed(proposal_id)
    }

    fn voting_end(&self, proposal_id: ProposalId) -> Option<Timestamp> {
        self.core().proposal(proposal_id).map(|p| p.voting_end)
    }

    fn tally(&self, proposal_id: ProposalId) -> Option<VoteTally> {
        self.core().proposal(proposal_id).map(|p| p.tally)
    }

    fn vote_record(&self, proposal_id: ProposalId, voter: &Address) -> Option<VoteRecord> {
        self.core()
            .proposal(proposal_id)
            .and_then(|p| p.record(voter).copied())
    }

    fn has_voted(&self, proposal_id: ProposalId, voter: &Address) -> bool {
        self.vote_record(proposal_id, voter).is_some()
    }
}
