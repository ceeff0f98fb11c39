//! Token-weighted linear voting.
//!
//! Weight is the voter's checkpointed votes just before the proposal start,
//! so tokens moved at or after submission cannot be voted twice. A fractional
//! quorum is taken of the total supply at the same snapshot.

use super::{ProposalMetadata, StrategyCore, StrategyKind, StrategyParams, VotingStrategy};
use crate::clock::SharedClock;
use crate::error::GovernanceResult;
use crate::types::{Address, ProposalId, VoteChoice, Weight, WeightProof};
use crate::weights::{checkpoint_before, FungibleWeights};
use std::sync::Arc;

pub struct LinearFungibleVoting {
    core: StrategyCore,
    token: Arc<dyn FungibleWeights>,
}

impl LinearFungibleVoting {
    pub fn new(
        params: StrategyParams,
        token: Arc<dyn FungibleWeights>,
        clock: SharedClock,
    ) -> GovernanceResult<Self> {
        Ok(Self {
            core: StrategyCore::new(params, clock)?,
            token,
        })
    }
}

impl VotingStrategy for LinearFungibleVoting {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fungible
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn weight_of(&self, who: &Address) -> Weight {
        self.token.past_votes(who, checkpoint_before(self.core.now()))
    }

    fn receive_proposal(
        &mut self,
        caller: Address,
        meta: ProposalMetadata,
    ) -> GovernanceResult<()> {
        let total = self
            .token
            .past_total_supply(checkpoint_before(meta.start));
        self.core.receive(caller, &meta, total)
    }

    fn vote(
        &mut self,
        voter: Address,
        proposal_id: ProposalId,
        choice: VoteChoice,
        _proof: &WeightProof,
    ) -> GovernanceResult<Weight> {
        let snapshot = self.core.ensure_can_vote(proposal_id, &voter)?;
        let weight = self.token.past_votes(&voter, checkpoint_before(snapshot));
        self.core.record_vote(proposal_id, voter, choice, weight)
    }
}
