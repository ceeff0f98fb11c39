//! One member, one vote over a fixed owner set.

use super::{ProposalMetadata, StrategyCore, StrategyKind, StrategyParams, VotingStrategy};
use crate::clock::SharedClock;
use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{Address, ProposalId, VoteChoice, Weight, WeightProof};
use crate::weights::{OwnerSetWeights, VoterWeights};

pub struct MemberVoting {
    core: StrategyCore,
    members: OwnerSetWeights,
}

impl MemberVoting {
    pub fn new(
        params: StrategyParams,
        members: OwnerSetWeights,
        clock: SharedClock,
    ) -> GovernanceResult<Self> {
        if members.is_empty() {
            return Err(GovernanceError::InvalidConfig(
                "member set must not be empty".to_string(),
            ));
        }
        Ok(Self {
            core: StrategyCore::new(params, clock)?,
            members,
        })
    }

    pub fn members(&self) -> &OwnerSetWeights {
        &self.members
    }
}

impl VotingStrategy for MemberVoting {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Members
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn weight_of(&self, who: &Address) -> Weight {
        self.members.weight_of(who, self.core.now())
    }

    fn receive_proposal(
        &mut self,
        caller: Address,
        meta: ProposalMetadata,
    ) -> GovernanceResult<()> {
        let total = self.members.len() as Weight;
        self.core.receive(caller, &meta, total)
    }

    fn vote(
        &mut self,
        voter: Address,
        proposal_id: ProposalId,
        choice: VoteChoice,
        _proof: &WeightProof,
    ) -> GovernanceResult<Weight> {
        self.core.ensure_can_vote(proposal_id, &voter)?;
        if !self.members.is_owner(&voter) {
            return Err(GovernanceError::NotOwner { caller: voter });
        }
        self.core.record_vote(proposal_id, voter, choice, 1)
    }
}
