//! NFT-weighted linear voting.
//!
//! Voters present the tokens they vote with. Each registered collection has a
//! fixed per-token weight. A token can back only one vote per proposal, so
//! handing it to a second wallet after voting does not add weight.

use super::{ProposalMetadata, StrategyCore, StrategyKind, StrategyParams, VotingStrategy};
use crate::clock::SharedClock;
use crate::error::{GovernanceError, GovernanceResult};
use crate::types::{Address, ProposalId, TokenRef, VoteChoice, Weight, WeightProof};
use crate::weights::{NftHolderWeights, NftRegistry, VoterWeights};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub struct LinearNftVoting {
    core: StrategyCore,
    registry: Arc<dyn NftRegistry>,
    /// collection -> weight per token
    collections: BTreeMap<Address, Weight>,
    used_tokens: HashMap<ProposalId, HashSet<TokenRef>>,
}

impl LinearNftVoting {
    pub fn new(
        params: StrategyParams,
        registry: Arc<dyn NftRegistry>,
        collections: BTreeMap<Address, Weight>,
        clock: SharedClock,
    ) -> GovernanceResult<Self> {
        Ok(Self {
            core: StrategyCore::new(params, clock)?,
            registry,
            collections,
            used_tokens: HashMap::new(),
        })
    }

    /// Register or re-weight a collection. Owner only.
    pub fn add_collection(
        &mut self,
        caller: Address,
        collection: Address,
        weight: Weight,
    ) -> GovernanceResult<()> {
        self.core.ensure_owner(caller)?;
        self.collections.insert(collection, weight);
        Ok(())
    }

    pub fn collection_weight(&self, collection: &Address) -> Option<Weight> {
        self.collections.get(collection).copied()
    }

    pub fn token_used(&self, proposal_id: ProposalId, token: &TokenRef) -> bool {
        self.used_tokens
            .get(&proposal_id)
            .is_some_and(|used| used.contains(token))
    }

    fn proof_weight(
        &self,
        voter: &Address,
        proposal_id: ProposalId,
        tokens: &[TokenRef],
    ) -> GovernanceResult<Weight> {
        let mut seen = HashSet::new();
        let mut total: Weight = 0;
        for token in tokens {
            let weight = self
                .collections
                .get(&token.collection)
                .copied()
                .ok_or(GovernanceError::InvalidToken(*token))?;
            if self.registry.owner_of(&token.collection, token.token_id) != Some(*voter) {
                return Err(GovernanceError::InvalidToken(*token));
            }
            if !seen.insert(*token) || self.token_used(proposal_id, token) {
                return Err(GovernanceError::TokenAlreadyUsed(*token, proposal_id));
            }
            total = total.saturating_add(weight);
        }
        Ok(total)
    }
}

impl VotingStrategy for LinearNftVoting {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Nft
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn weight_of(&self, who: &Address) -> Weight {
        NftHolderWeights::new(self.registry.clone(), self.collections.clone())
            .weight_of(who, self.core.now())
    }

    fn receive_proposal(
        &mut self,
        caller: Address,
        meta: ProposalMetadata,
    ) -> GovernanceResult<()> {
        // NFT quorums are absolute; there is no supply snapshot.
        self.core.receive(caller, &meta, 0)
    }

    fn vote(
        &mut self,
        voter: Address,
        proposal_id: ProposalId,
        choice: VoteChoice,
        proof: &WeightProof,
    ) -> GovernanceResult<Weight> {
        self.core.ensure_can_vote(proposal_id, &voter)?;
        let tokens = match proof {
            WeightProof::Tokens(tokens) if !tokens.is_empty() => tokens,
            _ => return Err(GovernanceError::NoVotes { voter }),
        };
        let weight = self.proof_weight(&voter, proposal_id, tokens)?;
        let recorded = self.core.record_vote(proposal_id, voter, choice, weight)?;
        self.used_tokens
            .entry(proposal_id)
            .or_default()
            .extend(tokens.iter().copied());
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::tally::QuorumRule;
    use crate::weights::MockNftRegistry;

    const COLLECTION: u64 = 0xc0;
    const OTHER: u64 = 0xc1;

    fn token(collection: u64, id: u64) -> TokenRef {
        TokenRef {
            collection: addr(collection),
            token_id: id,
        }
    }

    fn setup() -> (crate::clock::ManualClock, MockNftRegistry, LinearNftVoting) {
        let (clock, shared) = clock(0);
        let registry = MockNftRegistry::new();
        registry.mint(addr(COLLECTION), 1, addr(1)).unwrap();
        registry.mint(addr(COLLECTION), 2, addr(1)).unwrap();
        registry.mint(addr(COLLECTION), 3, addr(2)).unwrap();
        registry.mint(addr(OTHER), 1, addr(2)).unwrap();
        let strategy = LinearNftVoting::new(
            params(10).with_quorum(QuorumRule::Absolute { threshold: 2 }),
            Arc::new(registry.clone()),
            [(addr(COLLECTION), 1)].into_iter().collect(),
            shared,
        )
        .unwrap();
        (clock, registry, strategy)
    }

    #[test]
    fn test_vote_sums_token_weights() {
        let (_, _, mut strategy) = setup();
        strategy.receive_proposal(addr(GOVERNOR), meta(0, 0)).unwrap();
        let proof = WeightProof::Tokens(vec![token(COLLECTION, 1), token(COLLECTION, 2)]);
        assert_eq!(strategy.vote(addr(1), 0, VoteChoice::Yes, &proof), Ok(2));
        assert_eq!(strategy.tally(0).unwrap().yes, 2);
    }

    #[test]
    fn test_rejects_foreign_and_unregistered_tokens() {
        let (_, _, mut strategy) = setup();
        strategy.receive_proposal(addr(GOVERNOR), meta(0, 0)).unwrap();

        let foreign = WeightProof::Tokens(vec![token(COLLECTION, 3)]);
        assert_eq!(
            strategy.vote(addr(1), 0, VoteChoice::Yes, &foreign),
            Err(GovernanceError::InvalidToken(token(COLLECTION, 3)))
        );

        let unregistered = WeightProof::Tokens(vec![token(OTHER, 1)]);
        assert_eq!(
            strategy.vote(addr(2), 0, VoteChoice::Yes, &unregistered),
            Err(GovernanceError::InvalidToken(token(OTHER, 1)))
        );

        assert_eq!(
            strategy.vote(addr(2), 0, VoteChoice::Yes, &WeightProof::None),
            Err(GovernanceError::NoVotes { voter: addr(2) })
        );
    }

    #[test]
    fn test_token_cannot_vote_twice_after_transfer() {
        let (_, registry, mut strategy) = setup();
        strategy.receive_proposal(addr(GOVERNOR), meta(0, 0)).unwrap();
        let proof = WeightProof::Tokens(vec![token(COLLECTION, 1)]);
        strategy.vote(addr(1), 0, VoteChoice::Yes, &proof).unwrap();

        registry
            .transfer(addr(COLLECTION), 1, addr(1), addr(5))
            .unwrap();
        assert_eq!(
            strategy.vote(addr(5), 0, VoteChoice::Yes, &proof),
            Err(GovernanceError::TokenAlreadyUsed(token(COLLECTION, 1), 0))
        );
    }

    #[test]
    fn test_duplicate_token_in_one_proof() {
        let (_, _, mut strategy) = setup();
        strategy.receive_proposal(addr(GOVERNOR), meta(0, 0)).unwrap();
        let proof = WeightProof::Tokens(vec![token(COLLECTION, 1), token(COLLECTION, 1)]);
        assert!(matches!(
            strategy.vote(addr(1), 0, VoteChoice::Yes, &proof),
            Err(GovernanceError::TokenAlreadyUsed(..))
        ));
        assert!(!strategy.has_voted(0, &addr(1)));
    }

    #[test]
    fn test_add_collection_owner_only() {
        let (_, _, mut strategy) = setup();
        assert!(strategy.add_collection(addr(9), addr(OTHER), 5).is_err());
        strategy.add_collection(addr(OWNER), addr(OTHER), 5).unwrap();
        assert_eq!(strategy.collection_weight(&addr(OTHER)), Some(5));
        // addr(2): one COLLECTION token (1) + one OTHER token (5)
        assert_eq!(strategy.weight_of(&addr(2)), 6);
    }

    #[test]
    fn test_absolute_quorum() {
        let (clock, _, mut strategy) = setup();
        strategy.receive_proposal(addr(GOVERNOR), meta(0, 0)).unwrap();
        strategy
            .vote(
                addr(2),
                0,
                VoteChoice::Yes,
                &WeightProof::Tokens(vec![token(COLLECTION, 3)]),
            )
            .unwrap();
        clock.advance(11);
        assert_eq!(
            strategy.is_passed(0),
            Err(GovernanceError::QuorumNotReached(0))
        );
    }
}
