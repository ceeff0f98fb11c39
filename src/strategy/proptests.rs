//! Property-based tests for vote tallying
//!
//! - Tally buckets equal the sum of distinct voters' weights
//! - A second vote from the same voter never changes the tally
//! - Majority with the default basis is exactly `yes > no`

use super::test_support::*;
use super::*;
use crate::weights::MockTokenLedger;
use proptest::prelude::*;
use std::sync::Arc;

fn choice_strategy() -> impl Strategy<Value = VoteChoice> {
    prop_oneof![
        Just(VoteChoice::Yes),
        Just(VoteChoice::No),
        Just(VoteChoice::Abstain),
    ]
}

proptest! {
    /// Property: each bucket is the sum of the weights of voters who picked it,
    /// counting every voter once regardless of repeated attempts
    #[test]
    fn tally_equals_sum_of_distinct_voters(
        votes in prop::collection::vec((1u64..20, 1u128..1_000_000, choice_strategy()), 1..60),
    ) {
        let (_, shared) = clock(100);
        let ledger = MockTokenLedger::new();
        for (voter, weight, _) in &votes {
            if ledger.balance_of(&addr(*voter)) == 0 {
                ledger.mint(addr(*voter), *weight, 0);
            }
        }
        let mut strategy = LinearFungibleVoting::new(params(50), Arc::new(ledger.clone()), shared).unwrap();
        strategy.receive_proposal(addr(GOVERNOR), meta(0, 100)).unwrap();

        let mut expected = VoteTally::default();
        let mut seen = std::collections::HashSet::new();
        for (voter, _, choice) in &votes {
            let result = strategy.vote(addr(*voter), 0, *choice, &WeightProof::None);
            if seen.insert(*voter) {
                let weight = result.unwrap();
                prop_assert_eq!(weight, ledger.balance_of(&addr(*voter)));
                expected.add(*choice, weight);
            } else {
                prop_assert_eq!(result, Err(GovernanceError::AlreadyVoted { voter: addr(*voter) }));
            }
        }

        prop_assert_eq!(strategy.tally(0).unwrap(), expected);
        prop_assert_eq!(strategy.core().proposal(0).unwrap().voter_count(), seen.len());
    }

    /// Property: with the default basis, the majority check is `yes > no`
    #[test]
    fn default_basis_is_strict_majority(yes in 0u128..u64::MAX as u128, no in 0u128..u64::MAX as u128) {
        let tally = VoteTally { yes, no, abstain: 0 };
        prop_assert_eq!(tally.meets_basis(SIMPLE_MAJORITY_BASIS), yes > no);
    }

    /// Property: a vote after the window closes never touches the tally
    #[test]
    fn late_votes_rejected(period in 1u64..1_000, late_by in 1u64..1_000) {
        let (clock, shared) = clock(0);
        let members = crate::weights::OwnerSetWeights::new([addr(1)]);
        let mut strategy = MemberVoting::new(params(period), members, shared).unwrap();
        strategy.receive_proposal(addr(GOVERNOR), meta(0, 0)).unwrap();

        clock.set(period + late_by);
        let result = strategy.vote(addr(1), 0, VoteChoice::Yes, &WeightProof::None);
        prop_assert_eq!(result, Err(GovernanceError::VotingClosed(0)));
        prop_assert_eq!(strategy.tally(0).unwrap(), VoteTally::default());
    }
}
