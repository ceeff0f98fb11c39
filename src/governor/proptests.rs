//! Property-based tests for batch execution
//!
//! - `executed_count` never decreases and never skips an index
//! - Executing index `executed_count + 1` always fails with `HashMismatch`

use super::*;
use crate::account::MockSafe;
use crate::clock::ManualClock;
use crate::strategy::{MemberVoting, StrategyParams};
use crate::weights::OwnerSetWeights;
use proptest::prelude::*;
use std::sync::Arc;

const GOVERNOR: u64 = 0x6060;
const OWNER: u64 = 0x0a0a;
const STRATEGY: u64 = 0x5757;

fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

fn tx(n: usize) -> Transaction {
    Transaction::call(addr(0x1000), n as u128, Vec::new())
}

/// Executable proposal with `len` transactions.
fn executable(len: usize) -> (Governor, MockSafe, ProposalId) {
    let clock = ManualClock::new(0);
    let shared: SharedClock = Arc::new(clock.clone());
    let mut governor = Governor::new(addr(GOVERNOR), addr(OWNER), 5, 1_000, shared.clone());
    let strategy = MemberVoting::new(
        StrategyParams::new(addr(STRATEGY), addr(OWNER), addr(GOVERNOR), 5),
        OwnerSetWeights::new([addr(1)]),
        shared.clone(),
    )
    .unwrap();
    governor
        .enable_strategy(addr(OWNER), Box::new(strategy))
        .unwrap();
    let id = governor
        .submit_proposal(addr(1), addr(STRATEGY), (0..len).map(tx).collect(), "")
        .unwrap();
    governor
        .vote(addr(1), id, VoteChoice::Yes, &WeightProof::None)
        .unwrap();
    clock.set(6);
    governor.finalize(id).unwrap();
    clock.set(11);
    (governor, MockSafe::new(addr(0x5afe), shared), id)
}

proptest! {
    /// Property: any sequence of attempts (right index, wrong index, forced
    /// account failure) moves executed_count by at most one, and only forward
    #[test]
    fn executed_count_monotonic(
        len in 1usize..8,
        attempts in prop::collection::vec((0usize..10, any::<bool>()), 1..40),
    ) {
        let (mut governor, mut safe, id) = executable(len);
        let mut previous = 0;
        for (index, fail) in attempts {
            if fail {
                safe.fail_next(1);
            }
            let result = governor.execute_next(id, &tx(index), &mut safe);
            let count = governor.executed_count(id).unwrap();
            match result {
                Ok(executed) => {
                    prop_assert_eq!(executed, previous);
                    prop_assert_eq!(count, previous + 1);
                }
                Err(_) => prop_assert_eq!(count, previous),
            }
            safe.fail_next(0);
            previous = count;
        }
    }

    /// Property: skipping ahead by one always reports a hash mismatch
    #[test]
    fn skipping_an_index_is_hash_mismatch(len in 2usize..8, done in 0usize..6) {
        let done = done.min(len - 2);
        let (mut governor, mut safe, id) = executable(len);
        for i in 0..done {
            governor.execute_next(id, &tx(i), &mut safe).unwrap();
        }
        prop_assert_eq!(
            governor.execute_next(id, &tx(done + 1), &mut safe),
            Err(GovernanceError::HashMismatch { proposal_id: id, index: done })
        );
    }
}
