//! Property-based tests for the freeze track
//!
//! - Frozen exactly while `now < frozen_until`
//! - A vote on a stale window counts only the new caller's weight

use super::consensus::{FreezeConsensus, FreezeParams};
use crate::clock::ManualClock;
use crate::types::Address;
use crate::weights::MockTokenLedger;
use crate::weights::TokenHolderWeights;
use proptest::prelude::*;
use std::sync::Arc;

const OWNER: u64 = 0x0a0a;

fn build(
    start: u64,
    threshold: u128,
    proposal_period: u64,
    freeze_period: u64,
    balances: &[u128],
) -> (ManualClock, FreezeConsensus) {
    let clock = ManualClock::new(start);
    let ledger = MockTokenLedger::new();
    for (i, balance) in balances.iter().enumerate() {
        ledger.mint(Address::from_low_u64(i as u64 + 1), *balance, 0);
    }
    let freeze = FreezeConsensus::new(
        Address::from_low_u64(OWNER),
        Arc::new(TokenHolderWeights::new(Arc::new(ledger))),
        FreezeParams {
            votes_threshold: threshold,
            proposal_period,
            freeze_period,
        },
        Arc::new(clock.clone()),
    )
    .unwrap();
    (clock, freeze)
}

proptest! {
    /// Property: is_frozen matches `now < frozen_until` at every sampled time
    #[test]
    fn frozen_iff_before_frozen_until(
        freeze_period in 1u64..10_000,
        samples in prop::collection::vec(0u64..20_000, 1..20),
    ) {
        let (clock, mut freeze) = build(1_000, 10, 100, freeze_period, &[10]);
        freeze.cast_freeze_vote(Address::from_low_u64(1)).unwrap();
        prop_assert_eq!(freeze.frozen_until(), 1_000 + freeze_period);

        let mut samples = samples;
        samples.sort_unstable();
        for offset in samples {
            clock.set(1_000 + offset);
            let now = 1_000 + offset;
            prop_assert_eq!(freeze.is_frozen(), now < freeze.frozen_until());
        }
    }

    /// Property: after a window goes stale, the next vote's window holds only
    /// that voter's weight
    #[test]
    fn stale_window_restarts_from_caller_weight(
        first in 1u128..1_000,
        second in 1u128..1_000,
        period in 1u64..500,
        late_by in 1u64..500,
    ) {
        // Threshold above both balances combined so nothing freezes
        let (clock, mut freeze) = build(0, 10_000, period, 10, &[first, second]);
        freeze.cast_freeze_vote(Address::from_low_u64(1)).unwrap();
        prop_assert_eq!(freeze.vote_count(), first);

        clock.set(period + late_by);
        freeze.cast_freeze_vote(Address::from_low_u64(2)).unwrap();
        prop_assert_eq!(freeze.vote_count(), second);
        prop_assert_eq!(freeze.window().unwrap().created_at, period + late_by);
    }
}
