//! Freeze consensus.
//!
//! Voters open a freeze window with their first vote. Votes inside the window
//! accumulate; the vote that brings the count to the threshold freezes the
//! account until `now + freeze_period`. A vote after the window went stale
//! opens a new window counting only that vote.
//!
//! Threshold and periods are copied into each window when it opens, so the
//! owner's setters never reinterpret a window already in flight.

use crate::clock::SharedClock;
use crate::error::{GovernanceError, GovernanceResult};
use crate::events::{EventLog, GovernanceEvent};
use crate::tally::ThresholdCount;
use crate::types::{Address, Timestamp, Weight};
use crate::weights::VoterWeights;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Parameters for new windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeParams {
    pub votes_threshold: Weight,
    /// How long a window accepts votes.
    pub proposal_period: u64,
    /// How long a successful freeze lasts.
    pub freeze_period: u64,
}

impl FreezeParams {
    pub fn validate(&self) -> GovernanceResult<()> {
        if self.votes_threshold == 0 {
            return Err(GovernanceError::InvalidConfig(
                "freeze votes threshold must be positive".to_string(),
            ));
        }
        if self.proposal_period == 0 || self.freeze_period == 0 {
            return Err(GovernanceError::InvalidConfig(
                "freeze periods must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// The current (or last) freeze window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeWindow {
    pub created_at: Timestamp,
    pub count: ThresholdCount,
    pub params: FreezeParams,
}

impl FreezeWindow {
    pub fn is_stale(&self, now: Timestamp) -> bool {
        now > self.created_at.saturating_add(self.params.proposal_period)
    }
}

pub struct FreezeConsensus {
    owner: Address,
    weights: Arc<dyn VoterWeights>,
    params: FreezeParams,
    clock: SharedClock,
    window: Option<FreezeWindow>,
    frozen_until: Timestamp,
    /// voter -> creation time of the window they last voted in
    voted_in: HashMap<Address, Timestamp>,
    events: EventLog,
}

impl FreezeConsensus {
    pub fn new(
        owner: Address,
        weights: Arc<dyn VoterWeights>,
        params: FreezeParams,
        clock: SharedClock,
    ) -> GovernanceResult<Self> {
        params.validate()?;
        Ok(Self {
            owner,
            weights,
            params,
            clock,
            window: None,
            frozen_until: 0,
            voted_in: HashMap::new(),
            events: EventLog::new(),
        })
    }

    pub fn params(&self) -> FreezeParams {
        self.params
    }

    pub fn window(&self) -> Option<&FreezeWindow> {
        self.window.as_ref()
    }

    /// Votes in the current window, zero if none is open.
    pub fn vote_count(&self) -> Weight {
        let now = self.clock.now();
        self.window
            .filter(|w| !w.is_stale(now))
            .map(|w| w.count.votes)
            .unwrap_or(0)
    }

    pub fn frozen_until(&self) -> Timestamp {
        self.frozen_until
    }

    pub fn is_frozen(&self) -> bool {
        self.clock.now() < self.frozen_until
    }

    /// Whether `voter` already voted in the window that is open right now.
    pub fn has_voted_in_window(&self, voter: &Address) -> bool {
        let now = self.clock.now();
        match (self.window, self.voted_in.get(voter)) {
            (Some(w), Some(at)) => !w.is_stale(now) && *at == w.created_at,
            _ => false,
        }
    }

    /// Weight of `voter` in the open window, or at `now` if a vote would
    /// open a new one.
    pub fn weight_of(&self, voter: &Address) -> Weight {
        let now = self.clock.now();
        let snapshot = match self.window {
            Some(w) if !w.is_stale(now) => w.created_at,
            _ => now,
        };
        self.weights.weight_of(voter, snapshot)
    }

    pub fn cast_freeze_vote(&mut self, voter: Address) -> GovernanceResult<Weight> {
        let now = self.clock.now();
        let open = self.window.filter(|w| !w.is_stale(now));

        let mut window = match open {
            Some(w) => {
                if self.voted_in.get(&voter) == Some(&w.created_at) {
                    return Err(GovernanceError::AlreadyVoted { voter });
                }
                w
            }
            None => FreezeWindow {
                created_at: now,
                count: ThresholdCount::default(),
                params: self.params,
            },
        };

        let weight = self.weights.weight_of(&voter, window.created_at);
        if weight == 0 {
            return Err(GovernanceError::NoVotes { voter });
        }

        if open.is_none() {
            info!(creator = %voter, at = now, "freeze window opened");
            self.events.push(GovernanceEvent::FreezeProposalCreated {
                creator: voter,
                at: now,
            });
        }

        let was_reached = window.count.reaches(window.params.votes_threshold);
        window.count.add(weight);
        self.voted_in.insert(voter, window.created_at);
        self.window = Some(window);

        debug!(voter = %voter, weight = %weight, count = %window.count.votes, "freeze vote cast");
        self.events
            .push(GovernanceEvent::FreezeVoteCast { voter, weight });

        if !was_reached && window.count.reaches(window.params.votes_threshold) {
            self.frozen_until = now.saturating_add(window.params.freeze_period);
            info!(until = self.frozen_until, "account frozen");
            self.events.push(GovernanceEvent::Frozen {
                until: self.frozen_until,
            });
        }
        Ok(weight)
    }

    /// Lift a freeze immediately. Owner only, idempotent.
    ///
    /// The window and its count are left alone, so a window that already
    /// reached the threshold will not freeze again.
    pub fn unfreeze(&mut self, caller: Address) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        let now = self.clock.now();
        self.frozen_until = 0;
        info!(at = now, "account unfrozen");
        self.events.push(GovernanceEvent::Unfrozen { at: now });
        Ok(())
    }

    pub fn update_votes_threshold(
        &mut self,
        caller: Address,
        votes_threshold: Weight,
    ) -> GovernanceResult<()> {
        self.update_params(
            caller,
            FreezeParams {
                votes_threshold,
                ..self.params
            },
        )
    }

    pub fn update_proposal_period(&mut self, caller: Address, period: u64) -> GovernanceResult<()> {
        self.update_params(
            caller,
            FreezeParams {
                proposal_period: period,
                ..self.params
            },
        )
    }

    pub fn update_freeze_period(&mut self, caller: Address, period: u64) -> GovernanceResult<()> {
        self.update_params(
            caller,
            FreezeParams {
                freeze_period: period,
                ..self.params
            },
        )
    }

    fn update_params(&mut self, caller: Address, params: FreezeParams) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        params.validate()?;
        self.params = params;
        self.events.push(GovernanceEvent::FreezeParametersUpdated {
            votes_threshold: params.votes_threshold,
            proposal_period: params.proposal_period,
            freeze_period: params.freeze_period,
        });
        Ok(())
    }

    fn ensure_owner(&self, caller: Address) -> GovernanceResult<()> {
        if caller != self.owner {
            return Err(GovernanceError::NotOwner { caller });
        }
        Ok(())
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::weights::{MockTokenLedger, OwnerSetWeights, TokenHolderWeights};

    const OWNER: u64 = 0x0a0a;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn params() -> FreezeParams {
        FreezeParams {
            votes_threshold: 1_090,
            proposal_period: 10,
            freeze_period: 100,
        }
    }

    fn setup() -> (ManualClock, MockTokenLedger, FreezeConsensus) {
        let clock = ManualClock::new(1_000);
        let ledger = MockTokenLedger::new();
        ledger.mint(addr(1), 500, 0);
        ledger.mint(addr(2), 600, 0);
        ledger.mint(addr(3), 100, 0);
        let freeze = FreezeConsensus::new(
            addr(OWNER),
            Arc::new(TokenHolderWeights::new(Arc::new(ledger.clone()))),
            params(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (clock, ledger, freeze)
    }

    #[test]
    fn test_threshold_crossing_freezes() {
        let (clock, _, mut freeze) = setup();
        freeze.cast_freeze_vote(addr(1)).unwrap();
        assert!(!freeze.is_frozen());
        clock.advance(5);
        freeze.cast_freeze_vote(addr(2)).unwrap();
        assert!(freeze.is_frozen());
        assert_eq!(freeze.frozen_until(), 1_105);
        assert_eq!(freeze.vote_count(), 1_100);
    }

    #[test]
    fn test_freeze_expires_without_transaction() {
        let (clock, _, mut freeze) = setup();
        freeze.cast_freeze_vote(addr(1)).unwrap();
        freeze.cast_freeze_vote(addr(2)).unwrap();
        clock.set(1_099);
        assert!(freeze.is_frozen());
        clock.set(1_100);
        assert!(!freeze.is_frozen());
    }

    #[test]
    fn test_double_vote_in_window_rejected() {
        let (_, _, mut freeze) = setup();
        freeze.cast_freeze_vote(addr(1)).unwrap();
        assert_eq!(
            freeze.cast_freeze_vote(addr(1)),
            Err(GovernanceError::AlreadyVoted { voter: addr(1) })
        );
        assert!(freeze.has_voted_in_window(&addr(1)));
    }

    #[test]
    fn test_stale_window_resets_to_caller_weight() {
        let (clock, _, mut freeze) = setup();
        freeze.cast_freeze_vote(addr(1)).unwrap();
        clock.advance(11);
        assert_eq!(freeze.vote_count(), 0);
        assert!(!freeze.has_voted_in_window(&addr(1)));

        // Same voter may vote again in the new window
        freeze.cast_freeze_vote(addr(1)).unwrap();
        assert_eq!(freeze.vote_count(), 500);
        assert_eq!(freeze.window().unwrap().created_at, 1_011);
        freeze.cast_freeze_vote(addr(3)).unwrap();
        assert_eq!(freeze.vote_count(), 600);
        assert!(!freeze.is_frozen());
    }

    #[test]
    fn test_window_boundary_inclusive() {
        let (clock, _, mut freeze) = setup();
        freeze.cast_freeze_vote(addr(1)).unwrap();
        clock.set(1_010);
        freeze.cast_freeze_vote(addr(2)).unwrap();
        assert!(freeze.is_frozen());
    }

    #[test]
    fn test_zero_weight_rejected() {
        let (_, _, mut freeze) = setup();
        assert_eq!(
            freeze.cast_freeze_vote(addr(9)),
            Err(GovernanceError::NoVotes { voter: addr(9) })
        );
        assert!(freeze.window().is_none());
    }

    #[test]
    fn test_weight_snapshot_at_window_creation() {
        let (clock, ledger, mut freeze) = setup();
        freeze.cast_freeze_vote(addr(1)).unwrap();
        clock.advance(1);
        ledger.transfer(addr(1), addr(4), 500, 1_001).unwrap();
        assert_eq!(
            freeze.cast_freeze_vote(addr(4)),
            Err(GovernanceError::NoVotes { voter: addr(4) })
        );
    }

    #[test]
    fn test_same_second_transfer_not_counted_twice() {
        let (_, ledger, mut freeze) = setup();
        freeze.cast_freeze_vote(addr(2)).unwrap();
        // 600 moved to a fresh wallet in the second the window opened
        ledger.transfer(addr(2), addr(4), 600, 1_000).unwrap();
        assert_eq!(
            freeze.cast_freeze_vote(addr(4)),
            Err(GovernanceError::NoVotes { voter: addr(4) })
        );
        assert_eq!(freeze.vote_count(), 600);
        assert!(!freeze.is_frozen());
    }

    #[test]
    fn test_unfreeze_owner_only_and_idempotent() {
        let (_, _, mut freeze) = setup();
        freeze.cast_freeze_vote(addr(1)).unwrap();
        freeze.cast_freeze_vote(addr(2)).unwrap();
        assert!(freeze.is_frozen());

        assert_eq!(
            freeze.unfreeze(addr(1)),
            Err(GovernanceError::NotOwner { caller: addr(1) })
        );
        freeze.unfreeze(addr(OWNER)).unwrap();
        assert!(!freeze.is_frozen());
        freeze.unfreeze(addr(OWNER)).unwrap();
        assert!(!freeze.is_frozen());

        // Threshold was already reached in this window
        freeze.cast_freeze_vote(addr(3)).unwrap();
        assert!(!freeze.is_frozen());
    }

    #[test]
    fn test_param_updates_apply_to_next_window() {
        let (clock, _, mut freeze) = setup();
        freeze.cast_freeze_vote(addr(1)).unwrap();
        freeze.update_votes_threshold(addr(OWNER), 500).unwrap();
        // In-flight window still needs 1090
        freeze.cast_freeze_vote(addr(3)).unwrap();
        assert!(!freeze.is_frozen());

        clock.advance(11);
        freeze.cast_freeze_vote(addr(1)).unwrap();
        assert!(freeze.is_frozen());
        assert!(freeze.update_freeze_period(addr(OWNER), 0).is_err());
        assert!(freeze.update_proposal_period(addr(2), 5).is_err());
    }

    #[test]
    fn test_member_freeze() {
        let clock = ManualClock::new(0);
        let mut freeze = FreezeConsensus::new(
            addr(OWNER),
            Arc::new(OwnerSetWeights::new([addr(1), addr(2), addr(3)])),
            FreezeParams {
                votes_threshold: 2,
                proposal_period: 10,
                freeze_period: 10,
            },
            Arc::new(clock),
        )
        .unwrap();
        freeze.cast_freeze_vote(addr(1)).unwrap();
        freeze.cast_freeze_vote(addr(2)).unwrap();
        assert!(freeze.is_frozen());
        assert!(freeze.events().entries().iter().any(|e| matches!(e, GovernanceEvent::Frozen { until: 10 })));
    }
}
