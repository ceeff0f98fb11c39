//! Vote aggregation.
//!
//! Pure numeric bookkeeping: weighted yes/no/abstain buckets plus the quorum
//! and majority rules every voting strategy shares. Nothing here knows about
//! voters or time.

use crate::types::{VoteChoice, Weight};
use serde::{Deserialize, Serialize};

/// Denominator for quorum and basis numerators (parts per million).
pub const NUMERATOR_DENOMINATOR: u64 = 1_000_000;

/// Basis numerator giving a simple majority (`yes > no`).
pub const SIMPLE_MAJORITY_BASIS: u64 = 500_000;

/// Weighted vote counts for one proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub yes: Weight,
    pub no: Weight,
    pub abstain: Weight,
}

impl VoteTally {
    /// Add `weight` to the bucket for `choice`.
    pub fn add(&mut self, choice: VoteChoice, weight: Weight) {
        let bucket = match choice {
            VoteChoice::Yes => &mut self.yes,
            VoteChoice::No => &mut self.no,
            VoteChoice::Abstain => &mut self.abstain,
        };
        *bucket = bucket.saturating_add(weight);
    }

    /// All cast weight, the figure quorum is measured against.
    pub fn total(&self) -> Weight {
        self.yes.saturating_add(self.no).saturating_add(self.abstain)
    }

    pub fn meets_quorum(&self, quorum: Weight) -> bool {
        self.total() >= quorum
    }

    /// `yes > (yes + no) * basis / 1_000_000`. With the default basis this is
    /// exactly `yes > no`; abstentions never count towards the majority.
    pub fn meets_basis(&self, basis_numerator: u64) -> bool {
        let decided = self.yes.saturating_add(self.no);
        self.yes > scale(decided, basis_numerator)
    }
}

/// How a strategy derives its quorum figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuorumRule {
    /// Fraction (parts per million) of the total weight at the proposal snapshot.
    Fraction { numerator: u64 },
    /// Fixed amount of weight.
    Absolute { threshold: Weight },
}

impl QuorumRule {
    /// Quorum for a proposal whose snapshot total weight is `total_weight`.
    pub fn quorum(&self, total_weight: Weight) -> Weight {
        match *self {
            QuorumRule::Fraction { numerator } => scale(total_weight, numerator),
            QuorumRule::Absolute { threshold } => threshold,
        }
    }
}

/// `amount * numerator / 1_000_000` without overflowing for any `u128` amount.
pub fn scale(amount: Weight, numerator: u64) -> Weight {
    let denom = Weight::from(NUMERATOR_DENOMINATOR);
    let numerator = Weight::from(numerator);
    (amount / denom)
        .saturating_mul(numerator)
        .saturating_add((amount % denom) * numerator / denom)
}

/// Simple running count used by the freeze and veto tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdCount {
    pub votes: Weight,
}

impl ThresholdCount {
    pub fn add(&mut self, weight: Weight) {
        self.votes = self.votes.saturating_add(weight);
    }

    /// Inclusive check (`votes >= threshold`).
    pub fn reaches(&self, threshold: Weight) -> bool {
        self.votes >= threshold
    }

    /// Strict check (`votes > threshold`).
    pub fn exceeds(&self, threshold: Weight) -> bool {
        self.votes > threshold
    }
}
