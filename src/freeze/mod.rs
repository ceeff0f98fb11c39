//! Freeze and veto tracks.
//!
//! Two independent authorities sharing a voter weight source. The freeze
//! track blocks every transaction for a bounded period; the veto track blocks
//! one transaction hash permanently.

pub mod consensus;
pub mod veto;

#[cfg(test)]
mod proptests;

pub use consensus::{FreezeConsensus, FreezeParams, FreezeWindow};
pub use veto::VetoConsensus;
