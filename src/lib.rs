//! Tollgate - transaction gating for shared multi-party accounts
//!
//! Batches of transactions are proposed, voted on by a pluggable strategy,
//! timelocked, and executed one at a time through the account. Independently,
//! token or NFT holders can freeze the account or veto single transactions,
//! and an execution guard enforces both on every path the account exposes.
//!
//! Key principles:
//! - Voting weight is always read at a snapshot, never live
//! - Every state change is synchronous and all-or-nothing
//! - Time is observed lazily against one shared clock
//! - Transactions are identified by content hash only

pub mod account;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod freeze;
pub mod governor;
pub mod guard;
pub mod scenario;
pub mod serialization;
pub mod strategy;
pub mod tally;
pub mod types;
pub mod weights;

pub use error::{GovernanceError, GovernanceResult};
