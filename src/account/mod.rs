//! The guarded multi-party account.
//!
//! The account itself is external; this module holds its interface, the
//! guard hook on its direct path, and an in-memory stand-in.

pub mod guarded;
pub mod mock;
pub mod traits;

pub use guarded::GuardedAccount;
pub use mock::{ExecutionPath, MockSafe, TransferCall};
pub use traits::SafeAccount;
