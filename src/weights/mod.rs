//! External weight sources (token balances, NFT ownership, owner sets).

pub mod mock;
pub mod traits;

pub use mock::{LedgerError, MockNftRegistry, MockTokenLedger};
pub use traits::{
    checkpoint_before, FungibleWeights, NftHolderWeights, NftRegistry, OwnerSetWeights, TokenHolderWeights,
    VoterWeights,
};
