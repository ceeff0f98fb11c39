//! Error taxonomy for the authorization pipeline.
//!
//! Every failure is local and synchronous. The caller decides whether to
//! retry; only [`GovernanceError::UnderlyingExecutionFailed`] leaves state
//! untouched in a way that makes retrying meaningful.

use crate::types::{Address, ProposalId, TokenRef, TxHash};

/// Result type for pipeline operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Coarse classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong caller for a privileged, owner-only or strategy-only operation.
    Unauthorized,
    /// Operation attempted outside its legal state.
    InvalidState,
    /// Quorum, majority, freeze or veto threshold not met.
    ThresholdNotMet,
    /// A time window check failed on the "too late" side.
    Expired,
    /// Double vote, double timelock.
    AlreadyDone,
    /// Timelock or voting period has not elapsed yet.
    NotYetReady,
    /// Configuration, serialization or the external account.
    External,
}

/// Pipeline errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GovernanceError {
    #[error("Unauthorized caller {caller}")]
    Unauthorized { caller: Address },

    #[error("Caller {caller} is not the owner")]
    NotOwner { caller: Address },

    #[error("Address {0} does not meet the proposer weight requirement")]
    NotProposer(Address),

    #[error("Proposal {0} not found")]
    ProposalNotFound(ProposalId),

    #[error("Proposal {0} has not been submitted to this strategy")]
    NotSubmitted(ProposalId),

    #[error("Voting on proposal {0} is closed")]
    VotingClosed(ProposalId),

    #[error("Voting on proposal {0} is not over")]
    VotingNotOver(ProposalId),

    #[error("{voter} already voted")]
    AlreadyVoted { voter: Address },

    #[error("{voter} has no voting weight")]
    NoVotes { voter: Address },

    #[error("Token {}#{} is not owned by the voter or not registered", .0.collection, .0.token_id)]
    InvalidToken(TokenRef),

    #[error("Token {}#{} already voted on proposal {}", .0.collection, .0.token_id, .1)]
    TokenAlreadyUsed(TokenRef, ProposalId),

    #[error("Quorum not reached on proposal {0}")]
    QuorumNotReached(ProposalId),

    #[error("Majority not reached on proposal {0}")]
    MajorityNotReached(ProposalId),

    #[error("Proposal {0} did not pass")]
    NotPassed(ProposalId),

    #[error("Transaction batch is empty")]
    EmptyBatch,

    #[error("Strategy {0} is not enabled")]
    StrategyNotEnabled(Address),

    #[error("Strategy {0} is already enabled")]
    StrategyAlreadyEnabled(Address),

    #[error("Proposal {0} is already timelocked")]
    AlreadyTimelocked(ProposalId),

    #[error("Transaction does not match hash at index {index} of proposal {proposal_id}")]
    HashMismatch {
        proposal_id: ProposalId,
        index: usize,
    },

    #[error("Proposal {0} is not executable")]
    NotExecutable(ProposalId),

    #[error("Execution deadline of proposal {0} elapsed")]
    DeadlineElapsed(ProposalId),

    #[error("Underlying account failed to execute {0}")]
    UnderlyingExecutionFailed(TxHash),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("DAO is frozen")]
    DaoFrozen,

    #[error("Transaction {0} is not timelocked")]
    NotTimelocked(TxHash),

    #[error("Transaction {0} is still timelocked")]
    StillTimelocked(TxHash),

    #[error("Transaction {0} expired")]
    Expired(TxHash),

    #[error("Transaction {0} was vetoed")]
    Vetoed(TxHash),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GovernanceError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        use GovernanceError::*;
        match self {
            Unauthorized { .. } | NotOwner { .. } | NotProposer(_) | NoVotes { .. }
            | InvalidToken(_) | StrategyNotEnabled(_) => ErrorKind::Unauthorized,
            ProposalNotFound(_) | NotSubmitted(_) | EmptyBatch | HashMismatch { .. }
            | NotExecutable(_) | NotTimelocked(_) | NotPassed(_) | InvalidState(_)
            | DaoFrozen | Vetoed(_) => ErrorKind::InvalidState,
            QuorumNotReached(_) | MajorityNotReached(_) => ErrorKind::ThresholdNotMet,
            VotingClosed(_) | DeadlineElapsed(_) | Expired(_) => ErrorKind::Expired,
            AlreadyVoted { .. } | TokenAlreadyUsed(..) | AlreadyTimelocked(_)
            | StrategyAlreadyEnabled(_) => ErrorKind::AlreadyDone,
            VotingNotOver(_) | StillTimelocked(_) => ErrorKind::NotYetReady,
            UnderlyingExecutionFailed(_) | InvalidConfig(_) | Serialization(_) => {
                ErrorKind::External
            }
        }
    }

    /// True when repeating the same call can succeed without any other state change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GovernanceError::UnderlyingExecutionFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let who = Address::from_low_u64(7);
        assert_eq!(
            GovernanceError::AlreadyVoted { voter: who }.kind(),
            ErrorKind::AlreadyDone
        );
        assert_eq!(
            GovernanceError::QuorumNotReached(1).kind(),
            ErrorKind::ThresholdNotMet
        );
        assert_eq!(
            GovernanceError::StillTimelocked(TxHash([0; 32])).kind(),
            ErrorKind::NotYetReady
        );
        assert_eq!(
            GovernanceError::DeadlineElapsed(3).kind(),
            ErrorKind::Expired
        );
        assert_eq!(
            GovernanceError::NotOwner { caller: who }.kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn test_only_underlying_failure_is_retryable() {
        assert!(GovernanceError::UnderlyingExecutionFailed(TxHash([1; 32])).is_retryable());
        assert!(!GovernanceError::Vetoed(TxHash([1; 32])).is_retryable());
        assert!(!GovernanceError::DaoFrozen.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = GovernanceError::HashMismatch {
            proposal_id: 4,
            index: 2,
        };
        assert_eq!(
            err.to_string(),
            "Transaction does not match hash at index 2 of proposal 4"
        );

        let token = TokenRef {
            collection: Address::from_low_u64(0xc011),
            token_id: 9,
        };
        assert_eq!(
            GovernanceError::TokenAlreadyUsed(token, 3).to_string(),
            format!("Token {}#9 already voted on proposal 3", token.collection)
        );
    }
}
