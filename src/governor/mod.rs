//! Proposal state machine.
//!
//! The governor owns every proposal and the registry of enabled voting
//! strategies. It forwards submissions and votes to the proposal's strategy,
//! timelocks proposals the strategy reports as passed, and executes their
//! transactions one by one, strictly in order, through the account's module
//! path. Calls the account ran on its guarded direct path are recorded here
//! too, so no transaction runs twice.
//!
//! ```text
//! Active -> Canceled
//!        -> Failed
//!        -> TimeLocked -> Executable -> Executing -> Executed
//!                                  \-------------\-> Expired
//! ```

pub mod proposal;

#[cfg(test)]
mod proptests;

pub use proposal::{
    DirectExecutionLedger, NextPosition, Proposal, ProposalState, TimelockLookup, TimelockRecord,
};

use crate::account::SafeAccount;
use crate::clock::SharedClock;
use crate::error::{GovernanceError, GovernanceResult};
use crate::events::{EventLog, GovernanceEvent};
use crate::guard::ExecutionGuard;
use crate::serialization::hash_transaction;
use crate::strategy::{ProposalMetadata, VotingStrategy};
use crate::tally::VoteTally;
use crate::types::{Address, ProposalId, Transaction, TxHash, VoteChoice, Weight, WeightProof};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

pub struct Governor {
    address: Address,
    owner: Address,
    clock: SharedClock,
    timelock_period: u64,
    execution_period: u64,
    strategies: HashMap<Address, Box<dyn VotingStrategy>>,
    enabled: HashSet<Address>,
    proposals: Vec<Proposal>,
    guard: Option<ExecutionGuard>,
    events: EventLog,
}

impl Governor {
    /// `address` is the identity strategies expect as the caller of
    /// `receive_proposal`.
    pub fn new(
        address: Address,
        owner: Address,
        timelock_period: u64,
        execution_period: u64,
        clock: SharedClock,
    ) -> Self {
        Self {
            address,
            owner,
            clock,
            timelock_period,
            execution_period,
            strategies: HashMap::new(),
            enabled: HashSet::new(),
            proposals: Vec::new(),
            guard: None,
            events: EventLog::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn timelock_period(&self) -> u64 {
        self.timelock_period
    }

    pub fn execution_period(&self) -> u64 {
        self.execution_period
    }

    fn ensure_owner(&self, caller: Address) -> GovernanceResult<()> {
        if caller != self.owner {
            return Err(GovernanceError::NotOwner { caller });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Strategy registry
    // ------------------------------------------------------------------

    /// Add `strategy` to the allow-list.
    ///
    /// Re-enabling a disabled address keeps the registered instance (and the
    /// tallies of its proposals); the new instance is dropped.
    pub fn enable_strategy(
        &mut self,
        caller: Address,
        strategy: Box<dyn VotingStrategy>,
    ) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        let address = strategy.address();
        if self.enabled.contains(&address) {
            return Err(GovernanceError::StrategyAlreadyEnabled(address));
        }
        if strategy.core().governor() != self.address {
            return Err(GovernanceError::InvalidConfig(format!(
                "strategy {} reports to governor {}, not {}",
                address,
                strategy.core().governor(),
                self.address
            )));
        }
        self.strategies.entry(address).or_insert(strategy);
        self.enabled.insert(address);
        info!(strategy = %address, "strategy enabled");
        self.events
            .push(GovernanceEvent::StrategyEnabled { strategy: address });
        Ok(())
    }

    /// Remove `strategy` from the allow-list. Proposals already submitted to
    /// it keep voting and executing.
    pub fn disable_strategy(&mut self, caller: Address, strategy: Address) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        if !self.enabled.remove(&strategy) {
            return Err(GovernanceError::StrategyNotEnabled(strategy));
        }
        info!(strategy = %strategy, "strategy disabled");
        self.events
            .push(GovernanceEvent::StrategyDisabled { strategy });
        Ok(())
    }

    pub fn is_strategy_enabled(&self, strategy: &Address) -> bool {
        self.enabled.contains(strategy)
    }

    pub fn strategy(&self, strategy: &Address) -> Option<&dyn VotingStrategy> {
        self.strategies.get(strategy).map(|s| s.as_ref())
    }

    pub fn strategy_mut(
        &mut self,
        strategy: &Address,
    ) -> Option<&mut (dyn VotingStrategy + 'static)> {
        self.strategies.get_mut(strategy).map(|s| s.as_mut())
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    pub fn set_guard(&mut self, caller: Address, guard: Option<ExecutionGuard>) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        self.guard = guard;
        Ok(())
    }

    pub fn guard(&self) -> Option<&ExecutionGuard> {
        self.guard.as_ref()
    }

    /// Applies to proposals submitted after the change.
    pub fn update_timelock_period(&mut self, caller: Address, period: u64) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        self.timelock_period = period;
        self.events
            .push(GovernanceEvent::TimelockPeriodUpdated { period });
        Ok(())
    }

    /// Applies to proposals submitted after the change.
    pub fn update_execution_period(
        &mut self,
        caller: Address,
        period: u64,
    ) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        self.execution_period = period;
        self.events
            .push(GovernanceEvent::ExecutionPeriodUpdated { period });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn submit_proposal(
        &mut self,
        proposer: Address,
        strategy: Address,
        transactions: Vec<Transaction>,
        metadata: &str,
    ) -> GovernanceResult<ProposalId> {
        if transactions.is_empty() {
            return Err(GovernanceError::EmptyBatch);
        }
        if !self.enabled.contains(&strategy) {
            return Err(GovernanceError::StrategyNotEnabled(strategy));
        }
        let tx_hashes = transactions
            .iter()
            .map(hash_transaction)
            .collect::<Result<Vec<_>, _>>()?;
        let id = ProposalId::try_from(self.proposals.len()).map_err(|_| {
            GovernanceError::InvalidState("proposal id space exhausted".to_string())
        })?;
        let now = self.clock.now();
        let governor = self.address;

        let voting = self
            .strategies
            .get_mut(&strategy)
            .ok_or(GovernanceError::StrategyNotEnabled(strategy))?;
        if !voting.is_proposer(&proposer) {
            return Err(GovernanceError::NotProposer(proposer));
        }
        voting.receive_proposal(
            governor,
            ProposalMetadata {
                proposal_id: id,
                proposer,
                start: now,
            },
        )?;

        let tx_count = transactions.len();
        self.proposals.push(Proposal {
            id,
            strategy,
            proposer,
            transactions,
            tx_hashes,
            metadata: metadata.to_string(),
            executed: vec![false; tx_count],
            timelocked_at: None,
            timelock_period: self.timelock_period,
            execution_period: self.execution_period,
            canceled: false,
        });

        info!(proposal_id = id, strategy = %strategy, proposer = %proposer, tx_count, "proposal submitted");
        self.events.push(GovernanceEvent::ProposalCreated {
            proposal_id: id,
            strategy,
            proposer,
            tx_count,
            metadata: metadata.to_string(),
        });
        Ok(id)
    }

    /// Cast a vote through the proposal's strategy.
    pub fn vote(
        &mut self,
        voter: Address,
        proposal_id: ProposalId,
        choice: VoteChoice,
        proof: &WeightProof,
    ) -> GovernanceResult<Weight> {
        let proposal = self.proposal(proposal_id)?;
        if proposal.canceled {
            return Err(GovernanceError::InvalidState(format!(
                "proposal {} is canceled",
                proposal_id
            )));
        }
        let strategy = proposal.strategy;
        self.strategies
            .get_mut(&strategy)
            .ok_or(GovernanceError::StrategyNotEnabled(strategy))?
            .vote(voter, proposal_id, choice, proof)
    }

    /// Timelock the proposal if its strategy reports it passed.
    ///
    /// Returns `Ok(true)` when this call timelocked it and `Ok(false)` when it
    /// was already timelocked and is still live. Once the execution deadline
    /// passes the proposal is dead and this fails with `DeadlineElapsed`.
    pub fn finalize(&mut self, proposal_id: ProposalId) -> GovernanceResult<bool> {
        let now = self.clock.now();
        let proposal = self.proposal(proposal_id)?;
        if proposal.canceled {
            return Err(GovernanceError::InvalidState(format!(
                "proposal {} is canceled",
                proposal_id
            )));
        }
        if let Some(record) = proposal.timelock_record() {
            if record.deadline_elapsed(now) && !proposal.is_fully_executed() {
                return Err(GovernanceError::DeadlineElapsed(proposal_id));
            }
            return Ok(false);
        }
        self.strategy_for(proposal)?.is_passed(proposal_id)?;
        self.apply_timelock(proposal_id, now)?;
        Ok(true)
    }

    /// Strict form of [`Self::finalize`]: fails if already timelocked, and
    /// reports any not-passed outcome as `NotPassed`.
    pub fn timelock(&mut self, proposal_id: ProposalId) -> GovernanceResult<()> {
        let now = self.clock.now();
        let proposal = self.proposal(proposal_id)?;
        if proposal.timelocked_at.is_some() {
            return Err(GovernanceError::AlreadyTimelocked(proposal_id));
        }
        if proposal.canceled {
            return Err(GovernanceError::InvalidState(format!(
                "proposal {} is canceled",
                proposal_id
            )));
        }
        self.strategy_for(proposal)?
            .is_passed(proposal_id)
            .map_err(|_| GovernanceError::NotPassed(proposal_id))?;
        self.apply_timelock(proposal_id, now)
    }

    fn apply_timelock(&mut self, proposal_id: ProposalId, now: u64) -> GovernanceResult<()> {
        let proposal = self.proposal_mut(proposal_id)?;
        proposal.timelocked_at = Some(now);
        info!(proposal_id, at = now, "proposal timelocked");
        self.events
            .push(GovernanceEvent::ProposalTimelocked { proposal_id, at: now });
        Ok(())
    }

    /// Execute the next transaction of the batch via the account's module
    /// path. Returns the index executed.
    ///
    /// A position only counts as executed when the account reports success,
    /// so a failed call can be retried. Vetoed positions are passed over.
    pub fn execute_next(
        &mut self,
        proposal_id: ProposalId,
        tx: &Transaction,
        account: &mut dyn SafeAccount,
    ) -> GovernanceResult<usize> {
        let proposal = self.proposal(proposal_id)?;
        let tx_hash = hash_transaction(tx)?;
        let index = match proposal.next_position(&tx_hash, |h| self.is_vetoed(h)) {
            NextPosition::Ready(index) => index,
            NextPosition::Mismatch(index) => {
                return Err(GovernanceError::HashMismatch { proposal_id, index });
            }
            NextPosition::Done => return Err(GovernanceError::NotExecutable(proposal_id)),
        };

        match self.state_of(proposal) {
            ProposalState::Executable | ProposalState::Executing => {}
            ProposalState::Expired => return Err(GovernanceError::DeadlineElapsed(proposal_id)),
            _ => return Err(GovernanceError::NotExecutable(proposal_id)),
        }

        if let Some(guard) = &self.guard {
            guard.check_transaction(&tx_hash, proposal.timelock_record())?;
        }

        if !account.execute_from_module(tx) {
            warn!(proposal_id, index, tx_hash = %tx_hash, "underlying execution failed");
            return Err(GovernanceError::UnderlyingExecutionFailed(tx_hash));
        }

        self.mark_executed(proposal_id, index, tx_hash)?;
        info!(proposal_id, index, tx_hash = %tx_hash, "transaction executed");
        Ok(index)
    }

    fn mark_executed(
        &mut self,
        proposal_id: ProposalId,
        index: usize,
        tx_hash: TxHash,
    ) -> GovernanceResult<()> {
        self.proposal_mut(proposal_id)?.mark_executed(index);
        self.events.push(GovernanceEvent::ProposalExecuted {
            proposal_id,
            index,
            tx_hash,
        });
        Ok(())
    }

    fn is_vetoed(&self, tx_hash: &TxHash) -> bool {
        self.guard.as_ref().is_some_and(|g| g.is_vetoed(tx_hash))
    }

    /// Cancel every listed proposal, or none of them.
    ///
    /// A proposal can be canceled while voting, while timelocked, and while
    /// executable as long as nothing has executed yet.
    pub fn cancel(&mut self, caller: Address, proposal_ids: &[ProposalId]) -> GovernanceResult<()> {
        self.ensure_owner(caller)?;
        for id in proposal_ids {
            let proposal = self.proposal(*id)?;
            let state = self.state_of(proposal);
            let cancelable = match state {
                ProposalState::Active | ProposalState::TimeLocked => true,
                ProposalState::Executable => proposal.executed_count() == 0,
                _ => false,
            };
            if !cancelable {
                return Err(GovernanceError::InvalidState(format!(
                    "proposal {} cannot be canceled while {}",
                    id, state
                )));
            }
        }
        for id in proposal_ids {
            self.proposal_mut(*id)?.canceled = true;
        }
        info!(proposal_ids = ?proposal_ids, "proposals canceled");
        self.events.push(GovernanceEvent::ProposalsCanceled {
            proposal_ids: proposal_ids.to_vec(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn proposal(&self, proposal_id: ProposalId) -> GovernanceResult<&Proposal> {
        self.proposals
            .get(proposal_id as usize)
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))
    }

    fn proposal_mut(&mut self, proposal_id: ProposalId) -> GovernanceResult<&mut Proposal> {
        self.proposals
            .get_mut(proposal_id as usize)
            .ok_or(GovernanceError::ProposalNotFound(proposal_id))
    }

    fn strategy_for(&self, proposal: &Proposal) -> GovernanceResult<&dyn VotingStrategy> {
        self.strategy(&proposal.strategy)
            .ok_or(GovernanceError::StrategyNotEnabled(proposal.strategy))
    }

    pub fn proposal_state(&self, proposal_id: ProposalId) -> GovernanceResult<ProposalState> {
        Ok(self.state_of(self.proposal(proposal_id)?))
    }

    fn state_of(&self, proposal: &Proposal) -> ProposalState {
        let now = self.clock.now();
        if let Some(state) = proposal.timelocked_state(now) {
            return state;
        }
        if proposal.canceled {
            return ProposalState::Canceled;
        }
        match self.strategy_for(proposal).map(|s| s.is_passed(proposal.id)) {
            Ok(Ok(())) | Ok(Err(GovernanceError::VotingNotOver(_))) => ProposalState::Active,
            _ => ProposalState::Failed,
        }
    }

    pub fn tx_hash(&self, proposal_id: ProposalId, index: usize) -> GovernanceResult<TxHash> {
        self.proposal(proposal_id)?
            .tx_hashes
            .get(index)
            .copied()
            .ok_or_else(|| {
                GovernanceError::InvalidState(format!(
                    "proposal {} has no transaction {}",
                    proposal_id, index
                ))
            })
    }

    pub fn tx_hashes(&self, proposal_id: ProposalId) -> GovernanceResult<&[TxHash]> {
        Ok(&self.proposal(proposal_id)?.tx_hashes)
    }

    pub fn executed_count(&self, proposal_id: ProposalId) -> GovernanceResult<usize> {
        Ok(self.proposal(proposal_id)?.executed_count())
    }

    /// Lowest index of `proposal_id` not yet executed, if any.
    pub fn first_pending(&self, proposal_id: ProposalId) -> GovernanceResult<Option<usize>> {
        Ok(self.proposal(proposal_id)?.first_pending())
    }

    pub fn total_proposals(&self) -> usize {
        self.proposals.len()
    }

    /// Current tally from the proposal's strategy.
    pub fn votes(&self, proposal_id: ProposalId) -> GovernanceResult<VoteTally> {
        let proposal = self.proposal(proposal_id)?;
        self.strategy_for(proposal)?
            .tally(proposal_id)
            .ok_or(GovernanceError::NotSubmitted(proposal_id))
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GovernanceEvent> {
        self.events.drain()
    }
}

impl TimelockLookup for Governor {
    /// The most recently timelocked live proposal holding `tx_hash` at a
    /// position not yet executed.
    fn timelock_record(&self, tx_hash: &TxHash) -> Option<TimelockRecord> {
        self.proposals
            .iter()
            .filter(|p| !p.canceled && p.pending_contains(tx_hash))
            .filter_map(|p| p.timelock_record())
            .max_by_key(|r| (r.timelocked_at, r.proposal_id))
    }
}

impl DirectExecutionLedger for Governor {
    fn record_direct_execution(
        &mut self,
        proposal_id: ProposalId,
        tx_hash: &TxHash,
    ) -> GovernanceResult<usize> {
        let proposal = self.proposal(proposal_id)?;
        let index = proposal
            .pending()
            .find(|(_, h)| *h == tx_hash)
            .map(|(i, _)| i)
            .ok_or(GovernanceError::NotTimelocked(*tx_hash))?;
        self.mark_executed(proposal_id, index, *tx_hash)?;
        info!(proposal_id, index, tx_hash = %tx_hash, "direct execution recorded");
        Ok(index)
    }
}
