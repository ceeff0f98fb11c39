//! Deterministic scenario runner.
//!
//! Builds a full in-memory pipeline (strategy, governor, freeze and veto
//! tracks, guard, account) from a [`DeploymentConfig`] on a [`ManualClock`],
//! then replays a JSON list of actions against it. Every step records either
//! its outcome or the error it produced; a failing step never stops the run.

use crate::account::{GuardedAccount, MockSafe, TransferCall};
use crate::clock::{Clock, ManualClock, SharedClock};
use crate::config::DeploymentConfig;
use crate::error::{GovernanceError, GovernanceResult};
use crate::freeze::{FreezeConsensus, VetoConsensus};
use crate::governor::{Governor, ProposalState};
use crate::guard::ExecutionGuard;
use crate::strategy::{
    LinearFungibleVoting, LinearNftVoting, MemberVoting, StrategyKind, VotingStrategy,
};
use crate::types::{
    Address, ProposalId, Timestamp, TokenRef, Transaction, TxHash, VoteChoice, Weight,
    WeightProof,
};
use crate::weights::{
    FungibleWeights, MockNftRegistry, MockTokenLedger, NftHolderWeights, NftRegistry,
    OwnerSetWeights, TokenHolderWeights, VoterWeights,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Fixed identities inside a simulated deployment.
pub const GOVERNOR_ADDRESS: Address = address(0x6060);
pub const STRATEGY_ADDRESS: Address = address(0x5757);
pub const SAFE_ADDRESS: Address = address(0x5afe);
pub const TOKEN_ADDRESS: Address = address(0x70ce);
pub const COLLECTION_ADDRESS: Address = address(0xc011);

/// Most NFTs a single scenario holder may be minted.
pub const MAX_NFTS_PER_HOLDER: u128 = 10_000;

const fn address(n: u16) -> Address {
    let mut bytes = [0u8; 20];
    let be = n.to_be_bytes();
    bytes[18] = be[0];
    bytes[19] = be[1];
    Address(bytes)
}

/// A scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Clock start (Unix seconds).
    #[serde(default)]
    pub start: Timestamp,
    /// Voters. Balance is governance token amount (fungible), NFT count
    /// (nft) or ignored (members).
    pub holders: Vec<Holder>,
    /// Treasury tokens held by the account, available to transfer transactions.
    #[serde(default)]
    pub safe_balance: u128,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holder {
    pub address: Address,
    #[serde(default)]
    pub balance: u128,
}

/// A transaction in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioTx {
    /// Move account tokens to `to`.
    Transfer { to: Address, amount: u128 },
    /// Any other call.
    Call(Transaction),
}

impl ScenarioTx {
    fn into_transaction(self) -> GovernanceResult<Transaction> {
        match self {
            ScenarioTx::Transfer { to, amount } => {
                TransferCall { to, amount }.into_transaction(TOKEN_ADDRESS)
            }
            ScenarioTx::Call(tx) => Ok(tx),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Advance {
        secs: u64,
    },
    Submit {
        proposer: Address,
        transactions: Vec<ScenarioTx>,
        #[serde(default)]
        metadata: String,
    },
    Vote {
        voter: Address,
        proposal_id: ProposalId,
        choice: VoteChoice,
    },
    Finalize {
        proposal_id: ProposalId,
    },
    /// Execute through the governor. `index` defaults to the next pending one.
    Execute {
        proposal_id: ProposalId,
        #[serde(default)]
        index: Option<usize>,
    },
    /// Execute through the account's direct, guarded path.
    ExecuteDirect {
        proposal_id: ProposalId,
        index: usize,
    },
    FreezeVote {
        voter: Address,
    },
    VetoVote {
        voter: Address,
        proposal_id: ProposalId,
        index: usize,
        #[serde(default)]
        also_freeze: bool,
    },
    Unfreeze {
        caller: Address,
    },
    Cancel {
        caller: Address,
        proposal_ids: Vec<ProposalId>,
    },
    State {
        proposal_id: ProposalId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Advanced { now: Timestamp },
    Submitted { proposal_id: ProposalId },
    Voted { weight: Weight },
    Finalized { timelocked: bool },
    Executed { index: usize },
    ExecutedDirect { tx_hash: TxHash },
    FreezeVoted { weight: Weight, frozen: bool },
    VetoVoted { weight: Weight, vetoed: bool },
    Unfrozen,
    Canceled,
    State { state: ProposalState },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub step: usize,
    pub at: Timestamp,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub steps: Vec<StepReport>,
    pub final_states: BTreeMap<ProposalId, ProposalState>,
    pub frozen: bool,
    /// Treasury balances of holders, the account and transfer recipients.
    pub balances: BTreeMap<Address, u128>,
}

/// The wired-up pipeline.
pub struct Pipeline {
    pub clock: ManualClock,
    pub governor: Governor,
    pub freeze: Arc<RwLock<FreezeConsensus>>,
    pub veto: Arc<RwLock<VetoConsensus>>,
    pub account: GuardedAccount<MockSafe>,
    /// Tokens the account can move; separate from voting weight.
    pub treasury: MockTokenLedger,
    nft: Option<MockNftRegistry>,
    accounts: BTreeSet<Address>,
}

impl Pipeline {
    pub fn new(config: &DeploymentConfig, scenario: &Scenario) -> GovernanceResult<Self> {
        config.validate()?;
        let clock = ManualClock::new(scenario.start);
        let shared: SharedClock = Arc::new(clock.clone());
        let params = config.strategy_params(STRATEGY_ADDRESS, GOVERNOR_ADDRESS);

        let treasury = MockTokenLedger::new();
        treasury.mint(SAFE_ADDRESS, scenario.safe_balance, 0);

        let mut nft = None;
        let (strategy, weights): (Box<dyn VotingStrategy>, Arc<dyn VoterWeights>) =
            match config.strategy.kind {
                StrategyKind::Fungible => {
                    let ledger = MockTokenLedger::new();
                    for h in &scenario.holders {
                        ledger.mint(h.address, h.balance, 0);
                    }
                    let source: Arc<dyn FungibleWeights> = Arc::new(ledger);
                    (
                        Box::new(LinearFungibleVoting::new(
                            params,
                            source.clone(),
                            shared.clone(),
                        )?),
                        Arc::new(TokenHolderWeights::new(source)),
                    )
                }
                StrategyKind::Nft => {
                    let registry = MockNftRegistry::new();
                    let mut next_id = 0u64;
                    for h in &scenario.holders {
                        if h.balance > MAX_NFTS_PER_HOLDER {
                            return Err(GovernanceError::InvalidConfig(format!(
                                "holder {} has {} NFTs, at most {} allowed",
                                h.address, h.balance, MAX_NFTS_PER_HOLDER
                            )));
                        }
                        for _ in 0..h.balance {
                            registry
                                .mint(COLLECTION_ADDRESS, next_id, h.address)
                                .map_err(|e| GovernanceError::InvalidConfig(e.to_string()))?;
                            next_id += 1;
                        }
                    }
                    let collections: BTreeMap<Address, Weight> =
                        [(COLLECTION_ADDRESS, 1)].into_iter().collect();
                    let source: Arc<dyn NftRegistry> = Arc::new(registry.clone());
                    nft = Some(registry);
                    (
                        Box::new(LinearNftVoting::new(
                            params,
                            source.clone(),
                            collections.clone(),
                            shared.clone(),
                        )?),
                        Arc::new(NftHolderWeights::new(source, collections)),
                    )
                }
                StrategyKind::Members => {
                    let members = OwnerSetWeights::new(scenario.holders.iter().map(|h| h.address));
                    (
                        Box::new(MemberVoting::new(params, members.clone(), shared.clone())?),
                        Arc::new(members),
                    )
                }
            };

        let mut governor = Governor::new(
            GOVERNOR_ADDRESS,
            config.governor.owner,
            config.governor.timelock_period,
            config.governor.execution_period,
            shared.clone(),
        );
        governor.enable_strategy(config.governor.owner, strategy)?;

        let freeze = Arc::new(RwLock::new(FreezeConsensus::new(
            config.freeze.owner,
            weights.clone(),
            config.freeze_params(),
            shared.clone(),
        )?));
        let veto = Arc::new(RwLock::new(VetoConsensus::new(
            config.freeze.owner,
            weights,
            Weight::from(config.veto.votes_threshold),
            freeze.clone(),
            shared.clone(),
        )?));
        let guard = ExecutionGuard::new(freeze.clone(), veto.clone(), shared.clone());
        governor.set_guard(config.governor.owner, Some(guard.clone()))?;

        let safe =
            MockSafe::new(SAFE_ADDRESS, shared).with_token(TOKEN_ADDRESS, treasury.clone());

        Ok(Self {
            clock,
            governor,
            freeze,
            veto,
            account: GuardedAccount::new(safe, guard),
            treasury,
            nft,
            accounts: scenario
                .holders
                .iter()
                .map(|h| h.address)
                .chain([SAFE_ADDRESS])
                .collect(),
        })
    }

    fn proof_for(&self, voter: &Address) -> WeightProof {
        match &self.nft {
            Some(registry) => WeightProof::Tokens(
                registry
                    .owned_ids(voter, &COLLECTION_ADDRESS)
                    .into_iter()
                    .map(|token_id| TokenRef {
                        collection: COLLECTION_ADDRESS,
                        token_id,
                    })
                    .collect(),
            ),
            None => WeightProof::None,
        }
    }

    fn transaction(&self, proposal_id: ProposalId, index: usize) -> GovernanceResult<Transaction> {
        self.governor
            .proposal(proposal_id)?
            .transactions
            .get(index)
            .cloned()
            .ok_or_else(|| {
                GovernanceError::InvalidState(format!(
                    "proposal {} has no transaction {}",
                    proposal_id, index
                ))
            })
    }

    pub fn apply(&mut self, action: &Action) -> GovernanceResult<Outcome> {
        match action {
            Action::Advance { secs } => Ok(Outcome::Advanced {
                now: self.clock.advance(*secs),
            }),
            Action::Submit {
                proposer,
                transactions,
                metadata,
            } => {
                for tx in transactions {
                    if let ScenarioTx::Transfer { to, .. } = tx {
                        self.accounts.insert(*to);
                    }
                }
                let txs = transactions
                    .iter()
                    .cloned()
                    .map(ScenarioTx::into_transaction)
                    .collect::<GovernanceResult<Vec<_>>>()?;
                let proposal_id =
                    self.governor
                        .submit_proposal(*proposer, STRATEGY_ADDRESS, txs, metadata)?;
                Ok(Outcome::Submitted { proposal_id })
            }
            Action::Vote {
                voter,
                proposal_id,
                choice,
            } => {
                let proof = self.proof_for(voter);
                let weight = self.governor.vote(*voter, *proposal_id, *choice, &proof)?;
                Ok(Outcome::Voted { weight })
            }
            Action::Finalize { proposal_id } => Ok(Outcome::Finalized {
                timelocked: self.governor.finalize(*proposal_id)?,
            }),
            Action::Execute { proposal_id, index } => {
                let index = match index {
                    Some(i) => *i,
                    None => self
                        .governor
                        .first_pending(*proposal_id)?
                        .ok_or(GovernanceError::NotExecutable(*proposal_id))?,
                };
                let tx = self.transaction(*proposal_id, index)?;
                let index = self
                    .governor
                    .execute_next(*proposal_id, &tx, self.account.inner_mut())?;
                Ok(Outcome::Executed { index })
            }
            Action::ExecuteDirect { proposal_id, index } => {
                let tx = self.transaction(*proposal_id, *index)?;
                let tx_hash = self.account.execute(&tx, &mut self.governor)?;
                Ok(Outcome::ExecutedDirect { tx_hash })
            }
            Action::FreezeVote { voter } => {
                let mut freeze = self.freeze.write().unwrap_or_else(PoisonError::into_inner);
                let weight = freeze.cast_freeze_vote(*voter)?;
                Ok(Outcome::FreezeVoted {
                    weight,
                    frozen: freeze.is_frozen(),
                })
            }
            Action::VetoVote {
                voter,
                proposal_id,
                index,
                also_freeze,
            } => {
                let tx_hash = self.governor.tx_hash(*proposal_id, *index)?;
                let mut veto = self.veto.write().unwrap_or_else(PoisonError::into_inner);
                let weight = veto.cast_veto_vote(*voter, tx_hash, *also_freeze, &self.governor)?;
                Ok(Outcome::VetoVoted {
                    weight,
                    vetoed: veto.get_is_vetoed(&tx_hash),
                })
            }
            Action::Unfreeze { caller } => {
                self.freeze
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .unfreeze(*caller)?;
                Ok(Outcome::Unfrozen)
            }
            Action::Cancel {
                caller,
                proposal_ids,
            } => {
                self.governor.cancel(*caller, proposal_ids)?;
                Ok(Outcome::Canceled)
            }
            Action::State { proposal_id } => Ok(Outcome::State {
                state: self.governor.proposal_state(*proposal_id)?,
            }),
        }
    }

    fn report(&self, steps: Vec<StepReport>) -> ScenarioReport {
        let final_states = (0..self.governor.total_proposals())
            .filter_map(|i| {
                let id = ProposalId::try_from(i).ok()?;
                Some((id, self.governor.proposal_state(id).ok()?))
            })
            .collect();
        let balances = self
            .accounts
            .iter()
            .map(|account| (*account, self.treasury.balance_of(account)))
            .collect();
        ScenarioReport {
            steps,
            final_states,
            frozen: self
                .freeze
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_frozen(),
            balances,
        }
    }
}

/// Replay `scenario` against a fresh pipeline built from `config`.
pub fn run(config: &DeploymentConfig, scenario: &Scenario) -> GovernanceResult<ScenarioReport> {
    let mut pipeline = Pipeline::new(config, scenario)?;
    let mut steps = Vec::with_capacity(scenario.actions.len());
    for (step, action) in scenario.actions.iter().enumerate() {
        let result = pipeline.apply(action);
        let at = pipeline.clock.now();
        info!(step, at, ok = result.is_ok(), "scenario step");
        let (outcome, error) = match result {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => (None, Some(e.to_string())),
        };
        steps.push(StepReport {
            step,
            at,
            action: action.clone(),
            outcome,
            error,
        });
    }
    Ok(pipeline.report(steps))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn members_config() -> DeploymentConfig {
        let mut config = DeploymentConfig::with_owner(addr(0x0a0a));
        config.strategy.kind = StrategyKind::Members;
        config.strategy.quorum_threshold = 2;
        config.governor.voting_period = 10;
        config.governor.timelock_period = 10;
        config.governor.execution_period = 10;
        config.freeze.votes_threshold = 3;
        config.veto.votes_threshold = 1;
        config
    }

    #[test]
    fn test_constant_addresses() {
        assert_eq!(GOVERNOR_ADDRESS, addr(0x6060));
        assert_eq!(SAFE_ADDRESS, addr(0x5afe));
    }

    #[test]
    fn test_scenario_json_parses() {
        let json = r#"{
            "start": 100,
            "holders": [{"address": "0x0000000000000000000000000000000000000001", "balance": 5}],
            "actions": [
                {"action": "advance", "secs": 5},
                {"action": "submit", "proposer": "0x0000000000000000000000000000000000000001",
                 "transactions": [{"transfer": {"to": "0x0000000000000000000000000000000000000002", "amount": 3}}]},
                {"action": "execute", "proposal_id": 0},
                {"action": "veto_vote", "voter": "0x0000000000000000000000000000000000000001",
                 "proposal_id": 0, "index": 0, "also_freeze": true}
            ]
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.actions.len(), 4);
        assert!(matches!(
            scenario.actions[2],
            Action::Execute {
                proposal_id: 0,
                index: None
            }
        ));
    }

    #[test]
    fn test_members_scenario_runs_to_execution() {
        let scenario = Scenario {
            start: 1_000,
            holders: [1, 2, 3]
                .into_iter()
                .map(|n| Holder {
                    address: addr(n),
                    balance: 0,
                })
                .collect(),
            safe_balance: 50,
            actions: vec![
                Action::Submit {
                    proposer: addr(1),
                    transactions: vec![ScenarioTx::Transfer {
                        to: addr(9),
                        amount: 20,
                    }],
                    metadata: "pay".to_string(),
                },
                Action::Vote {
                    voter: addr(1),
                    proposal_id: 0,
                    choice: VoteChoice::Yes,
                },
                Action::Vote {
                    voter: addr(2),
                    proposal_id: 0,
                    choice: VoteChoice::Yes,
                },
                Action::Advance { secs: 11 },
                Action::Finalize { proposal_id: 0 },
                Action::ExecuteDirect {
                    proposal_id: 0,
                    index: 0,
                },
                Action::Advance { secs: 10 },
                Action::Execute {
                    proposal_id: 0,
                    index: None,
                },
            ],
        };
        let report = run(&members_config(), &scenario).unwrap();
        assert!(report.steps[5]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("still timelocked")));
        assert_eq!(
            report.steps[7].outcome,
            Some(Outcome::Executed { index: 0 })
        );
        assert_eq!(report.final_states[&0], ProposalState::Executed);
        assert_eq!(report.balances[&addr(9)], 20);
        assert_eq!(report.balances[&SAFE_ADDRESS], 30);
    }

    #[test]
    fn test_nft_scenario_builds_proofs() {
        let mut config = members_config();
        config.strategy.kind = StrategyKind::Nft;
        config.strategy.quorum_threshold = 3;
        let scenario = Scenario {
            start: 0,
            holders: vec![Holder {
                address: addr(1),
                balance: 3,
            }],
            safe_balance: 0,
            actions: vec![
                Action::Submit {
                    proposer: addr(1),
                    transactions: vec![ScenarioTx::Call(Transaction::call(addr(4), 0, vec![]))],
                    metadata: String::new(),
                },
                Action::Vote {
                    voter: addr(1),
                    proposal_id: 0,
                    choice: VoteChoice::Yes,
                },
            ],
        };
        let report = run(&config, &scenario).unwrap();
        assert_eq!(report.steps[1].outcome, Some(Outcome::Voted { weight: 3 }));
        assert_eq!(report.balances[&addr(1)], 0);
    }

    #[test]
    fn test_nft_holder_count_is_capped() {
        let mut config = members_config();
        config.strategy.kind = StrategyKind::Nft;
        let scenario = Scenario {
            start: 0,
            holders: vec![Holder {
                address: addr(1),
                balance: u128::MAX,
            }],
            safe_balance: 0,
            actions: Vec::new(),
        };
        assert!(matches!(
            run(&config, &scenario),
            Err(GovernanceError::InvalidConfig(msg)) if msg.contains("NFTs")
        ));
    }

    #[test]
    fn test_pipeline_freeze_blocks_module_execution() {
        let scenario = Scenario {
            start: 0,
            holders: [1, 2, 3]
                .into_iter()
                .map(|n| Holder {
                    address: addr(n),
                    balance: 0,
                })
                .collect(),
            safe_balance: 0,
            actions: Vec::new(),
        };
        let mut pipeline = Pipeline::new(&members_config(), &scenario).unwrap();
        let submit = Action::Submit {
            proposer: addr(1),
            transactions: vec![ScenarioTx::Call(Transaction::call(addr(4), 0, vec![]))],
            metadata: String::new(),
        };
        pipeline.apply(&submit).unwrap();
        for voter in [1, 2] {
            pipeline
                .apply(&Action::Vote {
                    voter: addr(voter),
                    proposal_id: 0,
                    choice: VoteChoice::Yes,
                })
                .unwrap();
        }
        pipeline.apply(&Action::Advance { secs: 11 }).unwrap();
        pipeline.apply(&Action::Finalize { proposal_id: 0 }).unwrap();
        pipeline.apply(&Action::Advance { secs: 10 }).unwrap();
        for voter in [1, 2, 3] {
            pipeline
                .apply(&Action::FreezeVote { voter: addr(voter) })
                .unwrap();
        }
        assert_eq!(
            pipeline.apply(&Action::Execute {
                proposal_id: 0,
                index: None
            }),
            Err(GovernanceError::DaoFrozen)
        );
        pipeline
            .apply(&Action::Unfreeze {
                caller: addr(0x0a0a),
            })
            .unwrap();
        assert_eq!(
            pipeline.apply(&Action::Execute {
                proposal_id: 0,
                index: None
            }),
            Ok(Outcome::Executed { index: 0 })
        );
        assert_eq!(pipeline.clock.now(), 21);
    }
}
