//! Deployment configuration.
//!
//! One TOML file describes a deployment: governor periods, the voting
//! strategy, the freeze and veto tracks, and logging. Periods are written as
//! human-readable durations (`"3 days"`, `"12h"`) or bare seconds.

use crate::error::{GovernanceError, GovernanceResult};
use crate::freeze::FreezeParams;
use crate::strategy::{StrategyKind, StrategyParams};
use crate::tally::{QuorumRule, NUMERATOR_DENOMINATOR, SIMPLE_MAJORITY_BASIS};
use crate::types::{Address, Weight};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Config file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Invalid(#[from] GovernanceError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub governor: GovernorConfig,
    pub strategy: StrategyConfig,
    pub freeze: FreezeConfig,
    pub veto: VetoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// May enable strategies, cancel proposals and change periods.
    pub owner: Address,
    #[serde(with = "duration_secs")]
    pub voting_period: u64,
    #[serde(with = "duration_secs")]
    pub timelock_period: u64,
    #[serde(with = "duration_secs")]
    pub execution_period: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Fractional quorum (parts per million of snapshot supply). Fungible only.
    #[serde(default)]
    pub quorum_numerator: u64,
    /// Absolute quorum. NFT and member strategies.
    #[serde(default)]
    pub quorum_threshold: u64,
    #[serde(default = "default_basis")]
    pub basis_numerator: u64,
    #[serde(default)]
    pub required_proposer_weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreezeConfig {
    /// May unfreeze and change freeze parameters.
    pub owner: Address,
    pub votes_threshold: u64,
    #[serde(with = "duration_secs")]
    pub proposal_period: u64,
    #[serde(with = "duration_secs")]
    pub freeze_period: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VetoConfig {
    pub votes_threshold: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

fn default_basis() -> u64 {
    SIMPLE_MAJORITY_BASIS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

/// Parse a period: bare seconds, or a humantime duration.
pub fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(trimmed)
        .map(|d| d.as_secs())
        .map_err(|e| format!("Invalid duration '{}': {}", input, e))
}

mod duration_secs {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(secs: &u64, s: S) -> Result<S::Ok, S::Error> {
        let text = humantime::format_duration(Duration::from_secs(*secs)).to_string();
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Secs(secs) => Ok(secs),
            Raw::Text(text) => super::parse_duration_to_secs(&text).map_err(de::Error::custom),
        }
    }
}

fn invalid(msg: impl Into<String>) -> GovernanceError {
    GovernanceError::InvalidConfig(msg.into())
}

impl DeploymentConfig {
    /// Defaults with the given owner for both the governor and freeze track.
    pub fn with_owner(owner: Address) -> Self {
        Self {
            governor: GovernorConfig {
                owner,
                voting_period: 3 * 24 * 3600,
                timelock_period: 24 * 3600,
                execution_period: 3 * 24 * 3600,
            },
            strategy: StrategyConfig {
                kind: StrategyKind::Fungible,
                quorum_numerator: 40_000,
                quorum_threshold: 0,
                basis_numerator: SIMPLE_MAJORITY_BASIS,
                required_proposer_weight: 0,
            },
            freeze: FreezeConfig {
                owner,
                votes_threshold: 1_000,
                proposal_period: 2 * 24 * 3600,
                freeze_period: 7 * 24 * 3600,
            },
            veto: VetoConfig {
                votes_threshold: 1_000,
            },
            logging: LoggingConfig::default(),
        }
    }

    pub fn validate(&self) -> GovernanceResult<()> {
        if self.governor.voting_period == 0 {
            return Err(invalid("governor.voting_period must be positive"));
        }
        let s = &self.strategy;
        if s.quorum_numerator > NUMERATOR_DENOMINATOR {
            return Err(invalid(format!(
                "strategy.quorum_numerator {} exceeds {}",
                s.quorum_numerator, NUMERATOR_DENOMINATOR
            )));
        }
        if s.basis_numerator < SIMPLE_MAJORITY_BASIS || s.basis_numerator >= NUMERATOR_DENOMINATOR {
            return Err(invalid(format!(
                "strategy.basis_numerator {} outside [{}, {})",
                s.basis_numerator, SIMPLE_MAJORITY_BASIS, NUMERATOR_DENOMINATOR
            )));
        }
        if self.freeze.votes_threshold == 0 {
            return Err(invalid("freeze.votes_threshold must be positive"));
        }
        if self.freeze.proposal_period == 0 || self.freeze.freeze_period == 0 {
            return Err(invalid("freeze periods must be positive"));
        }
        if self.veto.votes_threshold == 0 {
            return Err(invalid("veto.votes_threshold must be positive"));
        }
        Ok(())
    }

    pub fn quorum_rule(&self) -> QuorumRule {
        match self.strategy.kind {
            StrategyKind::Fungible => QuorumRule::Fraction {
                numerator: self.strategy.quorum_numerator,
            },
            StrategyKind::Nft | StrategyKind::Members => QuorumRule::Absolute {
                threshold: Weight::from(self.strategy.quorum_threshold),
            },
        }
    }

    /// Strategy parameters for a strategy at `address` reporting to `governor`.
    pub fn strategy_params(&self, address: Address, governor: Address) -> StrategyParams {
        StrategyParams::new(
            address,
            self.governor.owner,
            governor,
            self.governor.voting_period,
        )
        .with_quorum(self.quorum_rule())
        .with_basis_numerator(self.strategy.basis_numerator)
        .with_required_proposer_weight(Weight::from(self.strategy.required_proposer_weight))
    }

    pub fn freeze_params(&self) -> FreezeParams {
        FreezeParams {
            votes_threshold: Weight::from(self.freeze.votes_threshold),
            proposal_period: self.freeze.proposal_period,
            freeze_period: self.freeze.freeze_period,
        }
    }

    /// Load and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DeploymentConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        write_creating_parent(path, &contents)
    }

    /// Default configuration as commented TOML.
    pub fn generate_default_toml(owner: Address) -> String {
        format!(
            r#"# Tollgate deployment configuration
#
# Periods accept bare seconds or human-readable durations ("12h", "3 days").
# Thresholds are raw voting weight.

[governor]
# Owner of the governor: enables strategies, cancels proposals, sets periods
owner = "{owner}"

# How long a proposal accepts votes
voting_period = "3 days"

# Delay between a proposal passing and its first transaction being executable
timelock_period = "1 day"

# Window after the timelock during which transactions may execute
execution_period = "3 days"

[strategy]
# fungible | nft | members
kind = "fungible"

# Fungible quorum, parts per million of total supply at proposal start
quorum_numerator = 40000

# Absolute quorum for nft and members strategies
quorum_threshold = 0

# Majority basis, parts per million of yes+no; 500000 = simple majority
basis_numerator = 500000

# Minimum weight required to submit proposals (0 = anyone)
required_proposer_weight = 0

[freeze]
# May unfreeze the account early and change freeze parameters
owner = "{owner}"

# Weight needed within one window to freeze the account
votes_threshold = 1000

# How long a freeze window accepts votes
proposal_period = "2 days"

# How long the account stays frozen once the threshold is reached
freeze_period = "7 days"

[veto]
# A transaction is vetoed once its veto weight exceeds this
votes_threshold = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/tollgate/tollgate.log"
"#,
            owner = owner
        )
    }

    pub fn create_default(path: &Path, owner: Address) -> Result<(), ConfigError> {
        write_creating_parent(path, &Self::generate_default_toml(owner))
    }
}

fn write_creating_parent(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// `~/.config/tollgate/config.toml`, or `./tollgate.toml` without a config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("tollgate").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("tollgate.toml"))
}
