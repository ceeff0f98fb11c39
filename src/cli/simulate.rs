use super::config_path;
use std::fs;
use tollgate::config::DeploymentConfig;
use tollgate::scenario::{self, Scenario, ScenarioReport};
use tracing::info;

/// Replay a scenario file and print the JSON report to stdout.
///
/// Step failures are part of the report; only unreadable input or an invalid
/// deployment makes the command fail.
pub fn execute(
    scenario: String,
    config: Option<String>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = DeploymentConfig::load(&config_path(config.as_deref()))?;
    let report = run_file(&config, &scenario)?;
    let failed = report.steps.iter().filter(|s| s.error.is_some()).count();
    info!(steps = report.steps.len(), failed, "scenario finished");

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

pub fn run_file(
    config: &DeploymentConfig,
    path: &str,
) -> Result<ScenarioReport, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path, e))?;
    let scenario: Scenario = serde_json::from_str(&text)?;
    Ok(scenario::run(config, &scenario)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tollgate::governor::ProposalState;
    use tollgate::strategy::StrategyKind;
    use tollgate::types::Address;

    const SCENARIO: &str = r#"{
        "holders": [
            {"address": "0x0000000000000000000000000000000000000001"},
            {"address": "0x0000000000000000000000000000000000000002"}
        ],
        "actions": [
            {"action": "submit", "proposer": "0x0000000000000000000000000000000000000001",
             "transactions": [{"call": {"target": "0x0000000000000000000000000000000000000009",
                                        "value": 0, "payload": ""}}]},
            {"action": "vote", "voter": "0x0000000000000000000000000000000000000002",
             "proposal_id": 0, "choice": "no"},
            {"action": "vote", "voter": "0x0000000000000000000000000000000000000002",
             "proposal_id": 0, "choice": "yes"},
            {"action": "advance", "secs": 100},
            {"action": "state", "proposal_id": 0}
        ]
    }"#;

    fn config() -> DeploymentConfig {
        let mut config = DeploymentConfig::with_owner(Address::from_low_u64(0xa));
        config.strategy.kind = StrategyKind::Members;
        config.strategy.quorum_threshold = 1;
        config.governor.voting_period = 50;
        config
    }

    #[test]
    fn test_run_file_reports_step_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scenario.json");
        fs::write(&path, SCENARIO).unwrap();

        let report = run_file(&config(), &path.to_string_lossy()).unwrap();
        assert_eq!(report.steps.len(), 5);
        assert!(report.steps[1].error.is_none());
        assert!(report.steps[2]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("already voted")));
        assert_eq!(report.final_states[&0], ProposalState::Failed);
    }

    #[test]
    fn test_execute_requires_valid_config() {
        let dir = TempDir::new().unwrap();
        let scenario = dir.path().join("scenario.json");
        fs::write(&scenario, SCENARIO).unwrap();
        let config = dir.path().join("config.toml");
        fs::write(&config, "not toml [").unwrap();

        let result = execute(
            scenario.to_string_lossy().to_string(),
            Some(config.to_string_lossy().to_string()),
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_run_file_rejects_malformed_scenario() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scenario.json");
        fs::write(&path, r#"{"holders": [], "actions": [{"action": "explode"}]}"#).unwrap();
        assert!(run_file(&config(), &path.to_string_lossy()).is_err());
    }
}
