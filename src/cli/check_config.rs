use super::config_path;
use humantime::format_duration;
use std::time::Duration;
use tollgate::config::DeploymentConfig;

/// Load and validate a configuration, then print a summary.
pub fn execute(config: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path(config.as_deref());
    let config = DeploymentConfig::load(&path)?;
    println!("✅ {} is valid", path.display());
    println!();
    print!("{}", summary(&config));
    Ok(())
}

fn period(secs: u64) -> String {
    format_duration(Duration::from_secs(secs)).to_string()
}

/// Human-readable overview of a deployment.
pub fn summary(config: &DeploymentConfig) -> String {
    let g = &config.governor;
    let s = &config.strategy;
    let f = &config.freeze;
    let mut out = String::new();
    out.push_str(&format!("Governor owner:    {}\n", g.owner));
    out.push_str(&format!(
        "Periods:           voting {}, timelock {}, execution {}\n",
        period(g.voting_period),
        period(g.timelock_period),
        period(g.execution_period)
    ));
    out.push_str(&format!(
        "Strategy:          {:?}, quorum {:?}, basis {}\n",
        s.kind,
        config.quorum_rule(),
        s.basis_numerator
    ));
    out.push_str(&format!(
        "Freeze:            owner {}, threshold {}, window {}, freeze {}\n",
        f.owner,
        f.votes_threshold,
        period(f.proposal_period),
        period(f.freeze_period)
    ));
    out.push_str(&format!(
        "Veto threshold:    {}\n",
        config.veto.votes_threshold
    ));
    out
}
