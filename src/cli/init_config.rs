use super::config_path;
use tollgate::config::DeploymentConfig;
use tollgate::types::Address;
use tracing::info;

/// Write the commented default configuration for `owner`.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn execute(
    path: Option<String>,
    owner: String,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let owner: Address = owner.parse()?;
    let path = config_path(path.as_deref());
    if path.exists() && !force {
        return Err(format!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        )
        .into());
    }

    DeploymentConfig::create_default(&path, owner)?;
    info!(path = %path.display(), "wrote default config");
    println!("✅ Wrote default config to {}", path.display());
    Ok(())
}
