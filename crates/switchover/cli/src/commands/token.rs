//! API token refresh

use crate::client::LoginClient;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::print_success;
use std::path::Path;
use tracing::info;

/// Exchange the configured token for a fresh one and persist it
///
/// The in-memory config is updated too, so a run in the same invocation
/// uses the new token.
pub async fn refresh(config: &mut CliConfig, path: &Path) -> CliResult<()> {
    let client = LoginClient::new(&config.api_endpoint, config.credential(), config.timeout())?;
    let token = client.refresh_token().await?;

    config.auth_token = token;
    config.save(path)?;

    info!(path = %path.display(), "Stored refreshed API token");
    print_success(&format!("Refreshed API token in {}", path.display()));
    Ok(())
}
