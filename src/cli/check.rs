//! Handler for `check config`.

use std::path::Path;

use crate::cli::output;
use crate::config::{Config, ACCESS_TOKEN_VAR};
use crate::error::Result;

/// Validate a configuration file without connecting.
///
/// # Errors
///
/// Returns the load or validation error.
pub fn execute_config(path: &Path) -> Result<()> {
    let config = Config::load(path)?;

    output::section("Configuration Check");
    output::field("Config", path.display());
    output::success("Configuration file is valid");

    output::section("Summary");
    output::field("WebSocket", &config.network.ws_url);
    output::field("API", &config.network.api_url);
    output::field(
        "Reconnect",
        format!("every {}ms", config.reconnection.interval_ms),
    );
    output::field("Evict on end", config.dedup.evict_on_terminal);
    output::field(
        "Confirm window",
        format!("{}s", config.confirmation.window_secs),
    );

    if std::env::var(ACCESS_TOKEN_VAR).is_ok_and(|t| !t.is_empty()) {
        output::success("Access token detected");
    } else {
        output::warning(&format!("{ACCESS_TOKEN_VAR} is not set; run will log out immediately"));
    }
    Ok(())
}
