//! Startup banner and summary.

use cortex_config::AppConfig;
use tracing::info;

/// Prints the startup banner.
pub fn print_banner() {
    info!(r#"
   ______           __
  / ____/___  _____/ /____  _  __
 / /   / __ \/ ___/ __/ _ \| |/_/
/ /___/ /_/ / /  / /_/  __/>  <
\____/\____/_/   \__/\___/_/|_|
    "#);
}

/// Prints which backends the process runs with.
pub fn print_startup_info(config: &AppConfig) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("Environment: {}", config.app.environment);
    info!("Database:    {}", config.database.backend);
    info!("Event bus:   {}", config.event_bus.backend);
    info!("Heartbeat:   every {}s", config.worker.heartbeat_interval_secs);
    info!("AI provider: {}", config.ai.provider);
    info!("{}", separator);
}
