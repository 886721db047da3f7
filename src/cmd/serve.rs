//! Web server command — `andon serve`.

use anyhow::Result;

use andon::app_config::AppConfig;

pub async fn cmd_serve(config: AppConfig) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }
    andon::floor::server::start_server(config.server_config()).await
}
