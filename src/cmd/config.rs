//! Configuration view and validation commands — `andon config`.

use anyhow::Result;

use andon::app_config::AppConfig;

use super::super::ConfigCommands;

pub fn cmd_config(config: &AppConfig, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Andon Configuration");
            println!("===================");
            println!();
            if config.config_path.exists() {
                println!("Config file: {}", config.config_path.display());
            } else {
                println!(
                    "No andon.toml found at {} (using defaults)",
                    config.config_path.display()
                );
            }
            println!();
            println!("Effective values (with env overrides):");
            let toml = &config.toml;
            println!("[server]");
            println!("  host = \"{}\"", toml.server.host);
            println!("  port = {}", toml.server.port);
            println!("  db_path = \"{}\"", toml.server.db_path.display());
            println!("  dev_mode = {}", toml.server.dev_mode);
            println!("[auth]");
            println!("  session_ttl_hours = {}", toml.auth.session_ttl_hours);
            println!("  cookie_name = \"{}\"", toml.auth.cookie_name);
            println!("[andon]");
            println!("  default_row_count = {}", toml.andon.default_row_count);
            println!("  default_column_count = {}", toml.andon.default_column_count);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
    }
    Ok(())
}
