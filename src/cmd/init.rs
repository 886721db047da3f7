//! Project setup command — `andon init`.

use anyhow::{Context, Result};
use std::path::PathBuf;

use andon::app_config::AppConfig;
use andon::floor::server::open_database;

pub fn cmd_init(config: AppConfig, db_path: Option<PathBuf>) -> Result<()> {
    let db_path = db_path.unwrap_or_else(|| config.db_path().to_path_buf());
    open_database(&db_path, config.andon_defaults())?;
    println!("Database initialized at {}", db_path.display());

    if config.config_path.exists() {
        println!("Using existing config at {}", config.config_path.display());
        return Ok(());
    }
    if let Some(parent) = config.config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let mut toml = config.toml.clone();
    toml.server.db_path = db_path;
    toml.save(&config.config_path)?;
    println!("Created {}", config.config_path.display());
    println!();
    println!("Next: create an admin with 'andon user add <name> <email> --password <pw> --admin'");
    Ok(())
}
