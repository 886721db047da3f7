//! Account management — `andon user`.

use anyhow::{Context, Result, bail};

use andon::app_config::AppConfig;
use andon::floor::auth::hash_password;
use andon::floor::server::open_database;

use super::super::UserCommands;

pub fn cmd_user(config: AppConfig, command: UserCommands) -> Result<()> {
    match command {
        UserCommands::Add {
            name,
            email,
            password,
            admin,
            db_path,
        } => {
            if name.trim().is_empty() || email.trim().is_empty() {
                bail!("Name and email must not be empty");
            }
            if password.len() < 8 {
                bail!("Password must be at least 8 characters");
            }

            let db_path = db_path.unwrap_or_else(|| config.db_path().to_path_buf());
            let db = open_database(&db_path, config.andon_defaults())?;
            if db.find_user_credentials(&email)?.is_some() {
                bail!("A user with email {} already exists", email);
            }

            let hash = hash_password(&password)?;
            let user = db
                .create_user(name.trim(), email.trim(), &hash, admin)
                .context("Failed to create user")?;
            tracing::info!(user_id = user.user_id, admin, "User created");
            println!(
                "Created {} user {} <{}> (id {})",
                if admin { "admin" } else { "regular" },
                user.name,
                user.email,
                user.user_id
            );
        }
    }
    Ok(())
}
