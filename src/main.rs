use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "andon")]
#[command(version, about = "Manufacturing floor monitor with Andon boards")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to andon.toml (defaults to .andon/andon.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable permissive CORS for local front-end development
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and a default config file
    Init {
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Manage login accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum UserCommands {
    /// Create a user
    Add {
        name: String,
        email: String,

        #[arg(long, env = "ANDON_USER_PASSWORD", hide_env_values = true)]
        password: String,

        /// Grant the admin gate
        #[arg(long)]
        admin: bool,

        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    Show,
    Validate,
}

fn init_tracing(verbose: bool) -> Result<()> {
    // JSON logs in production (ANDON_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("ANDON_LOG_JSON").unwrap_or_default() == "1";
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("andon={}", level).parse()?)
        .add_directive(format!("tower_http={}", level).parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = andon::app_config::AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            port,
            host,
            db_path,
            dev,
        } => {
            let overrides = andon::app_config::ServeOverrides {
                host,
                port,
                db_path,
                dev,
            };
            cmd::cmd_serve(config.with_overrides(overrides)).await?;
        }
        Commands::Init { db_path } => cmd::cmd_init(config, db_path)?,
        Commands::User { command } => cmd::cmd_user(config, command)?,
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
    }

    Ok(())
}
