//! Layered configuration for the Andon server.
//!
//! Settings are read from `.andon/andon.toml`, then overridden by
//! environment variables, then by CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! db_path = ".andon/andon.db"
//! dev_mode = false
//!
//! [auth]
//! session_ttl_hours = 12
//! cookie_name = "andon_session"
//!
//! [andon]
//! default_row_count = 2
//! default_column_count = 3
//! ```
//!
//! Environment overrides: `ANDON_HOST`, `ANDON_PORT`, `ANDON_DB_PATH`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::floor::auth::AuthSettings;
use crate::floor::db::AndonDefaults;
use crate::floor::server::ServerConfig;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".andon/andon.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".andon/andon.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u32,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_session_ttl_hours() -> u32 {
    12
}

fn default_cookie_name() -> String {
    "andon_session".to_string()
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// Seeds for the board config row, used only when it is first created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndonSection {
    #[serde(default = "default_row_count")]
    pub default_row_count: i64,
    #[serde(default = "default_column_count")]
    pub default_column_count: i64,
}

fn default_row_count() -> i64 {
    2
}

fn default_column_count() -> i64 {
    3
}

impl Default for AndonSection {
    fn default() -> Self {
        Self {
            default_row_count: default_row_count(),
            default_column_count: default_column_count(),
        }
    }
}

/// The complete andon.toml structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub andon: AndonSection,
}

impl AppToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse andon.toml")
    }

    /// Load `path`, or defaults when the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize andon.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `ANDON_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ANDON_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("ANDON_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid ANDON_PORT"),
            }
        }
        if let Some(db_path) = lookup("ANDON_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0: the OS will pick a random port".to_string());
        }
        if self.server.host.trim().is_empty() {
            warnings.push("server.host is empty".to_string());
        }
        if self.auth.session_ttl_hours == 0 {
            warnings.push("auth.session_ttl_hours is 0: sessions expire immediately".to_string());
        }
        if self.auth.cookie_name.is_empty()
            || !self
                .auth
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            warnings.push(format!(
                "Invalid auth.cookie_name '{}': use letters, digits, '_' or '-'",
                self.auth.cookie_name
            ));
        }
        if !(1..=10).contains(&self.andon.default_row_count) {
            warnings.push(format!(
                "andon.default_row_count {} is outside 1..=10",
                self.andon.default_row_count
            ));
        }
        if !(1..=10).contains(&self.andon.default_column_count) {
            warnings.push(format!(
                "andon.default_column_count {} is outside 1..=10",
                self.andon.default_column_count
            ));
        }

        warnings
    }
}

/// Flags of `andon serve` that override the file and environment.
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub dev: bool,
}

/// Effective configuration: andon.toml, then environment, then CLI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub toml: AppToml,
}

impl AppConfig {
    /// Load from `config_path` (or the default location) and apply
    /// environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut toml = AppToml::load_or_default(&config_path)?;
        toml.apply_env(|key| std::env::var(key).ok());
        Ok(Self { config_path, toml })
    }

    pub fn with_overrides(mut self, overrides: ServeOverrides) -> Self {
        if let Some(host) = overrides.host {
            self.toml.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.toml.server.port = port;
        }
        if let Some(db_path) = overrides.db_path {
            self.toml.server.db_path = db_path;
        }
        if overrides.dev {
            self.toml.server.dev_mode = true;
        }
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.toml.server.db_path
    }

    pub fn andon_defaults(&self) -> AndonDefaults {
        AndonDefaults {
            row_count: self.toml.andon.default_row_count,
            column_count: self.toml.andon.default_column_count,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.toml.server.host.clone(),
            port: self.toml.server.port,
            db_path: self.toml.server.db_path.clone(),
            dev_mode: self.toml.server.dev_mode,
            auth: AuthSettings {
                cookie_name: self.toml.auth.cookie_name.clone(),
                session_ttl: chrono::Duration::hours(i64::from(self.toml.auth.session_ttl_hours)),
            },
            andon: self.andon_defaults(),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let toml = AppToml::default();
        assert_eq!(toml.server.host, "127.0.0.1");
        assert_eq!(toml.server.port, 8080);
        assert_eq!(toml.server.db_path, PathBuf::from(".andon/andon.db"));
        assert!(!toml.server.dev_mode);
        assert_eq!(toml.auth.session_ttl_hours, 12);
        assert_eq!(toml.auth.cookie_name, "andon_session");
        assert_eq!(toml.andon.default_row_count, 2);
        assert_eq!(toml.andon.default_column_count, 3);
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let content = r#"
[server]
port = 9000

[andon]
default_column_count = 5
"#;
        let toml = AppToml::parse(content).unwrap();
        assert_eq!(toml.server.port, 9000);
        assert_eq!(toml.server.host, "127.0.0.1");
        assert_eq!(toml.andon.default_column_count, 5);
        assert_eq!(toml.andon.default_row_count, 2);
        assert_eq!(toml.auth.cookie_name, "andon_session");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = AppToml::parse("[server\nport = ").unwrap_err();
        assert!(err.to_string().contains("andon.toml"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("andon.toml");
        let mut toml = AppToml::default();
        toml.server.port = 9100;
        toml.auth.session_ttl_hours = 4;
        toml.save(&path).unwrap();

        let loaded = AppToml::load(&path).unwrap();
        assert_eq!(loaded.server.port, 9100);
        assert_eq!(loaded.auth.session_ttl_hours, 4);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let toml = AppToml::load_or_default(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(toml.server.port, 8080);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("ANDON_HOST", "0.0.0.0"),
            ("ANDON_PORT", "9200"),
            ("ANDON_DB_PATH", "/var/lib/andon.db"),
        ]
        .into_iter()
        .collect();
        let mut toml = AppToml::parse("[server]\nport = 9000\n").unwrap();
        toml.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(toml.server.host, "0.0.0.0");
        assert_eq!(toml.server.port, 9200);
        assert_eq!(toml.server.db_path, PathBuf::from("/var/lib/andon.db"));
    }

    #[test]
    fn test_invalid_env_port_is_ignored() {
        let mut toml = AppToml::default();
        toml.apply_env(|key| (key == "ANDON_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(toml.server.port, 8080);
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = AppConfig {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            toml: AppToml::default(),
        }
        .with_overrides(ServeOverrides {
            host: None,
            port: Some(3000),
            db_path: Some(PathBuf::from("floor.db")),
            dev: true,
        });

        let server = config.server_config();
        assert_eq!(server.port, 3000);
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.db_path, PathBuf::from("floor.db"));
        assert!(server.dev_mode);
        assert_eq!(server.auth.session_ttl, chrono::Duration::hours(12));
        assert_eq!(server.andon.column_count, 3);
    }

    #[test]
    fn test_validate_reports_problems() {
        let content = r#"
[server]
port = 0

[auth]
session_ttl_hours = 0
cookie_name = "bad cookie"

[andon]
default_row_count = 0
default_column_count = 11
"#;
        let warnings = AppToml::parse(content).unwrap().validate();
        assert_eq!(warnings.len(), 5);
        assert!(warnings.iter().any(|w| w.contains("server.port")));
        assert!(warnings.iter().any(|w| w.contains("cookie_name")));
        assert!(warnings.iter().any(|w| w.contains("default_column_count")));
    }

    #[test]
    fn test_app_config_load_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("andon.toml");
        std::fs::write(&path, "[auth]\ncookie_name = \"floor\"\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.config_path, path);
        assert_eq!(config.server_config().auth.cookie_name, "floor");
    }
}
