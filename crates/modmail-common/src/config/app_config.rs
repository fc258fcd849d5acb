//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present). Required Discord identifiers must be present and numeric; any
//! problem is reported as a [`ConfigError`] and is fatal at startup.

use std::env;
use std::time::Duration;

use modmail_core::Snowflake;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub api: ServerConfig,
    pub database: Option<DatabaseConfig>,
    pub discord: DiscordConfig,
    pub modmail: ModmailConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
    /// Worker id for the thread id generator
    pub worker_id: u16,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// HTTP ingress server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token expected on ingress requests; open ingress when `None`
    pub ingress_token: Option<String>,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Discord connection settings
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub staff_guild_id: Snowflake,
    pub log_channel_id: Snowflake,
    pub staff_role_id: Option<Snowflake>,
    pub transport_timeout: Duration,
}

/// Categories thread channels are filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadCategories {
    pub active: Snowflake,
    pub claimed: Snowflake,
    pub archive: Option<Snowflake>,
}

/// Thread behaviour settings
#[derive(Debug, Clone)]
pub struct ModmailConfig {
    pub prefix: String,
    pub reopen_on_message: bool,
    pub categories: ThreadCategories,
}

// Default value functions
fn default_app_name() -> String {
    "modmail".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_prefix() -> String {
    "?".to_string()
}

fn default_transport_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let active = vars.required_id("CATEGORY_ACTIVE_ID")?;
        let worker_id: u16 = vars.parsed("WORKER_ID")?.unwrap_or_default();
        if worker_id >= 1024 {
            return Err(ConfigError::InvalidValue {
                key: "WORKER_ID",
                value: worker_id.to_string(),
            });
        }
        let claimed = vars.optional_id("CATEGORY_CLAIMED_ID")?.unwrap_or(active);

        Ok(Self {
            app: AppSettings {
                name: vars.get("APP_NAME").unwrap_or_else(default_app_name),
                env: match vars.get("APP_ENV") {
                    Some(value) => Environment::parse(&value)
                        .ok_or(ConfigError::InvalidValue { key: "APP_ENV", value })?,
                    None => Environment::default(),
                },
                worker_id,
            },
            api: ServerConfig {
                host: vars.get("API_HOST").unwrap_or_else(default_host),
                port: vars.parsed("API_PORT")?.unwrap_or_else(default_port),
                ingress_token: vars.get("INGRESS_TOKEN"),
            },
            database: match vars.get("DATABASE_URL") {
                Some(url) => Some(DatabaseConfig {
                    url,
                    max_connections: vars
                        .parsed("DATABASE_MAX_CONNECTIONS")?
                        .unwrap_or_else(default_max_connections),
                    min_connections: vars
                        .parsed("DATABASE_MIN_CONNECTIONS")?
                        .unwrap_or_else(default_min_connections),
                }),
                None => None,
            },
            discord: DiscordConfig {
                token: vars.get("DISCORD_TOKEN").ok_or(ConfigError::MissingVar("DISCORD_TOKEN"))?,
                staff_guild_id: vars.required_id("STAFF_GUILD_ID")?,
                log_channel_id: vars.required_id("LOG_CHANNEL_ID")?,
                staff_role_id: vars.optional_id("STAFF_ROLE_ID")?,
                transport_timeout: Duration::from_secs(
                    vars.parsed("TRANSPORT_TIMEOUT_SECS")?
                        .unwrap_or_else(default_transport_timeout_secs),
                ),
            },
            modmail: ModmailConfig {
                prefix: vars.get("PREFIX").unwrap_or_else(default_prefix),
                reopen_on_message: vars.flag("REOPEN_ON_MESSAGE")?,
                categories: ThreadCategories {
                    active,
                    claimed,
                    archive: vars.optional_id("CATEGORY_ARCHIVE_ID")?,
                },
            },
        })
    }
}

/// Typed accessors over a variable lookup
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &'static str) -> Result<Option<T>, ConfigError> {
        match self.get(key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue { key, value }),
            None => Ok(None),
        }
    }

    fn optional_id(&self, key: &'static str) -> Result<Option<Snowflake>, ConfigError> {
        match self.get(key) {
            Some(value) => Snowflake::parse(&value)
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue { key, value }),
            None => Ok(None),
        }
    }

    fn required_id(&self, key: &'static str) -> Result<Snowflake, ConfigError> {
        self.optional_id(key)?.ok_or(ConfigError::MissingVar(key))
    }

    fn flag(&self, key: &'static str) -> Result<bool, ConfigError> {
        match self.get(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue { key, value }),
            },
            None => Ok(false),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DISCORD_TOKEN", "token"),
            ("STAFF_GUILD_ID", "100"),
            ("LOG_CHANNEL_ID", "200"),
            ("CATEGORY_ACTIVE_ID", "300"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| vars.get(key).map(ToString::to_string))
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load(&base_vars()).unwrap();

        assert_eq!(config.discord.staff_guild_id, Snowflake::new(100));
        assert_eq!(config.discord.log_channel_id, Snowflake::new(200));
        assert_eq!(config.discord.transport_timeout, Duration::from_secs(10));
        assert_eq!(config.modmail.prefix, "?");
        assert!(!config.modmail.reopen_on_message);
        assert_eq!(config.modmail.categories.active, Snowflake::new(300));
        assert_eq!(config.modmail.categories.claimed, Snowflake::new(300));
        assert_eq!(config.modmail.categories.archive, None);
        assert!(config.database.is_none());
        assert_eq!(config.api.address(), "0.0.0.0:8080");
        assert!(config.app.env.is_development());
    }

    #[test]
    fn test_missing_required_id() {
        let mut vars = base_vars();
        vars.remove("STAFF_GUILD_ID");

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("STAFF_GUILD_ID")));
    }

    #[test]
    fn test_missing_token() {
        let mut vars = base_vars();
        vars.insert("DISCORD_TOKEN", "  ");

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DISCORD_TOKEN")));
    }

    #[test]
    fn test_non_numeric_id_rejected() {
        let mut vars = base_vars();
        vars.insert("LOG_CHANNEL_ID", "logs");

        let err = load(&vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: "LOG_CHANNEL_ID", .. }
        ));
    }

    #[test]
    fn test_optional_settings() {
        let mut vars = base_vars();
        vars.insert("CATEGORY_CLAIMED_ID", "301");
        vars.insert("CATEGORY_ARCHIVE_ID", "302");
        vars.insert("CATEGORY_CLOSED_ID", "not-read");
        vars.insert("REOPEN_ON_MESSAGE", "true");
        vars.insert("PREFIX", "!");
        vars.insert("DATABASE_URL", "postgres://localhost/modmail");
        vars.insert("APP_ENV", "production");

        let config = load(&vars).unwrap();
        assert_eq!(config.modmail.categories.claimed, Snowflake::new(301));
        assert_eq!(config.modmail.categories.archive, Some(Snowflake::new(302)));
        assert!(config.modmail.reopen_on_message);
        assert_eq!(config.modmail.prefix, "!");
        assert_eq!(config.database.unwrap().max_connections, 10);
        assert!(config.app.env.is_production());
    }

    #[test]
    fn test_worker_id_range() {
        let mut vars = base_vars();
        vars.insert("WORKER_ID", "1024");

        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::InvalidValue { key: "WORKER_ID", .. }
        ));
    }

    #[test]
    fn test_invalid_flag_rejected() {
        let mut vars = base_vars();
        vars.insert("REOPEN_ON_MESSAGE", "maybe");

        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::InvalidValue { key: "REOPEN_ON_MESSAGE", .. }
        ));
    }
}
