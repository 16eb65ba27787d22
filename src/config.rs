use crate::service::retry::{Backoff, RetryPolicy};
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// Subdirectory of the project that holds the database file.
pub const DATA_DIR: &str = "data";

pub static CONFIG: LazyLock<Config> =
    LazyLock::new(|| Config::load().expect("FATAL: invalid DOMAIN_VAULT_* configuration"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub project_dir: PathBuf,
    pub db_file: String,
    /// Display string for diagnostics; the physical path is always
    /// `<project_dir>/data/<db_file>`.
    pub storage_location: Option<String>,
    pub loglevel: String,
    pub init_timeout_secs: u64,
    pub init_max_attempts: usize,
    pub init_backoff: BackoffKind,
    pub init_min_delay_ms: u64,
    pub init_max_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            db_file: "domain-vault.sqlite".to_string(),
            storage_location: None,
            loglevel: "info".to_string(),
            init_timeout_secs: 4,
            init_max_attempts: 3,
            init_backoff: BackoffKind::Exponential,
            init_min_delay_ms: 500,
            init_max_delay_ms: 3000,
        }
    }
}

impl Config {
    /// Defaults overlaid with `DOMAIN_VAULT_*` environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("DOMAIN_VAULT_"))
            .extract()
    }

    pub fn database_path(&self) -> PathBuf {
        self.project_dir.join(DATA_DIR).join(&self.db_file)
    }

    pub fn storage_location(&self) -> String {
        self.storage_location
            .clone()
            .unwrap_or_else(|| format!("sqlite:{}", self.database_path().display()))
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let min = Duration::from_millis(self.init_min_delay_ms);
        let backoff = match self.init_backoff {
            BackoffKind::Fixed => Backoff::Fixed(min),
            BackoffKind::Exponential => Backoff::Exponential {
                min,
                max: Duration::from_millis(self.init_max_delay_ms.max(self.init_min_delay_ms)),
            },
        };
        RetryPolicy {
            max_attempts: self.init_max_attempts.max(1),
            backoff,
            jitter: true,
        }
    }
}
