use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROMOTER_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_NOTIFIER_POLL_SECS: u64 = 60;
pub const DEFAULT_RETRY_COOLDOWN_SECS: u64 = 5 * 60;
pub const DEFAULT_LOCK_TTL_SECS: u64 = 2 * 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STORE_WATCH_MS: u64 = 1_000;

/// Top-level config (bosswatch.toml + BOSSWATCH_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BosswatchConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub promoter: PromoterConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// How often the store checks for writes made by other processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_watch_ms")]
    pub watch_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            watch_interval_ms: DEFAULT_STORE_WATCH_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoterConfig {
    #[serde(default = "default_promoter_interval")]
    pub interval_secs: u64,
}

impl Default for PromoterConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_PROMOTER_INTERVAL_SECS,
        }
    }
}

/// Daily webhook notifier. The webhook URL, trigger time and boss selection
/// live in the shared settings document, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Operator-present gate. When false this process never sends.
    /// Override with env var: BOSSWATCH_NOTIFIER_ENABLED=false
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_retry_cooldown")]
    pub retry_cooldown_secs: u64,
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: DEFAULT_NOTIFIER_POLL_SECS,
            retry_cooldown_secs: DEFAULT_RETRY_COOLDOWN_SECS,
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_store_watch_ms() -> u64 {
    DEFAULT_STORE_WATCH_MS
}
fn default_promoter_interval() -> u64 {
    DEFAULT_PROMOTER_INTERVAL_SECS
}
fn default_poll_secs() -> u64 {
    DEFAULT_NOTIFIER_POLL_SECS
}
fn default_retry_cooldown() -> u64 {
    DEFAULT_RETRY_COOLDOWN_SECS
}
fn default_lock_ttl() -> u64 {
    DEFAULT_LOCK_TTL_SECS
}
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.bosswatch/bosswatch.db", home)
}

impl BosswatchConfig {
    /// Load config from a TOML file with BOSSWATCH_* env var overrides.
    ///
    /// Uses the explicit path when given, otherwise ~/.bosswatch/bosswatch.toml.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: BosswatchConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("BOSSWATCH_").map(|key| env_key_path(key.as_str()).into()))
            .extract()
            .map_err(|e| crate::error::BosswatchError::Config(e.to_string()))?;

        Ok(config)
    }
}

/// Map an unprefixed env key to its config path. Only the first `_`
/// separates the section, so `NOTIFIER_POLL_INTERVAL_SECS` lands on
/// `notifier.poll_interval_secs`.
fn env_key_path(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    match key.split_once('_') {
        Some((section, field)) => format!("{section}.{field}"),
        None => key,
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.bosswatch/bosswatch.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_polling_constants() {
        let config = BosswatchConfig::default();
        assert_eq!(config.promoter.interval_secs, 5);
        assert_eq!(config.notifier.poll_interval_secs, 60);
        assert_eq!(config.notifier.retry_cooldown_secs, 300);
        assert_eq!(config.notifier.lock_ttl_secs, 120);
        assert!(config.notifier.enabled);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = BosswatchConfig::load(Some("/nonexistent/bosswatch.toml"))
            .expect("missing file should still extract");
        assert_eq!(config.store.watch_interval_ms, DEFAULT_STORE_WATCH_MS);
    }

    #[test]
    fn env_keys_split_on_section_only() {
        assert_eq!(env_key_path("NOTIFIER_POLL_INTERVAL_SECS"), "notifier.poll_interval_secs");
        assert_eq!(env_key_path("STORE_WATCH_INTERVAL_MS"), "store.watch_interval_ms");
        assert_eq!(env_key_path("DATABASE_PATH"), "database.path");
        assert_eq!(env_key_path("NOTIFIER"), "notifier");
    }

    #[test]
    fn multi_word_env_overrides_apply() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BOSSWATCH_NOTIFIER_POLL_INTERVAL_SECS", "15");
            jail.set_env("BOSSWATCH_NOTIFIER_LOCK_TTL_SECS", "90");
            jail.set_env("BOSSWATCH_NOTIFIER_ENABLED", "false");
            jail.set_env("BOSSWATCH_STORE_WATCH_INTERVAL_MS", "250");
            jail.set_env("BOSSWATCH_DATABASE_PATH", "/tmp/bw.db");

            let config = BosswatchConfig::load(Some("/nonexistent/bosswatch.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.notifier.poll_interval_secs, 15);
            assert_eq!(config.notifier.lock_ttl_secs, 90);
            assert!(!config.notifier.enabled);
            assert_eq!(config.store.watch_interval_ms, 250);
            assert_eq!(config.database.path, "/tmp/bw.db");
            Ok(())
        });
    }
}
