//! Warden Configuration - every interval, endpoint, path and command as TOML
//!
//! Each struct implements `Default` with values from [`super::defaults`],
//! so a missing file or a missing section behaves exactly like the built-in
//! constants.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::process::{CommandCatalog, Operation};

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "DEPWARDEN_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "depwarden.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one warden deployment.
///
/// Load with `WardenConfig::load()` which searches:
/// 1. `$DEPWARDEN_CONFIG` env var
/// 2. `./depwarden.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Tick intervals, escalation threshold and log location
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Probe endpoints, mirrors and resolver repair settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Container runtime daemon settings
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Dependent service and its database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Image pull retry policy
    #[serde(default)]
    pub pull: PullConfig,
}

impl WardenConfig {
    /// Load configuration using the standard search order:
    /// 1. `$DEPWARDEN_CONFIG` environment variable
    /// 2. `./depwarden.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings and never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            source: e,
        })?;
        config.validate()?;
        for w in super::validation::validate_operational_ranges(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate intervals, thresholds and defaults for internal consistency.
    ///
    /// Rules:
    /// - Threshold, retry bounds and intervals must be non-zero
    /// - The network tick must outlast the worst-case probe run
    /// - The default connection string must itself be well-formed
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.monitor.failure_threshold == 0 {
            errors.push("monitor.failure_threshold must be at least 1".to_string());
        }
        if self.monitor.interval_secs == 0 {
            errors.push("monitor.interval_secs must be > 0".to_string());
        }
        if self.database.validation_interval_secs == 0 {
            errors.push("database.validation_interval_secs must be > 0".to_string());
        }
        if self.network.probe_timeout_secs == 0 {
            errors.push("network.probe_timeout_secs must be > 0".to_string());
        }

        let worst_case = self.network.worst_case_probe_secs();
        if self.monitor.interval_secs <= worst_case {
            errors.push(format!(
                "monitor.interval_secs ({}) must exceed the worst-case probe duration ({}s)",
                self.monitor.interval_secs, worst_case
            ));
        }

        if self.database.readiness_max_retries == 0 {
            errors.push("database.readiness_max_retries must be at least 1".to_string());
        }
        if self.pull.max_retries == 0 {
            errors.push("pull.max_retries must be at least 1".to_string());
        }
        if self.database.connection_key.trim().is_empty() {
            errors.push("database.connection_key must not be empty".to_string());
        }
        if let Err(e) =
            crate::validator::ConnectionUrl::parse(&self.database.default_connection_url)
        {
            errors.push(format!("database.default_connection_url is invalid: {e}"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Errors from loading or validating the warden configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

// ============================================================================
// Monitor
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Network health tick interval (seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Consecutive failing ticks before repair
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Directory for the per-monitor log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_interval_secs() -> u64 {
    defaults::MONITOR_INTERVAL_SECS
}
fn default_failure_threshold() -> u32 {
    defaults::FAILURE_THRESHOLD
}
fn default_log_dir() -> PathBuf {
    PathBuf::from(defaults::LOG_DIR)
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            failure_threshold: default_failure_threshold(),
            log_dir: default_log_dir(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ============================================================================
// Network
// ============================================================================

/// An alternate, prioritised source for fetching container images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMirror {
    pub url: String,
    pub name: String,
    /// Lower value is preferred
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connectivity_endpoints")]
    pub connectivity_endpoints: Vec<String>,

    #[serde(default = "default_dns_hosts")]
    pub dns_hosts: Vec<String>,

    #[serde(default = "default_proxy_env_vars")]
    pub proxy_env_vars: Vec<String>,

    #[serde(default = "default_registry_endpoints")]
    pub registry_endpoints: Vec<String>,

    /// Per-probe command timeout (seconds)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_fallback_nameservers")]
    pub fallback_nameservers: Vec<String>,

    #[serde(default = "default_resolver_config")]
    pub resolver_config: PathBuf,

    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<RegistryMirror>,
}

fn default_connectivity_endpoints() -> Vec<String> {
    strings(defaults::CONNECTIVITY_ENDPOINTS)
}
fn default_dns_hosts() -> Vec<String> {
    strings(defaults::DNS_HOSTS)
}
fn default_proxy_env_vars() -> Vec<String> {
    strings(defaults::PROXY_ENV_VARS)
}
fn default_registry_endpoints() -> Vec<String> {
    strings(defaults::REGISTRY_ENDPOINTS)
}
fn default_probe_timeout_secs() -> u64 {
    defaults::PROBE_TIMEOUT_SECS
}
fn default_fallback_nameservers() -> Vec<String> {
    strings(defaults::FALLBACK_NAMESERVERS)
}
fn default_resolver_config() -> PathBuf {
    PathBuf::from(defaults::RESOLVER_CONFIG_PATH)
}
fn default_mirrors() -> Vec<RegistryMirror> {
    vec![
        RegistryMirror {
            url: "https://mirror.gcr.io".to_string(),
            name: "Google Mirror".to_string(),
            priority: 1,
        },
        RegistryMirror {
            url: "https://docker.mirrors.ustc.edu.cn".to_string(),
            name: "USTC Mirror".to_string(),
            priority: 2,
        },
        RegistryMirror {
            url: "https://hub-mirror.c.163.com".to_string(),
            name: "NetEase Mirror".to_string(),
            priority: 3,
        },
    ]
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connectivity_endpoints: default_connectivity_endpoints(),
            dns_hosts: default_dns_hosts(),
            proxy_env_vars: default_proxy_env_vars(),
            registry_endpoints: default_registry_endpoints(),
            probe_timeout_secs: default_probe_timeout_secs(),
            fallback_nameservers: default_fallback_nameservers(),
            resolver_config: default_resolver_config(),
            mirrors: default_mirrors(),
        }
    }
}

impl NetworkConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Upper bound on one full probe run (seconds).
    ///
    /// Every command in every probe's fallback chain may run to its timeout
    /// when nothing answers. Mirrors are probed concurrently and cost one
    /// chain between them.
    pub fn worst_case_probe_secs(&self) -> u64 {
        let http = CommandCatalog::longest_chain(&Operation::HttpProbe {
            url: "",
            timeout_secs: self.probe_timeout_secs,
        });
        let resolve = CommandCatalog::longest_chain(&Operation::ResolveHost { host: "" });
        let sequential = self.connectivity_endpoints.len() * http
            + self.dns_hosts.len() * resolve
            + CommandCatalog::longest_chain(&Operation::RuntimeProxy)
            + self.registry_endpoints.len() * http
            + CommandCatalog::longest_chain(&Operation::RuntimeInfo);
        let mirrors = if self.mirrors.is_empty() { 0 } else { http };
        (sequential + mirrors) as u64 * self.probe_timeout_secs
    }
}

// ============================================================================
// Runtime Daemon
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Runtime CLI binary
    #[serde(default = "default_runtime_binary")]
    pub binary: String,

    #[serde(default = "default_daemon_config_path")]
    pub daemon_config_path: String,

    /// Used when `daemon_config_path` is not writable; `~/` is expanded
    #[serde(default = "default_daemon_config_user_path")]
    pub daemon_config_user_path: String,

    /// Wait after a daemon restart before verifying it (seconds)
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,

    /// Timeout for each remediation command (seconds)
    #[serde(default = "default_repair_timeout_secs")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: u32,

    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: u32,

    #[serde(default = "default_max_download_attempts")]
    pub max_download_attempts: u32,
}

fn default_runtime_binary() -> String {
    defaults::RUNTIME_BINARY.to_string()
}
fn default_daemon_config_path() -> String {
    defaults::DAEMON_CONFIG_SYSTEM_PATH.to_string()
}
fn default_daemon_config_user_path() -> String {
    defaults::DAEMON_CONFIG_USER_PATH.to_string()
}
fn default_settle_secs() -> u64 {
    defaults::DAEMON_SETTLE_SECS
}
fn default_repair_timeout_secs() -> u64 {
    defaults::REPAIR_COMMAND_TIMEOUT_SECS
}
fn default_max_concurrent_downloads() -> u32 {
    defaults::MAX_CONCURRENT_DOWNLOADS
}
fn default_max_concurrent_uploads() -> u32 {
    defaults::MAX_CONCURRENT_UPLOADS
}
fn default_max_download_attempts() -> u32 {
    defaults::MAX_DOWNLOAD_ATTEMPTS
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: default_runtime_binary(),
            daemon_config_path: default_daemon_config_path(),
            daemon_config_user_path: default_daemon_config_user_path(),
            settle_secs: default_settle_secs(),
            command_timeout_secs: default_repair_timeout_secs(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
            max_download_attempts: default_max_download_attempts(),
        }
    }
}

impl RuntimeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

// ============================================================================
// Database Dependency
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Dependent service `KEY=VALUE` file
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    #[serde(default = "default_connection_key")]
    pub connection_key: String,

    #[serde(default = "default_connection_url")]
    pub default_connection_url: String,

    /// Keys that must be present besides the connection key
    #[serde(default = "default_required_keys")]
    pub required_keys: Vec<String>,

    #[serde(default = "default_plugin_key")]
    pub plugin_key: String,

    /// Plugin names removed by config repair
    #[serde(default)]
    pub plugin_denylist: Vec<String>,

    #[serde(default = "default_database_container")]
    pub database_container: String,

    #[serde(default = "default_database_container")]
    pub database_service: String,

    #[serde(default = "default_app_container")]
    pub app_container: String,

    #[serde(default = "default_app_container")]
    pub app_service: String,

    /// Compose file passed with `-f`; the runtime's own lookup applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_file: Option<PathBuf>,

    #[serde(default = "default_readiness_max_retries")]
    pub readiness_max_retries: u32,

    #[serde(default = "default_readiness_poll_secs")]
    pub readiness_poll_secs: u64,

    #[serde(default = "default_validation_interval_secs")]
    pub validation_interval_secs: u64,

    #[serde(default = "default_management_timeout_secs")]
    pub management_timeout_secs: u64,

    /// Connection check run inside the app container.
    ///
    /// `{host}`, `{port}`, `{user}` and `{database}` are substituted.
    #[serde(default = "default_connection_check")]
    pub connection_check: Vec<String>,

    /// Readiness check run inside the database container
    #[serde(default = "default_database_ready_check")]
    pub database_ready_check: Vec<String>,

    /// Lists migrations; a line containing `pending_marker` is unapplied
    #[serde(default = "default_schema_check")]
    pub schema_check: Vec<String>,

    #[serde(default = "default_pending_marker")]
    pub pending_marker: String,

    #[serde(default = "default_migrate_command")]
    pub migrate_command: Vec<String>,

    #[serde(default = "default_self_check_command")]
    pub self_check_command: Vec<String>,
}

fn default_env_file() -> PathBuf {
    PathBuf::from(defaults::ENV_FILE_PATH)
}
fn default_connection_key() -> String {
    defaults::CONNECTION_KEY.to_string()
}
fn default_connection_url() -> String {
    defaults::DEFAULT_CONNECTION_URL.to_string()
}
fn default_required_keys() -> Vec<String> {
    vec!["SECRET_KEY".to_string()]
}
fn default_plugin_key() -> String {
    defaults::PLUGIN_KEY.to_string()
}
fn default_database_container() -> String {
    defaults::DATABASE_CONTAINER.to_string()
}
fn default_app_container() -> String {
    defaults::APP_CONTAINER.to_string()
}
fn default_readiness_max_retries() -> u32 {
    defaults::READINESS_MAX_RETRIES
}
fn default_readiness_poll_secs() -> u64 {
    defaults::READINESS_POLL_SECS
}
fn default_validation_interval_secs() -> u64 {
    defaults::VALIDATION_INTERVAL_SECS
}
fn default_management_timeout_secs() -> u64 {
    defaults::MANAGEMENT_TIMEOUT_SECS
}
fn default_connection_check() -> Vec<String> {
    strings(&["pg_isready", "-h", "{host}", "-p", "{port}", "-U", "{user}", "-d", "{database}"])
}
fn default_database_ready_check() -> Vec<String> {
    strings(&["pg_isready"])
}
fn default_schema_check() -> Vec<String> {
    strings(&["python", "manage.py", "showmigrations", "--plan"])
}
fn default_pending_marker() -> String {
    defaults::PENDING_MIGRATION_MARKER.to_string()
}
fn default_migrate_command() -> Vec<String> {
    strings(&["python", "manage.py", "migrate", "--noinput"])
}
fn default_self_check_command() -> Vec<String> {
    strings(&["python", "manage.py", "check"])
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
            connection_key: default_connection_key(),
            default_connection_url: default_connection_url(),
            required_keys: default_required_keys(),
            plugin_key: default_plugin_key(),
            plugin_denylist: Vec::new(),
            database_container: default_database_container(),
            database_service: default_database_container(),
            app_container: default_app_container(),
            app_service: default_app_container(),
            compose_file: None,
            readiness_max_retries: default_readiness_max_retries(),
            readiness_poll_secs: default_readiness_poll_secs(),
            validation_interval_secs: default_validation_interval_secs(),
            management_timeout_secs: default_management_timeout_secs(),
            connection_check: default_connection_check(),
            database_ready_check: default_database_ready_check(),
            schema_check: default_schema_check(),
            pending_marker: default_pending_marker(),
            migrate_command: default_migrate_command(),
            self_check_command: default_self_check_command(),
        }
    }
}

impl DatabaseConfig {
    pub fn validation_interval(&self) -> Duration {
        Duration::from_secs(self.validation_interval_secs)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_secs(self.readiness_poll_secs)
    }

    pub fn management_timeout(&self) -> Duration {
        Duration::from_secs(self.management_timeout_secs)
    }
}

// ============================================================================
// Image Pulls
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    /// Backoff before attempt k (k >= 2) is `base * 2^(k-2)` seconds
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    #[serde(default = "default_pull_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_pull_platform")]
    pub platform: String,

    #[serde(default = "default_pull_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backoff_base_secs() -> u64 {
    defaults::PULL_BACKOFF_BASE_SECS
}
fn default_pull_max_retries() -> u32 {
    defaults::PULL_MAX_RETRIES
}
fn default_pull_platform() -> String {
    defaults::PULL_PLATFORM.to_string()
}
fn default_pull_timeout_secs() -> u64 {
    defaults::PULL_TIMEOUT_SECS
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            backoff_base_secs: default_backoff_base_secs(),
            max_retries: default_pull_max_retries(),
            platform: default_pull_platform(),
            timeout_secs: default_pull_timeout_secs(),
        }
    }
}

impl PullConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = WardenConfig::default();
        assert!(config.validate().is_ok(), "{:?}", config.validate());
    }

    #[test]
    fn test_default_interval_exceeds_worst_case_probe() {
        let config = WardenConfig::default();
        assert!(config.monitor.interval_secs > config.network.worst_case_probe_secs());
    }

    #[test]
    fn test_worst_case_counts_every_resolver_fallback() {
        let mut network = NetworkConfig::default();
        network.mirrors.clear();
        // 2 connectivity + 2 hosts x (getent, nslookup) + proxy + 2 registry + runtime info
        assert_eq!(network.worst_case_probe_secs(), 10 * network.probe_timeout_secs);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = WardenConfig::default();
        config.monitor.failure_threshold = 0;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("failure_threshold")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_short_interval_rejected() {
        let mut config = WardenConfig::default();
        config.monitor.interval_secs = 10;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worst-case probe duration"));
    }

    #[test]
    fn test_bad_default_connection_url_rejected() {
        let mut config = WardenConfig::default();
        config.database.default_connection_url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("default_connection_url"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = WardenConfig::from_toml_str(
            r#"
[monitor]
failure_threshold = 5

[[network.mirrors]]
url = "https://mirror.example.com"
name = "Example"
priority = 1
"#,
        )
        .unwrap();
        assert_eq!(config.monitor.failure_threshold, 5);
        assert_eq!(config.monitor.interval_secs, defaults::MONITOR_INTERVAL_SECS);
        assert_eq!(config.network.mirrors.len(), 1);
        assert_eq!(config.database.connection_key, "DATABASE_URL");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = WardenConfig::default();
        let text = config.to_toml().unwrap();
        let back = WardenConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.network.mirrors, config.network.mirrors);
        assert_eq!(back.pull.max_retries, config.pull.max_retries);
    }

    #[test]
    fn test_load_from_file_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depwarden.toml");
        std::fs::write(&path, "[monitor\ninterval_secs = ").unwrap();
        let err = WardenConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("depwarden.toml"));
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/etc/docker/daemon.json"), PathBuf::from("/etc/docker/daemon.json"));
    }
}
