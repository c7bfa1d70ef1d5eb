// config.rs
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub entity_type: String,
    pub entity_id: String,
    pub scope: String,
    pub subscription_type: String,
    pub auth_cmd_id: i64,
    pub subscription_cmd_id: i64,
    pub ping_interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://demo.thingsboard.io/api/ws".to_string(),
            entity_type: "DEVICE".to_string(),
            entity_id: "a6f3a720-ef76-11ef-8e00-e370a74757c3".to_string(),
            scope: "LATEST_TELEMETRY".to_string(),
            subscription_type: "TIMESERIES".to_string(),
            auth_cmd_id: 0,
            subscription_cmd_id: 10,
            ping_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

/// Where the session token comes from. Sources are tried in field order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub token_store: Option<PathBuf>,
    pub token_key: String,
    pub login: Option<LoginConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_store: None,
            token_key: "auth-token".to_string(),
            login: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub save_logs: bool,
    pub log_file_path: String,
    pub rewrite_last_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            save_logs: false,
            log_file_path: "logs/crane-telemetry.log".to_string(),
            rewrite_last_logs: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Reads `name` (any format the `config` crate knows, extension optional)
/// and overlays `CRANE_*` environment variables, e.g. `CRANE_AUTH__TOKEN`.
/// A missing file is fine: every field has a default.
pub fn load_config(name: &str) -> Result<AppConfig, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name(name).required(false))
        .add_source(
            config::Environment::with_prefix("CRANE")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize()
}
