//! # Inventory Configuration
//!
//! Configuration for the backend connection, realtime feed and stock rules.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     VIVAAS_BACKEND_URL=https://xyz.supabase.co                         │
//! │     VIVAAS_ANON_KEY=eyJhbGciOi...                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/vivaas-inventory/inventory.toml (Linux)                  │
//! │     ~/Library/Application Support/com.vivaas.vivaas-inventory/...      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [backend]
//! url = "https://xyz.supabase.co"
//! anon_key = "eyJhbGciOi..."
//! table = "products"
//!
//! [realtime]
//! enabled = true
//! heartbeat_interval_secs = 30
//!
//! [stock]
//! default_low_stock_threshold = 5
//! max_conflict_retries = 3
//!
//! [dev]
//! auto_login = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Backend Settings
// =============================================================================

/// Connection to the hosted backend (table, auth and realtime share a host).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Public (anon) API key sent as `apikey` on every request.
    #[serde(default)]
    pub anon_key: String,

    /// Products table name.
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_table() -> String {
    "products".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            url: default_backend_url(),
            anon_key: String::new(),
            table: default_table(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Realtime Settings
// =============================================================================

/// Realtime feed behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Channel heartbeat interval (seconds).
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Connection timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Initial backoff duration (milliseconds) for reconnection.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds) for reconnection.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Maximum reconnection attempts before giving up.
    /// Set to 0 for infinite retries.
    #[serde(default)]
    pub max_retries: u32,
}

fn default_true() -> bool {
    true
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    60
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        RealtimeSettings {
            enabled: true,
            heartbeat_interval_secs: default_heartbeat_interval(),
            connect_timeout_secs: default_connect_timeout(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            max_retries: 0,
        }
    }
}

// =============================================================================
// Stock Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSettings {
    /// Threshold stored for new products that do not specify one.
    #[serde(default = "default_low_stock_threshold")]
    pub default_low_stock_threshold: u32,

    /// How many times a decrement re-reads after losing a compare-and-set.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_low_stock_threshold() -> u32 {
    vivaas_core::DEFAULT_LOW_STOCK_THRESHOLD
}

fn default_max_conflict_retries() -> u32 {
    3
}

impl Default for StockSettings {
    fn default() -> Self {
        StockSettings {
            default_low_stock_threshold: default_low_stock_threshold(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

// =============================================================================
// Development Settings
// =============================================================================

/// Development-only sign-in shortcut.
///
/// Has no effect unless the crate is built with the `dev-auto-login`
/// feature in a debug build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevSettings {
    #[serde(default)]
    pub auto_login: bool,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl DevSettings {
    /// Returns the credentials when auto-login is switched on.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if !self.auto_login {
            return None;
        }
        match (self.email.as_deref(), self.password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete inventory sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub realtime: RealtimeSettings,

    #[serde(default)]
    pub stock: StockSettings,

    #[serde(default)]
    pub dev: DevSettings,
}

impl InventoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (inventory.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading inventory config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load inventory config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Inventory config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let url = url::Url::parse(&self.backend.url)
            .map_err(|e| SyncError::InvalidConfig(format!("Invalid backend URL: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidConfig(format!(
                "Backend URL must start with http:// or https://, got: {}",
                self.backend.url
            )));
        }

        if self.backend.table.trim().is_empty() {
            return Err(SyncError::InvalidConfig("table must not be empty".into()));
        }

        if self.dev.auto_login && self.dev.credentials().is_none() {
            return Err(SyncError::InvalidConfig(
                "dev.auto_login requires dev.email and dev.password".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("VIVAAS_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.backend.url = url;
        }

        if let Some(key) = lookup("VIVAAS_ANON_KEY") {
            self.backend.anon_key = key;
        }

        if let Some(table) = lookup("VIVAAS_PRODUCTS_TABLE") {
            self.backend.table = table;
        }

        if let Some(enabled) = lookup("VIVAAS_REALTIME_ENABLED") {
            match parse_bool(&enabled) {
                Some(b) => self.realtime.enabled = b,
                None => warn!(value = %enabled, "Ignoring VIVAAS_REALTIME_ENABLED"),
            }
        }

        if let Some(threshold) = lookup("VIVAAS_LOW_STOCK_THRESHOLD") {
            if let Ok(t) = threshold.parse::<u32>() {
                self.stock.default_low_stock_threshold = t;
            }
        }

        if let Some(auto_login) = lookup("VIVAAS_DEV_AUTO_LOGIN") {
            if let Some(b) = parse_bool(&auto_login) {
                self.dev.auto_login = b;
            }
        }

        if let Some(email) = lookup("VIVAAS_DEV_EMAIL") {
            self.dev.email = Some(email);
        }

        if let Some(password) = lookup("VIVAAS_DEV_PASSWORD") {
            self.dev.password = Some(password);
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "vivaas", "vivaas-inventory")
            .map(|dirs| dirs.config_dir().join("inventory.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.realtime.heartbeat_interval_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.realtime.connect_timeout_secs)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = InventoryConfig::default();
        assert_eq!(config.backend.table, "products");
        assert_eq!(config.stock.default_low_stock_threshold, 5);
        assert_eq!(config.stock.max_conflict_retries, 3);
        assert!(config.realtime.enabled);
        assert!(!config.dev.auto_login);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = InventoryConfig::default();

        config.backend.url = "ws://localhost:4000".to_string();
        assert!(config.validate().is_err());

        config.backend.url = "https://xyz.supabase.co".to_string();
        assert!(config.validate().is_ok());

        config.backend.table = "  ".to_string();
        assert!(config.validate().is_err());
        config.backend.table = "products".to_string();

        config.dev.auto_login = true;
        assert!(config.validate().is_err());
        config.dev.email = Some("dev@vivaas.test".to_string());
        config.dev.password = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VIVAAS_BACKEND_URL", "https://abc.supabase.co"),
            ("VIVAAS_PRODUCTS_TABLE", "inventory"),
            ("VIVAAS_REALTIME_ENABLED", "false"),
            ("VIVAAS_LOW_STOCK_THRESHOLD", "8"),
            ("VIVAAS_DEV_AUTO_LOGIN", "nonsense"),
        ]
        .into_iter()
        .collect();

        let mut config = InventoryConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.backend.url, "https://abc.supabase.co");
        assert_eq!(config.backend.table, "inventory");
        assert!(!config.realtime.enabled);
        assert_eq!(config.stock.default_low_stock_threshold, 8);
        assert!(!config.dev.auto_login);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: InventoryConfig = toml::from_str(
            r#"
            [backend]
            url = "https://xyz.supabase.co"
            anon_key = "anon"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.table, "products");
        assert_eq!(config.realtime.heartbeat_interval_secs, 30);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("inventory.toml");

        let mut config = InventoryConfig::default();
        config.backend.url = "https://xyz.supabase.co".to_string();
        config.stock.max_conflict_retries = 7;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[backend]"));
        assert!(contents.contains("[stock]"));

        let loaded: InventoryConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.stock.max_conflict_retries, 7);
        assert_eq!(loaded.backend.url, "https://xyz.supabase.co");
    }
}
