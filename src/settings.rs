//! Global configuration
//!
//! A process-wide `Settings` published behind `RwLock<Arc<_>>`: readers grab
//! an `Arc` clone, mutations replace the pointer. Loaded once from a TOML
//! file by the entry point, never as an import-time side effect.

use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::RwLock;
use std::sync::RwLockWriteGuard;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Server
    pub listen_address: String,
    pub listen_port: u16,

    /// Path prefix the subscription endpoints are mounted under.
    pub subscription_prefix: String,
    pub profile_title: String,
    pub support_url: String,
    /// `profile-update-interval` response header, in hours.
    pub profile_update_interval: u32,

    /// When set, hosts with a non-empty status set are hidden from users
    /// outside that set.
    pub filter_hosts_by_user_status: bool,

    // Client dispatcher opt-ins
    pub use_json_for_v2rayn: bool,
    pub use_json_for_v2rayng: bool,
    pub use_json_for_streisand: bool,
    pub use_json_for_happ: bool,
    pub use_json_for_ktor: bool,

    // Engine
    pub xray_config_path: String,
    pub exclude_inbound_tags: Vec<String>,
    pub fallbacks_inbound_tags: Vec<String>,

    // Jobs
    pub node_health_check_interval: u64,
    pub host_refresh_interval: u64,
    pub user_autodelete_interval: u64,
    /// Days a user may stay expired before autodelete; negative disables.
    pub expired_user_autodelete_days: i64,

    // Notifications
    pub webhook_url: String,
    pub webhook_timeout: u64,
    pub notification_max_retries: u32,
    pub notification_retry_interval: u64,

    // Format variables not derivable from the user record
    pub server_ip: String,
    pub server_ipv6: String,

    pub admins_file: String,
    pub users_file: String,
    pub hosts_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            listen_address: "127.0.0.1".to_string(),
            listen_port: 8000,
            subscription_prefix: "sub".to_string(),
            profile_title: "Subscription".to_string(),
            support_url: String::new(),
            profile_update_interval: 12,
            filter_hosts_by_user_status: false,
            use_json_for_v2rayn: false,
            use_json_for_v2rayng: false,
            use_json_for_streisand: false,
            use_json_for_happ: false,
            use_json_for_ktor: false,
            xray_config_path: "xray_config.json".to_string(),
            exclude_inbound_tags: Vec::new(),
            fallbacks_inbound_tags: Vec::new(),
            node_health_check_interval: 30,
            host_refresh_interval: 60,
            user_autodelete_interval: 3600,
            expired_user_autodelete_days: -1,
            webhook_url: String::new(),
            webhook_timeout: 10,
            notification_max_retries: 3,
            notification_retry_interval: 30,
            server_ip: String::new(),
            server_ipv6: String::new(),
            admins_file: "admins.json".to_string(),
            users_file: "users.json".to_string(),
            hosts_file: "hosts.json".to_string(),
        }
    }
}

static SETTINGS: LazyLock<RwLock<Arc<Settings>>> =
    LazyLock::new(|| RwLock::new(Arc::new(Settings::default())));

impl Settings {
    /// Snapshot of the current settings.
    pub fn current() -> Arc<Settings> {
        SETTINGS.read().unwrap().clone()
    }

    /// Write access for the entry point and tests.
    pub fn current_mut() -> RwLockWriteGuard<'static, Arc<Settings>> {
        SETTINGS.write().unwrap()
    }

    /// Load settings from a TOML file and publish them. An empty path keeps
    /// the defaults.
    pub fn init(path: &str) -> Result<(), ConfigError> {
        if path.is_empty() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&raw)
            .map_err(|e| ConfigError::Invalid(format!("bad settings file: {}", e)))?;
        *SETTINGS.write().unwrap() = Arc::new(settings);
        Ok(())
    }
}
