//! Configuration management for deskd.
//!
//! Loads settings from /etc/deskd/config.toml or uses defaults.
//! A missing file is normal (defaults apply); a malformed file is
//! logged and ignored rather than aborting startup.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/deskd/config.toml";

/// External ticketing system credentials. Absent section disables
/// external sync; assignment then stays local-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub project_key: String,
}

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    /// HTTP bind address (localhost only by default)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Technician/ticket store path
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Optional JSON file with the initial ticket batch
    #[serde(default)]
    pub tickets_path: Option<String>,

    /// Scheduler tick cadence in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Bound on one assignment attempt, including external sync
    #[serde(default = "default_assign_timeout_secs")]
    pub assign_timeout_secs: u64,

    /// SLA checker endpoint; unset means every ticket is treated as
    /// not covered
    #[serde(default)]
    pub sla_url: Option<String>,

    /// Answer retrieval endpoint; unset means lookups return
    /// not_found
    #[serde(default)]
    pub retrieval_url: Option<String>,

    /// Number of sources requested per answer lookup
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,

    /// Per-call timeout for collaborator HTTP requests
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,

    #[serde(default)]
    pub tracker: Option<TrackerConfig>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7890".to_string()
}

fn default_db_path() -> String {
    "/var/lib/deskd/desk.db".to_string()
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_assign_timeout_secs() -> u64 {
    30
}

fn default_retrieval_k() -> usize {
    5
}

fn default_collaborator_timeout_secs() -> u64 {
    15
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            tickets_path: None,
            tick_interval_ms: default_tick_interval_ms(),
            assign_timeout_secs: default_assign_timeout_secs(),
            sla_url: None,
            retrieval_url: None,
            retrieval_k: default_retrieval_k(),
            collaborator_timeout_secs: default_collaborator_timeout_secs(),
            tracker: None,
        }
    }
}

impl DeskConfig {
    /// Load from the default path.
    pub fn load() -> Self {
        Self::load_from(CONFIG_PATH)
    }

    /// Load from a specific path, falling back to defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config at {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Cannot read config at {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }
}
