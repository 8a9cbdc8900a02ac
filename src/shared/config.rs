use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_COMPLETED_FIELD: &str = "concluido";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub collections: Vec<String>,
    pub completed_field: String,
    pub change_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    // host:port probed to decide reachability; None means manual control
    pub probe_addr: Option<String>,
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
            },
            sync: SyncConfig {
                collections: vec!["produtos".to_string(), "agendamentos".to_string()],
                completed_field: DEFAULT_COMPLETED_FIELD.to_string(),
                change_buffer: 64,
            },
            network: NetworkConfig {
                probe_addr: None,
                probe_interval_secs: 5,
                probe_timeout_ms: 2_000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
        }
    }
}

/// `sqlite:<data_dir>/opsync/mirror.db`, falling back to the working directory.
pub fn default_database_url() -> String {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    let path = base.join("opsync").join("mirror.db");
    format!("sqlite:{}?mode=rwc", path.display())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from defaults overlaid with `OPSYNC_*` values
    /// returned by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("OPSYNC_DATABASE_URL")
            && !v.trim().is_empty()
        {
            cfg.database.url = v.trim().to_string();
        }
        if let Some(v) = lookup("OPSYNC_DATABASE_MAX_CONNECTIONS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.database.max_connections = value as u32;
        }

        if let Some(v) = lookup("OPSYNC_COLLECTIONS") {
            let collections: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !collections.is_empty() {
                cfg.sync.collections = collections;
            }
        }
        if let Some(v) = lookup("OPSYNC_COMPLETED_FIELD")
            && !v.trim().is_empty()
        {
            cfg.sync.completed_field = v.trim().to_string();
        }

        if let Some(v) = lookup("OPSYNC_PROBE_ADDR") {
            let v = v.trim();
            cfg.network.probe_addr = if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            };
        }
        if let Some(v) = lookup("OPSYNC_PROBE_INTERVAL_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.network.probe_interval_secs = value.max(1);
        }
        if let Some(v) = lookup("OPSYNC_PROBE_TIMEOUT_MS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.network.probe_timeout_ms = value;
        }

        if let Some(v) = lookup("OPSYNC_LOG_LEVEL")
            && !v.trim().is_empty()
        {
            cfg.logging.level = v.trim().to_string();
        }
        if let Some(v) = lookup("OPSYNC_JSON_LOGS") {
            cfg.logging.json = parse_bool(&v, cfg.logging.json);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.collections.is_empty() {
            return Err("At least one collection must be tracked".to_string());
        }
        if self.sync.completed_field.trim().is_empty() {
            return Err("Sync completed_field cannot be empty".to_string());
        }
        if self.sync.change_buffer == 0 {
            return Err("Sync change_buffer must be greater than 0".to_string());
        }
        if self.network.probe_addr.is_some() && self.network.probe_timeout_ms == 0 {
            return Err("Network probe_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
