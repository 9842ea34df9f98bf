use clap::ValueEnum;
use log::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_LOCATION_COUNT, ENV_SERVICE_ANON_KEY, ENV_SERVICE_URL,
    PLACEHOLDER_ANON_KEY, PLACEHOLDER_SERVICE_URL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBackend {
    /// Managed Supabase-compatible REST service (default)
    #[default]
    Rest,
    /// Local SQLite file plus a media directory
    Sqlite,
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_draft_ttl_minutes() -> u64 {
    60
}

fn default_max_upload_mb() -> usize {
    100
}

/// Application configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP port for `serve` (default: 3000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address the application is reachable at, used for locally served media URLs
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Which data service implementation to use (default: rest)
    #[serde(default)]
    pub backend: DataBackend,
    /// External data service connection (maps to [service] section in TOML)
    #[serde(default)]
    pub service: ServiceConfig,
    /// Local backend storage (maps to [sqlite] section in TOML)
    #[serde(default)]
    pub sqlite: SqliteConfig,
    /// QR provisioning (maps to [qr] section in TOML)
    #[serde(default)]
    pub qr: QrConfig,
    /// Minutes an idle form draft is kept before being swept (default: 60)
    #[serde(default = "default_draft_ttl_minutes")]
    pub draft_ttl_minutes: u64,
    /// Maximum accepted size of one form post in megabytes (default: 100)
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

/// External data service connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL, e.g. https://project.supabase.co
    pub url: String,
    /// Public (anon) key sent with every request
    pub anon_key: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: PLACEHOLDER_SERVICE_URL.to_string(),
            anon_key: PLACEHOLDER_ANON_KEY.to_string(),
        }
    }
}

impl ServiceConfig {
    /// True while either value is still the built-in placeholder
    pub fn is_placeholder(&self) -> bool {
        self.url == PLACEHOLDER_SERVICE_URL || self.anon_key == PLACEHOLDER_ANON_KEY
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// SQLite database file (created if missing)
    pub path: PathBuf,
    /// Directory holding uploaded media, served under /media
    pub media_dir: PathBuf,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/feedback.sqlite"),
            media_dir: PathBuf::from("data/media"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Address encoded into every QR code
    pub base_url: String,
    /// Locations toilet_1..=toilet_N are provisioned
    pub location_count: u32,
    /// Directory receiving the PNG files and index.html (created if missing)
    pub output_dir: PathBuf,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            location_count: DEFAULT_LOCATION_COUNT,
            output_dir: PathBuf::from("public/qr-codes"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_url: default_public_url(),
            backend: DataBackend::default(),
            service: ServiceConfig::default(),
            sqlite: SqliteConfig::default(),
            qr: QrConfig::default(),
            draft_ttl_minutes: default_draft_ttl_minutes(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides.
    ///
    /// Without a file every field takes its default value.
    pub fn load(config_path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    format!("Failed to read config file '{}': {}", path.display(), e)
                })?;
                toml::from_str(&content).map_err(|e| {
                    format!("Failed to parse config file '{}': {}", path.display(), e)
                })?
            }
            None => AppConfig::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        if config.backend == DataBackend::Rest && config.service.is_placeholder() {
            warn!(
                "{} / {} not set, data service calls will fail until configured",
                ENV_SERVICE_URL, ENV_SERVICE_ANON_KEY
            );
        }

        Ok(config)
    }

    /// Override service settings from the environment.
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVICE_URL).filter(|v| !v.trim().is_empty()) {
            self.service.url = url;
        }
        if let Some(key) = lookup(ENV_SERVICE_ANON_KEY).filter(|v| !v.trim().is_empty()) {
            self.service.anon_key = key;
        }
    }

    /// Reject values that cannot work at all
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }
        if self.qr.location_count == 0 {
            return Err("qr.location_count must be greater than 0".to_string());
        }
        if self.draft_ttl_minutes == 0 {
            return Err("draft_ttl_minutes must be greater than 0".to_string());
        }
        if self.max_upload_mb == 0 {
            return Err("max_upload_mb must be greater than 0".to_string());
        }
        Ok(())
    }
}
