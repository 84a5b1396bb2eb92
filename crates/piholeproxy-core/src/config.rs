//! Application configuration management.
//!
//! Configuration is layered: built-in defaults, then an optional JSON file
//! (`$PIHOLEPROXY_CONFIG`, else `~/.config/piholeproxy/config.json`), then
//! environment variables. Missing endpoints or password are reported but
//! never fatal: the proxy starts degraded instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::client::DEFAULT_TIMEOUT_SECS;
use crate::auth::Endpoint;
use crate::models::GroupIds;

/// Application name used for the config directory path
const APP_NAME: &str = "piholeproxy";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the config file location
const CONFIG_PATH_ENV: &str = "PIHOLEPROXY_CONFIG";

const DEFAULT_ADBLOCK_GROUP_ID: i64 = 0;
const DEFAULT_NON_ADBLOCK_GROUP_ID: i64 = 1;
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pi-hole base URLs as configured (normalized by `endpoints()`)
    pub endpoints: Vec<String>,
    /// Shared Pi-hole web password
    pub password: Option<String>,
    pub adblock_group_id: i64,
    pub non_adblock_group_id: i64,
    pub listen_addr: String,
    pub static_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            password: None,
            adblock_group_id: DEFAULT_ADBLOCK_GROUP_ID,
            non_adblock_group_id: DEFAULT_NON_ADBLOCK_GROUP_ID,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// Keeps the password out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("endpoints", &self.endpoints)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("adblock_group_id", &self.adblock_group_id)
            .field("non_adblock_group_id", &self.non_adblock_group_id)
            .field("listen_addr", &self.listen_addr)
            .field("static_dir", &self.static_dir)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Load the config file (if any) and apply the process environment.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Override fields from environment-style variables.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(raw) = lookup("ENDPOINTS") {
            self.endpoints = raw
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(password) = lookup("PIHOLE_PASS") {
            self.password = Some(password);
        }
        if let Some(raw) = lookup("ADBLOCK_GROUP_ID") {
            self.adblock_group_id = parse_or_warn("ADBLOCK_GROUP_ID", &raw, DEFAULT_ADBLOCK_GROUP_ID);
        }
        if let Some(raw) = lookup("NON_ADBLOCK_GROUP_ID") {
            self.non_adblock_group_id = parse_or_warn("NON_ADBLOCK_GROUP_ID", &raw, DEFAULT_NON_ADBLOCK_GROUP_ID);
        }
        if let Some(addr) = lookup("LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.static_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_or_warn("REQUEST_TIMEOUT_SECS", &raw, DEFAULT_TIMEOUT_SECS);
        }
    }

    /// Normalized, de-duplicated endpoints in configuration order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        Endpoint::parse_list(&self.endpoints.join(","))
    }

    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_secs {
            0 => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    pub fn group_ids(&self) -> GroupIds {
        GroupIds {
            adblock_group_id: self.adblock_group_id,
            non_adblock_group_id: self.non_adblock_group_id,
        }
    }

    /// Log the effective settings and anything that will degrade service.
    pub fn report(&self) {
        let endpoints = self.endpoints();
        if endpoints.is_empty() {
            error!("No ENDPOINTS configured; every Pi-hole request will fail");
        } else {
            let list: Vec<&str> = endpoints.iter().map(Endpoint::as_str).collect();
            info!(endpoints = ?list, "Pi-hole API hosts set");
        }
        if !self.has_password() {
            error!("No PIHOLE_PASS configured; no session can be opened");
        }
        info!(
            adblock_group_id = self.adblock_group_id,
            non_adblock_group_id = self.non_adblock_group_id,
            "Group ids set"
        );
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

fn parse_or_warn<T: std::str::FromStr + fmt::Display + Copy>(key: &str, raw: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = raw, default = %default, "Invalid number, using default");
            default
        }
    }
}
