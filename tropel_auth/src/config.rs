//! TOML configuration.
//!
//! Every field has a default, so an empty document (or no file at all) runs
//! against `http://localhost:80` with the default load levels:
//!
//! ```toml
//! [target]
//! protocol = "https"
//! root_domain = "auth.example"
//! tld = ".com"
//! port = 443
//!
//! [loads]
//! normal = 80
//!
//! [run]
//! seed = 7
//!
//! [thresholds]
//! p99_ms = 1000
//! ```
use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tropel::{Percentile, Threshold};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub http: HttpConfig,
    pub loads: LoadLevels,
    pub run: RunConfig,
    pub thresholds: ThresholdsConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// Where the service under test lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub protocol: String,
    /// Including the trailing dot, e.g. `www.`.
    pub subdomain: String,
    pub root_domain: String,
    /// Including the leading dot, e.g. `.com`.
    pub tld: String,
    pub port: u16,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            protocol: "http".into(),
            subdomain: String::new(),
            root_domain: "localhost".into(),
            tld: String::new(),
            port: 80,
        }
    }
}

impl TargetConfig {
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}{}{}:{}",
            self.protocol, self.subdomain, self.root_domain, self.tld, self.port
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub insecure_skip_tls_verify: bool,
    /// Opens a new connection for every request.
    pub no_connection_reuse: bool,
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            insecure_skip_tls_verify: true,
            no_connection_reuse: false,
            timeout_ms: 30_000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Virtual-user levels the load profiles are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadLevels {
    pub below_normal: usize,
    pub normal: usize,
    pub breaking_point: usize,
    pub above_breaking_point: usize,
    pub spike: usize,
}

impl Default for LoadLevels {
    fn default() -> Self {
        Self {
            below_normal: 10,
            normal: 50,
            breaking_point: 100,
            above_breaking_point: 150,
            spike: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pause between the steps of a chained behavior.
    pub think_time_ms: u64,
    /// Seeds weighted draws and generated credentials. Entropy when unset.
    pub seed: Option<u64>,
    /// Domain of generated usernames.
    pub email_domain: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            think_time_ms: 100,
            seed: None,
            email_domain: "email".into(),
        }
    }
}

impl RunConfig {
    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }
}

/// Latency bounds per case, in milliseconds. A breach fails the run once it
/// is over; it never stops it early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            p50_ms: None,
            p95_ms: None,
            p99_ms: Some(1000),
        }
    }
}

impl ThresholdsConfig {
    pub fn thresholds(&self) -> Vec<Threshold> {
        [
            (Percentile::P50, self.p50_ms),
            (Percentile::P95, self.p95_ms),
            (Percentile::P99, self.p99_ms),
        ]
        .into_iter()
        .filter_map(|(percentile, ms)| {
            ms.map(|ms| Threshold::new(percentile, Duration::from_millis(ms)))
        })
        .collect()
    }
}
