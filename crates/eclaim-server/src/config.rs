use std::{net::SocketAddr, time::Duration};

use eclaim_core::Credentials;
use eclaim_db_postgres::PostgresConfig;
use eclaim_transport::{DEFAULT_CLAIMS_PATH, FacilityInfo, TransportConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Insurer gateway credentials and endpoint
    #[serde(default)]
    pub clearinghouse: ClearinghouseConfig,
    /// Facility identity echoed in responses
    #[serde(default)]
    pub facility: FacilityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Clearinghouse validations
        let ch = &self.clearinghouse;
        for (name, value) in [
            ("consumer_id", &ch.consumer_id),
            ("consumer_secret", &ch.consumer_secret),
            ("facility_code", &ch.facility_code),
            ("user_key", &ch.user_key),
            ("base_url", &ch.base_url),
        ] {
            if value.trim().is_empty() {
                return Err(format!("clearinghouse.{name} must not be empty"));
            }
        }
        if !ch.base_url.starts_with("http://") && !ch.base_url.starts_with("https://") {
            return Err("clearinghouse.base_url must be an http(s) URL".into());
        }
        if !ch.claims_path.starts_with('/') {
            return Err("clearinghouse.claims_path must start with '/'".into());
        }
        if ch.timeout_ms == 0 {
            return Err("clearinghouse.timeout_ms must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Storage validation
        if self.storage.backend == StorageBackend::Postgres {
            match self.storage.postgres {
                None => return Err("storage.backend = \"postgres\" requires [storage.postgres]".into()),
                Some(ref pg) if pg.url.is_empty() => {
                    return Err("storage.postgres.url must not be empty".into());
                }
                Some(ref pg) if pg.pool_size == 0 => {
                    return Err("storage.postgres.pool_size must be > 0".into());
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn credentials(&self) -> Credentials {
        let ch = &self.clearinghouse;
        Credentials::new(
            &ch.consumer_id,
            &ch.consumer_secret,
            &ch.facility_code,
            &ch.user_key,
            &ch.base_url,
        )
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            claims_path: self.clearinghouse.claims_path.clone(),
            timeout: Duration::from_millis(self.clearinghouse.timeout_ms),
        }
    }

    pub fn facility_info(&self) -> FacilityInfo {
        FacilityInfo {
            name: self.facility.name.clone(),
            facility_code: self.clearinghouse.facility_code.clone(),
            ministry_code: self.facility.ministry_code.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bundles with attachments get large; keep this generous
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    16 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearinghouseConfig {
    #[serde(default)]
    pub consumer_id: String,
    #[serde(default)]
    pub consumer_secret: String,
    /// Insurer-issued facility (PPK) code; also part of the payload key
    #[serde(default)]
    pub facility_code: String,
    #[serde(default)]
    pub user_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_claims_path")]
    pub claims_path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_claims_path() -> String {
    DEFAULT_CLAIMS_PATH.into()
}
fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for ClearinghouseConfig {
    fn default() -> Self {
        Self {
            consumer_id: String::new(),
            consumer_secret: String::new(),
            facility_code: String::new(),
            user_key: String::new(),
            base_url: String::new(),
            claims_path: default_claims_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FacilityConfig {
    #[serde(default)]
    pub name: String,
    /// Ministry of health registration code
    #[serde(default)]
    pub ministry_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Audit trail kept in process memory; lost on restart
    #[default]
    Memory,
    /// Audit trail in `claim_audit`, episodes looked up in `bridging_sep`
    Postgres,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "eclaim.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., ECLAIM__CLEARINGHOUSE__USER_KEY=...
        builder = builder.add_source(
            Environment::with_prefix("ECLAIM")
                .prefix_separator("__")
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
