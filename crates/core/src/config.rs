use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub bind_addr: String,
    pub log_level: String,
    pub devto_api_url: String,
    pub upstream_timeout: Duration,
    pub metric_export_interval: Duration,
    pub mongo: MongoConfig,
    pub service: ServiceIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MongoConfig {
    pub uri: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_source: Option<String>,
    pub db_name: String,
    pub log_collection: String,
    pub trace_collection: String,
    pub metric_collection: String,
    pub server_selection_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceIdentity {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// How the database is addressed. A URI always wins over the discrete settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MongoTarget<'a> {
    Uri(&'a str),
    Host {
        host: &'a str,
        port: u16,
        credentials: Option<(&'a str, &'a str)>,
        auth_source: Option<&'a str>,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            log_level: "INFO".to_string(),
            devto_api_url: "https://dev.to/api/articles".to_string(),
            upstream_timeout: Duration::from_secs(10),
            metric_export_interval: Duration::from_secs(60),
            mongo: MongoConfig::default(),
            service: ServiceIdentity::default(),
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: None,
            host: "localhost".to_string(),
            port: 27017,
            username: None,
            password: None,
            auth_source: None,
            db_name: "telemetry".to_string(),
            log_collection: "logs".to_string(),
            trace_collection: "traces".to_string(),
            metric_collection: "metrics".to_string(),
            server_selection_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self {
            name: "devto-news-service".to_string(),
            version: "1.0.0".to_string(),
            instance_id: "local-instance".to_string(),
        }
    }
}

impl Config {
    /// Loads the dotenv file named by `ENV_FILE` (default `.env`), then reads the environment.
    pub fn load() -> Result<Self> {
        load_env_file(&env_file_path())?;
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        apply_overrides(&mut cfg, load_env_overrides(), "environment")?;
        Ok(cfg)
    }

    /// `LOG_LEVEL` normalized to a tracing level directive.
    pub fn level_directive(&self) -> &'static str {
        match self.log_level.trim().to_ascii_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" | "CRITICAL" | "FATAL" => "error",
            _ => "info",
        }
    }
}

impl MongoConfig {
    pub fn target(&self) -> MongoTarget<'_> {
        if let Some(uri) = self.uri.as_deref() {
            return MongoTarget::Uri(uri);
        }

        let credentials = match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        };
        MongoTarget::Host {
            host: &self.host,
            port: self.port,
            credentials,
            auth_source: self.auth_source.as_deref(),
        }
    }
}

#[derive(Debug, Default)]
struct ConfigOverrides {
    bind_addr: Option<String>,
    log_level: Option<String>,
    devto_api_url: Option<String>,
    upstream_timeout: Option<String>,
    metric_export_interval_ms: Option<String>,
    mongo_uri: Option<String>,
    mongo_host: Option<String>,
    mongo_port: Option<String>,
    mongo_username: Option<String>,
    mongo_password: Option<String>,
    mongo_auth_source: Option<String>,
    mongo_db_name: Option<String>,
    mongo_log_collection: Option<String>,
    mongo_trace_collection: Option<String>,
    mongo_metric_collection: Option<String>,
    mongo_server_selection_timeout: Option<String>,
    service_name: Option<String>,
    service_version: Option<String>,
    service_instance_id: Option<String>,
}

fn env_file_path() -> PathBuf {
    env::var("ENV_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".env"))
}

fn load_env_file(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(MirrorError::Config(format!(
            "failed loading {}: {e}",
            path.display()
        ))),
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn load_env_overrides() -> ConfigOverrides {
    ConfigOverrides {
        bind_addr: var("NEWS_BIND_ADDR"),
        log_level: var("LOG_LEVEL"),
        devto_api_url: var("DEVTO_API_URL"),
        upstream_timeout: var("NEWS_UPSTREAM_TIMEOUT"),
        metric_export_interval_ms: var("OTEL_METRIC_EXPORT_INTERVAL"),
        mongo_uri: var("MONGO_URI"),
        mongo_host: var("MONGO_HOST"),
        mongo_port: var("MONGO_PORT"),
        mongo_username: var("MONGO_USERNAME"),
        mongo_password: var("MONGO_PASSWORD"),
        mongo_auth_source: var("MONGO_AUTH_SOURCE"),
        mongo_db_name: var("MONGO_DB_NAME"),
        mongo_log_collection: var("MONGO_LOG_COLLECTION"),
        mongo_trace_collection: var("MONGO_TRACE_COLLECTION"),
        mongo_metric_collection: var("MONGO_METRIC_COLLECTION"),
        mongo_server_selection_timeout: var("MONGO_SERVER_SELECTION_TIMEOUT"),
        service_name: var("OTEL_SERVICE_NAME"),
        service_version: var("OTEL_SERVICE_VERSION"),
        service_instance_id: var("OTEL_SERVICE_INSTANCE_ID"),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.bind_addr {
        cfg.bind_addr = v;
    }
    if let Some(v) = overrides.log_level {
        cfg.log_level = v;
    }
    if let Some(v) = overrides.devto_api_url {
        cfg.devto_api_url = v;
    }
    if let Some(v) = overrides.upstream_timeout {
        cfg.upstream_timeout = humantime::parse_duration(&v).map_err(|e| {
            MirrorError::Config(format!("bad upstream_timeout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.metric_export_interval_ms {
        let millis = v.parse::<u64>().map_err(|e| {
            MirrorError::Config(format!(
                "bad metric_export_interval in {source}: {e} (value={v})"
            ))
        })?;
        cfg.metric_export_interval = Duration::from_millis(millis);
    }

    let mongo = &mut cfg.mongo;
    if let Some(v) = overrides.mongo_uri {
        mongo.uri = Some(v);
    }
    if let Some(v) = overrides.mongo_host {
        mongo.host = v;
    }
    if let Some(v) = overrides.mongo_port {
        mongo.port = v.parse::<u16>().map_err(|e| {
            MirrorError::Config(format!("bad mongo port in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.mongo_username {
        mongo.username = Some(v);
    }
    if let Some(v) = overrides.mongo_password {
        mongo.password = Some(v);
    }
    if let Some(v) = overrides.mongo_auth_source {
        mongo.auth_source = Some(v);
    }
    if let Some(v) = overrides.mongo_db_name {
        mongo.db_name = v;
    }
    if let Some(v) = overrides.mongo_log_collection {
        mongo.log_collection = v;
    }
    if let Some(v) = overrides.mongo_trace_collection {
        mongo.trace_collection = v;
    }
    if let Some(v) = overrides.mongo_metric_collection {
        mongo.metric_collection = v;
    }
    if let Some(v) = overrides.mongo_server_selection_timeout {
        mongo.server_selection_timeout = humantime::parse_duration(&v).map_err(|e| {
            MirrorError::Config(format!(
                "bad server_selection_timeout in {source}: {e} (value={v})"
            ))
        })?;
    }

    let service = &mut cfg.service;
    if let Some(v) = overrides.service_name {
        service.name = v;
    }
    if let Some(v) = overrides.service_version {
        service.version = v;
    }
    if let Some(v) = overrides.service_instance_id {
        service.instance_id = v;
    }
    Ok(())
}
