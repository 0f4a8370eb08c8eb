use clap::Args;
use serde::Deserialize;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::Error;
use crate::model::{Defaults, Target};

const DEFAULT_PORT: u16 = 3003;
const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_WORKERS: usize = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SMTP_PORT: u16 = 587;

/// On-disk layout of the TOML configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub config: ConfigOptions,
    #[serde(default)]
    pub defaults: DefaultOptions,
    #[serde(default)]
    pub inventory: Vec<Target>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigOptions {
    pub port: Option<u16>,
    pub interval_secs: Option<u64>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DefaultOptions {
    pub endpoint: Option<String>,
    pub status: Option<u16>,
}

/// Command line and environment values that take precedence over the file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Port the status server listens on
    #[arg(short, long, env = "DOWNWATCH_PORT")]
    pub port: Option<u16>,
    /// Seconds between two checks of the inventory
    #[arg(short = 'T', long, env = "DOWNWATCH_INTERVAL")]
    pub interval_secs: Option<u64>,
    /// Number of concurrent workers
    #[arg(short, long, env = "DOWNWATCH_WORKERS")]
    pub workers: Option<usize>,
    /// Endpoint to query when a target has none
    #[arg(short, long, env = "DOWNWATCH_DEFAULT_ENDPOINT")]
    pub endpoint: Option<String>,
    /// HTTP status expected when a target has none
    #[arg(short, long, env = "DOWNWATCH_DEFAULT_STATUS")]
    pub status: Option<u16>,
}

/// Fully resolved configuration snapshot consumed by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub inventory: Vec<Target>,
    pub interval: Duration,
    pub workers: usize,
    pub timeout: Duration,
    pub defaults: Defaults,
    pub port: u16,
}

impl Settings {
    /// Reads `path` and resolves it with `overrides`.
    pub fn load<P: AsRef<Path>>(path: P, overrides: &Overrides) -> Result<Settings, Error> {
        let content = fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content)?;

        Settings::resolve(file, overrides)
    }

    pub fn resolve(file: ConfigFile, overrides: &Overrides) -> Result<Settings, Error> {
        let settings = Settings {
            inventory: file.inventory,
            interval: Duration::from_secs(
                overrides
                    .interval_secs
                    .or(file.config.interval_secs)
                    .unwrap_or(DEFAULT_INTERVAL_SECS),
            ),
            workers: overrides
                .workers
                .or(file.config.workers)
                .unwrap_or(DEFAULT_WORKERS),
            timeout: Duration::from_secs(file.config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            defaults: Defaults {
                endpoint: overrides
                    .endpoint
                    .clone()
                    .or(file.defaults.endpoint)
                    .unwrap_or_else(|| "/".to_string()),
                status: overrides.status.or(file.defaults.status).unwrap_or(200),
            },
            port: overrides.port.or(file.config.port).unwrap_or(DEFAULT_PORT),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.interval.is_zero() {
            return Err(Error::Config("interval must be greater than zero".to_string()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }
        check_endpoint(&self.defaults.endpoint)?;
        check_status(self.defaults.status)?;

        let mut seen = HashSet::new();
        for target in &self.inventory {
            if target.domain.trim().is_empty() {
                return Err(Error::Config("inventory entry with empty domain".to_string()));
            }
            if !seen.insert(target.domain.as_str()) {
                return Err(Error::Config(format!(
                    "domain {} appears more than once in inventory",
                    target.domain
                )));
            }
            if let Some(endpoint) = &target.endpoint {
                check_endpoint(endpoint)?;
            }
            if let Some(status) = target.status {
                check_status(status)?;
            }
        }
        Ok(())
    }
}

fn check_endpoint(endpoint: &str) -> Result<(), Error> {
    if endpoint.starts_with('/') {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "endpoint {endpoint} must start with '/'"
        )))
    }
}

fn check_status(status: u16) -> Result<(), Error> {
    if (100..=599).contains(&status) {
        Ok(())
    } else {
        Err(Error::Config(format!("{status} is not a valid HTTP status")))
    }
}

/// Location used when neither `--config` nor `DOWNWATCH_CONFIG` is given.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir().map_or_else(
        || PathBuf::from("/etc/downwatch/config.toml"),
        |dir| dir.join("downwatch").join("config.toml"),
    )
}

/// Supplies configuration snapshots, at startup and on every reload request.
pub trait ConfigSource: Send {
    fn load(&self) -> Result<Settings, Error>;
}

/// Reads the configuration file again on each load, applying the same overrides.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    overrides: Overrides,
}

impl FileSource {
    pub fn new(path: PathBuf, overrides: Overrides) -> Self {
        Self { path, overrides }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<Settings, Error> {
        Settings::load(&self.path, &self.overrides)
    }
}

/// SMTP transport settings, only ever read from the environment.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl SmtpSettings {
    /// Returns `None` when `DOWNWATCH_SMTP_HOST` is not set.
    pub fn from_env() -> Result<Option<SmtpSettings>, Error> {
        let Ok(host) = dotenvy::var("DOWNWATCH_SMTP_HOST") else {
            return Ok(None);
        };

        let port = match dotenvy::var("DOWNWATCH_SMTP_PORT") {
            Ok(port) => port
                .parse()
                .map_err(|_| Error::Config(format!("invalid SMTP port: {port}")))?,
            Err(_) => DEFAULT_SMTP_PORT,
        };

        Ok(Some(SmtpSettings {
            host,
            port,
            login: dotenvy::var("DOWNWATCH_SMTP_LOGIN").unwrap_or_default(),
            password: dotenvy::var("DOWNWATCH_SMTP_PASSWORD").unwrap_or_default(),
            from: dotenvy::var("DOWNWATCH_SMTP_FROM")
                .unwrap_or_else(|_| "downwatch@example.com".to_string()),
            to: dotenvy::var("DOWNWATCH_SMTP_TO")
                .map_err(|_| Error::Config("DOWNWATCH_SMTP_TO must be set".to_string()))?,
        }))
    }
}
