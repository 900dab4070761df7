use dispatcher::config::RawConfig;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

pub const ENV_STATSD_HOST: &str = "STATSD_HOST";
pub const ENV_STATSD_PORT: &str = "STATSD_PORT";
pub const ENV_SENTRY_DSN: &str = "SENTRY_DSN";

const DEFAULT_STATSD_PORT: u16 = 8125;

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl CommonConfig {
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let metrics = match get(ENV_STATSD_HOST) {
            Some(statsd_host) => {
                let statsd_port = match get(ENV_STATSD_PORT) {
                    Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                        ConfigError::InvalidEnv {
                            field: ENV_STATSD_PORT,
                            reason: e.to_string(),
                        }
                    })?,
                    None => DEFAULT_STATSD_PORT,
                };
                Some(MetricsConfig {
                    statsd_host,
                    statsd_port,
                })
            }
            None => None,
        };

        Ok(CommonConfig {
            metrics,
            logging: get(ENV_SENTRY_DSN).map(|sentry_dsn| LoggingConfig { sentry_dsn }),
        })
    }
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub probe: RawConfig,
}

impl Config {
    /// Reads the YAML file at `path` when given, the environment otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_lookup(|name| std::env::var(name).ok()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            common: CommonConfig::from_lookup(&lookup)?,
            probe: RawConfig::from_lookup(&lookup)?,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("malformed value for {field}: {reason}")]
    InvalidEnv { field: &'static str, reason: String },
    #[error(transparent)]
    Probe(#[from] dispatcher::errors::ConfigError),
}
