use crate::errors::{ConfigError, ValidationError};
use crate::request::probe_headers;
use crate::scheduler::ScheduleSpec;
use crate::types::{
    Credentials, EndpointSet, ParamValue, QueryParam, QueryParamSpec, Secret, Strategy,
};
use http::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const ENV_SCHEDULE: &str = "SCHEDULE";
pub const ENV_BASE_URL: &str = "BASE_URL";
pub const ENV_ENDPOINTS: &str = "ENDPOINTS";
pub const ENV_QUERY_PARAMS: &str = "QUERY_PARAMS";
pub const ENV_STRATEGY: &str = "DISPATCH_STRATEGY";
pub const ENV_AUTH_TOKEN: &str = "AUTH_TOKEN";
pub const ENV_API_KEY: &str = "API_KEY";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_REQUEST_TIMEOUT: &str = "REQUEST_TIMEOUT_SECS";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Network listener for the control surface
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// A query parameter as written in configuration, either
/// `{key, value}` or `{key, range}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RawQueryParam {
    pub key: String,
    #[serde(flatten)]
    pub value: RawParamValue,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawParamValue {
    Range { range: i64 },
    Literal { value: serde_json::Value },
}

/// Unvalidated configuration, as read from a file or the environment.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct RawConfig {
    pub schedule: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub query_params: Vec<RawQueryParam>,
    #[serde(default)]
    pub strategy: Strategy,
    /// Inbound secret for the control surface
    pub auth_token: Option<Secret>,
    /// Outbound credential attached to probes
    pub outbound_auth: Option<Secret>,
    #[serde(default)]
    pub listener: Listener,
    pub request_timeout_secs: Option<u64>,
}

impl RawConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value. Blank values are treated as unset. `ENDPOINTS` and
    /// `QUERY_PARAMS` hold JSON.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Listener::default();

        Ok(RawConfig {
            schedule: get(ENV_SCHEDULE),
            base_url: get(ENV_BASE_URL),
            endpoints: get(ENV_ENDPOINTS)
                .map(|raw| parse_json(ENV_ENDPOINTS, &raw))
                .transpose()?
                .unwrap_or_default(),
            query_params: get(ENV_QUERY_PARAMS)
                .map(|raw| parse_json(ENV_QUERY_PARAMS, &raw))
                .transpose()?
                .unwrap_or_default(),
            strategy: get(ENV_STRATEGY)
                .map(|raw| parse_value(ENV_STRATEGY, &raw))
                .transpose()?
                .unwrap_or_default(),
            auth_token: get(ENV_AUTH_TOKEN).map(Secret::new),
            outbound_auth: get(ENV_API_KEY).map(Secret::new),
            listener: Listener {
                host: get(ENV_HOST).unwrap_or(defaults.host),
                port: get(ENV_PORT)
                    .map(|raw| parse_value(ENV_PORT, &raw))
                    .transpose()?
                    .unwrap_or(defaults.port),
            },
            request_timeout_secs: get(ENV_REQUEST_TIMEOUT)
                .map(|raw| parse_value(ENV_REQUEST_TIMEOUT, &raw))
                .transpose()?,
        })
    }

    /// Checks every field and produces the immutable runtime configuration.
    pub fn validate(self) -> Result<Config, ValidationError> {
        let schedule = self
            .schedule
            .as_deref()
            .ok_or(ValidationError::MissingField("schedule"))
            .and_then(ScheduleSpec::parse)?;

        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ValidationError::MissingField("base_url"))?
            .to_string();
        let parsed = Url::parse(&base_url).map_err(|e| ValidationError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::UnsupportedScheme(
                parsed.scheme().to_string(),
            ));
        }

        // Endpoints and parameters are appended as text after the base URL.
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(ValidationError::InvalidBaseUrl {
                url: base_url,
                reason: "must not carry a query or fragment".into(),
            });
        }

        if let Some(endpoint) = self.endpoints.iter().find(|e| e.contains('#')) {
            return Err(ValidationError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: "a fragment would swallow the query parameters".into(),
            });
        }

        let query_params = validate_query_params(self.query_params)?;

        self.listener.validate()?;

        let timeout_secs = self
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        if let Some(token) = &self.auth_token {
            if http::HeaderValue::from_str(token.expose()).is_err() {
                return Err(ValidationError::InvalidCredential("inbound secret"));
            }
        }
        let headers = probe_headers(self.outbound_auth.as_ref())?;

        Ok(Config {
            schedule,
            base_url,
            endpoints: EndpointSet::new(self.endpoints),
            query_params,
            strategy: self.strategy,
            credentials: Credentials {
                inbound: self.auth_token,
                outbound: self.outbound_auth,
            },
            listener: self.listener,
            request_timeout: Duration::from_secs(timeout_secs),
            headers,
        })
    }
}

fn validate_query_params(raw: Vec<RawQueryParam>) -> Result<QueryParamSpec, ValidationError> {
    let mut params = Vec::with_capacity(raw.len());

    for param in raw {
        if param.key.trim().is_empty() {
            return Err(ValidationError::EmptyParamKey);
        }

        let value = match param.value {
            RawParamValue::Range { range } => match u32::try_from(range) {
                Ok(max) if max >= 1 => ParamValue::Range(max),
                _ => {
                    return Err(ValidationError::InvalidParamRange {
                        key: param.key,
                        range,
                    });
                }
            },
            RawParamValue::Literal { value } => match value {
                serde_json::Value::String(s) => ParamValue::Literal(s),
                serde_json::Value::Number(n) => ParamValue::Literal(n.to_string()),
                serde_json::Value::Bool(b) => ParamValue::Literal(b.to_string()),
                _ => return Err(ValidationError::InvalidParamValue { key: param.key }),
            },
        };

        params.push(QueryParam {
            key: param.key,
            value,
        });
    }

    let ranged = params
        .iter()
        .filter(|p| matches!(p.value, ParamValue::Range(_)))
        .count();
    if ranged != 0 && ranged != params.len() {
        return Err(ValidationError::MixedParamModes);
    }

    Ok(QueryParamSpec::new(params))
}

fn parse_json<T: DeserializeOwned>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Malformed {
        field,
        reason: e.to_string(),
    })
}

fn parse_value<T>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Malformed {
        field,
        reason: e.to_string(),
    })
}

/// Validated configuration. Built once at startup and never mutated.
#[derive(Clone, Debug)]
pub struct Config {
    pub schedule: ScheduleSpec,
    /// Base URL exactly as configured (trimmed), without normalization.
    pub base_url: String,
    pub endpoints: EndpointSet,
    pub query_params: QueryParamSpec,
    pub strategy: Strategy,
    pub credentials: Credentials,
    pub listener: Listener,
    pub request_timeout: Duration,
    /// Headers sent with every probe, credential included.
    pub headers: HeaderMap,
}
