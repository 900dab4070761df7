use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Credentials {
    /// Required from callers of the protected control operations.
    pub inbound: Option<Secret>,
    /// Attached to every outbound probe request.
    pub outbound: Option<Secret>,
}

/// Ordered endpoint paths, relative to the base URL.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EndpointSet(Vec<String>);

impl EndpointSet {
    pub fn new(endpoints: Vec<String>) -> Self {
        EndpointSet(endpoints)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    Literal(String),
    /// Sampled uniformly from `1..=n` on every dispatch.
    Range(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryParam {
    pub key: String,
    pub value: ParamValue,
}

/// Validated query parameters. All entries share the same mode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryParamSpec(Vec<QueryParam>);

impl QueryParamSpec {
    pub fn new(params: Vec<QueryParam>) -> Self {
        QueryParamSpec(params)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryParam> {
        self.0.iter()
    }
}

/// How endpoints are chosen on each dispatch cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Call one endpoint picked uniformly at random.
    #[default]
    SingleRandom,
    /// Call every endpoint.
    BroadcastAll,
}

impl Strategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Strategy::SingleRandom => "single_random",
            Strategy::BroadcastAll => "broadcast_all",
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "single_random" => Ok(Strategy::SingleRandom),
            "broadcast_all" => Ok(Strategy::BroadcastAll),
            other => Err(format!(
                "unknown strategy {other:?}, expected single_random or broadcast_all"
            )),
        }
    }
}

/// What started a dispatch cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Schedule,
    Manual,
}

impl Trigger {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Trigger::Schedule => "schedule",
            Trigger::Manual => "manual",
        }
    }
}

/// Result of a single outbound call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub url: String,
    /// Set when redirects moved the request away from `url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    pub status: Option<u16>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Outcomes of one dispatch cycle, in selection order.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeBatch {
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcomes: Vec<DispatchOutcome>,
}

impl OutcomeBatch {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_noop(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "single_random".parse::<Strategy>().unwrap(),
            Strategy::SingleRandom
        );
        assert_eq!(
            " broadcast_all ".parse::<Strategy>().unwrap(),
            Strategy::BroadcastAll
        );
        assert!("round_robin".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = DispatchOutcome {
            url: "https://h/e".into(),
            final_url: None,
            status: Some(200),
            success: true,
            error: None,
            duration_ms: 12,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "url": "https://h/e",
                "status": 200,
                "success": true,
                "durationMs": 12,
            })
        );
    }
}
