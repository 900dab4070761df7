//! Endpoint and query parameter selection.
//!
//! All randomness in a dispatch cycle lives here. Callers pass the random
//! source so tests can use a seeded generator.

use crate::types::{EndpointSet, ParamValue, QueryParamSpec, Strategy};
use rand::Rng;

/// One planned outbound call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
}

/// Plans the calls for one cycle. Returns nothing for an empty endpoint set.
pub fn select<R: Rng>(
    strategy: Strategy,
    endpoints: &EndpointSet,
    params: &QueryParamSpec,
    rng: &mut R,
) -> Vec<Selection> {
    match strategy {
        Strategy::SingleRandom => pick_endpoint(endpoints, rng)
            .map(|endpoint| Selection {
                endpoint: endpoint.to_string(),
                params: sample_params(params, rng),
            })
            .into_iter()
            .collect(),
        Strategy::BroadcastAll => endpoints
            .iter()
            .map(|endpoint| Selection {
                endpoint: endpoint.to_string(),
                params: sample_params(params, rng),
            })
            .collect(),
    }
}

/// Picks one endpoint uniformly at random.
pub fn pick_endpoint<'a, R: Rng>(
    endpoints: &'a EndpointSet,
    rng: &mut R,
) -> Option<&'a str> {
    if endpoints.is_empty() {
        return None;
    }
    endpoints.get(rng.random_range(0..endpoints.len()))
}

/// Resolves every parameter to a concrete value. Ranges are sampled
/// independently from `1..=n`.
pub fn sample_params<R: Rng>(spec: &QueryParamSpec, rng: &mut R) -> Vec<(String, String)> {
    spec.iter()
        .map(|param| {
            let value = match &param.value {
                ParamValue::Literal(value) => value.clone(),
                ParamValue::Range(max) => rng.random_range(1..=*max).to_string(),
            };
            (param.key.clone(), value)
        })
        .collect()
}
