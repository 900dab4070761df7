use crate::errors::ValidationError;
use crate::types::Secret;
use http::HeaderMap;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue, USER_AGENT};
use url::form_urlencoded;

pub const PROBE_USER_AGENT: &str = concat!("cronprobe/", env!("CARGO_PKG_VERSION"));

/// Joins `endpoint` onto `base_url` and appends the form-encoded `params`.
///
/// - A non-empty endpoint is joined with exactly one `/`.
/// - An empty endpoint leaves `base_url` untouched.
/// - No `?` is added when `params` is empty.
///
/// The output depends only on the inputs.
pub fn build_url(base_url: &str, endpoint: &str, params: &[(String, String)]) -> String {
    let mut url = if endpoint.is_empty() {
        base_url.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    };

    if !params.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query);
    }

    url
}

/// Fixed header set sent with every probe.
///
/// The outbound credential goes out as `Bearer <credential>` unless it already
/// names a scheme (contains a space), in which case it is sent as is.
pub fn probe_headers(outbound: Option<&Secret>) -> Result<HeaderMap, ValidationError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(PROBE_USER_AGENT));

    if let Some(secret) = outbound {
        let raw = secret.expose().trim();
        let value = if raw.contains(' ') {
            raw.to_string()
        } else {
            format!("Bearer {raw}")
        };
        let mut value = HeaderValue::from_str(&value)
            .map_err(|_| ValidationError::InvalidCredential("outbound credential"))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}
