//! Base HTTP client shared by every remote capability.
//!
//! Each capability endpoint gets a [`CapabilityClient`] built from a validated
//! base URL plus a fixed set of default headers. Requests are resolved
//! relative to that base and responses are decoded strictly, so a remote
//! failure always surfaces as an error rather than a partial value.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, Method, RequestBuilder, Url, header};
use serde_json::Value;
use tracing::debug;
use visitnote_util::{http::parse_response_json_strict, http::status_error_message, redact_json, redact_sensitive};

/// Hostnames allowed to use plain HTTP.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]"];

/// Default per-request timeout for capability calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client` for one capability endpoint.
pub struct CapabilityClient {
    /// Capability name used in logs and error messages.
    pub name: &'static str,
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl CapabilityClient {
    /// Construct a client for `base_url` with the given default headers.
    ///
    /// Non-loopback hosts must use HTTPS.
    pub fn new(name: &'static str, base_url: &str, headers: &IndexMap<String, String>, timeout: Duration) -> Result<Self> {
        validate_base_url(base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        for (header_key, header_text) in headers {
            let header_name =
                header::HeaderName::from_bytes(header_key.as_bytes()).with_context(|| format!("invalid header name '{header_key}'"))?;
            let header_value = header::HeaderValue::from_str(header_text).map_err(|_| anyhow!("invalid value for header '{header_key}'"))?;
            default_headers.insert(header_name, header_value);
        }

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()
            .context("build http client")?;

        Ok(Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            user_agent: format!("visitnote/0.1; {}", std::env::consts::OS),
        })
    }

    /// Build a `reqwest::RequestBuilder` for a method and base-relative path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(capability = self.name, url = %redact_sensitive(&url), "building request");

        self.http.request(method, url).header(header::USER_AGENT, &self.user_agent)
    }

    /// Send a request and decode its JSON body, failing on non-success statuses.
    pub async fn send_json(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder
            .send()
            .await
            .map_err(|error| anyhow!("{} request failed: {}", self.name, redact_sensitive(&error.to_string())))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("read {} response body", self.name))?;

        if !status.is_success() {
            let hint = status_error_message(status.as_u16()).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            let detail = serde_json::from_str::<Value>(text.trim())
                .map(|payload| redact_json(&payload).to_string())
                .unwrap_or_else(|_| redact_sensitive(text.trim()));
            return Err(anyhow!("{} returned {}: {}", self.name, hint, detail));
        }

        parse_response_json_strict(&text, Some(status)).map_err(|error| anyhow!("{}: {}", self.name, error))
    }
}

/// Validate that a base URL is acceptable for a capability client.
///
/// Rules:
/// - loopback hosts: any scheme is allowed
/// - otherwise: scheme must be HTTPS
pub fn validate_base_url(base: &str) -> Result<()> {
    let parsed_base_url = Url::parse(base).map_err(|e| anyhow!("Invalid capability URL '{}': {}", base, e))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| anyhow!("capability URL '{}' must include a host", base))?;

    if LOCALHOST_DOMAINS
        .iter()
        .any(|&allowed| host_name.eq_ignore_ascii_case(allowed))
    {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(anyhow!(
            "capability URL must use https for non-localhost hosts; got '{}://'",
            parsed_base_url.scheme()
        ));
    }

    Ok(())
}

/// Characters escaped in a path segment; unreserved URL characters stay literal.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encode a single path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}
