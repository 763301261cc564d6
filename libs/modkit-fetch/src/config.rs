use crate::headers::HeaderInput;
use crate::params::Params;
use serde::Deserialize;
use std::time::Duration;

/// Default User-Agent string for requests sent by [`HyperTransport`](crate::HyperTransport)
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-fetch/", env!("CARGO_PKG_VERSION"));

/// Default name of the method-emulation marker
pub const DEFAULT_EMULATION_KEY: &str = "_method";

/// Default maximum response body size (10 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Verb actually sent when PUT/PATCH are emulated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CarrierMethod {
    /// Marker travels in the request body
    #[default]
    Post,
    /// Marker and body fields travel in the query string
    Get,
}

impl CarrierMethod {
    /// The `http` method sent to the transport
    #[must_use]
    pub fn method(self) -> http::Method {
        match self {
            CarrierMethod::Post => http::Method::POST,
            CarrierMethod::Get => http::Method::GET,
        }
    }
}

/// PUT/PATCH method emulation policy
///
/// For intermediaries that only pass GET/POST: the request is sent with the
/// carrier verb and a `key=value` marker naming the real verb.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MethodEmulation {
    /// Enable emulation (default: false)
    #[serde(rename = "emulate_put_patch")]
    pub enabled: bool,

    /// Marker name (default: `_method`)
    #[serde(rename = "emulate_method_key")]
    pub key: Option<String>,

    /// Marker value (default: the emulated verb, e.g. `PUT`)
    #[serde(rename = "emulate_method_value")]
    pub value: Option<String>,

    /// Carrier verb (default: `POST`)
    #[serde(rename = "emulate_method")]
    pub carrier: CarrierMethod,
}

impl MethodEmulation {
    /// Enabled policy with default key, value and carrier
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Marker name in effect
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(DEFAULT_EMULATION_KEY)
    }
}

/// Instance-level defaults of a [`FetchClient`](crate::FetchClient)
///
/// Deserializable so it can be embedded in module configuration:
///
/// ```yaml
/// base_url: https://api.example.com/v1
/// headers:
///   Accept: application/json
/// params:
///   api_version: 2
/// emulate_put_patch: true
/// emulate_method: GET
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL that relative request URLs are joined to
    pub base_url: Option<String>,

    /// Default headers (call-site headers win)
    pub headers: HeaderInput,

    /// Default query parameters (call-site params win)
    pub params: Params,

    /// PUT/PATCH method emulation
    #[serde(flatten)]
    pub emulation: MethodEmulation,

    /// Maximum response body size in bytes (default: 10 MB)
    pub max_body_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: HeaderInput::None,
            params: Params::new(),
            emulation: MethodEmulation::default(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
///
/// Controls whether the default transport enforces TLS or allows insecure HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow insecure HTTP connections (for testing with mock servers only)
    ///
    /// **WARNING**: This should only be used for local testing with mock servers.
    /// Never use in production as it exposes traffic to interception.
    AllowInsecureHttp,
}

/// Configuration of the default [`HyperTransport`](crate::HyperTransport)
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout (default: 30 seconds)
    pub request_timeout: Duration,

    /// User-Agent header value, added when a request has none
    pub user_agent: String,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Timeout for idle pooled connections (default: 90 seconds)
    ///
    /// Set to `None` to use hyper-util's default idle timeout.
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 32)
    ///
    /// Setting this to `0` disables connection reuse entirely.
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

impl TransportConfig {
    /// Small timeout and pool, TLS only
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            pool_idle_timeout: Some(Duration::from_secs(30)),
            pool_max_idle_per_host: 8,
            ..Default::default()
        }
    }

    /// Configuration for testing with mock servers (allows insecure HTTP)
    ///
    /// **WARNING**: This configuration allows plain HTTP connections.
    /// Use only for local testing with mock servers, never in production.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            transport: TransportSecurity::AllowInsecureHttp,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
            ..Default::default()
        }
    }
}
