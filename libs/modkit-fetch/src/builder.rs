use crate::client::FetchClient;
use crate::config::{CarrierMethod, FetchConfig, TransportConfig};
use crate::error::FetchError;
use crate::headers::{HeaderInput, normalize_header_input};
use crate::params::{ParamValue, Params};
use crate::transport::{HyperTransport, Transport};
use std::sync::Arc;

/// Builder for [`FetchClient`]
///
/// Without an explicit [`transport`](Self::transport) the client uses a
/// [`HyperTransport`]: a dedicated one when
/// [`transport_config`](Self::transport_config) was given, otherwise the
/// process-wide [`HyperTransport::shared`] instance.
#[must_use]
pub struct FetchClientBuilder {
    config: FetchConfig,
    transport: Option<Arc<dyn Transport>>,
    transport_config: Option<TransportConfig>,
}

impl FetchClientBuilder {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::with_config(FetchConfig::default())
    }

    /// Create a builder starting from an existing configuration
    pub fn with_config(config: FetchConfig) -> Self {
        Self {
            config,
            transport: None,
            transport_config: None,
        }
    }

    /// Base URL that relative request URLs are joined to
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    /// Add a default header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.append(name, value);
        self
    }

    /// Add default headers from any supported representation
    pub fn headers(mut self, headers: impl Into<HeaderInput>) -> Self {
        let headers = headers.into();
        if self.config.headers.is_none() {
            self.config.headers = headers;
        } else {
            for (name, value) in normalize_header_input(&headers) {
                self.config.headers.append(name, value);
            }
        }
        self
    }

    /// Add a default query parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.config.params.insert(name.into(), value.into());
        self
    }

    /// Add default query parameters
    pub fn params(mut self, params: Params) -> Self {
        self.config.params.extend(params);
        self
    }

    /// Use a specific transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build a dedicated [`HyperTransport`] with this configuration
    ///
    /// Ignored when [`transport`](Self::transport) is set.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = Some(config);
        self
    }

    /// Enable PUT/PATCH method emulation
    pub fn emulate_put_patch(mut self, enabled: bool) -> Self {
        self.config.emulation.enabled = enabled;
        self
    }

    /// Name of the emulation marker (default: `_method`)
    pub fn emulate_method_key(mut self, key: impl Into<String>) -> Self {
        self.config.emulation.key = Some(key.into());
        self
    }

    /// Verb that carries emulated requests (default: `POST`)
    pub fn emulate_method(mut self, carrier: CarrierMethod) -> Self {
        self.config.emulation.carrier = carrier;
        self
    }

    /// Value of the emulation marker (default: the emulated verb)
    pub fn emulate_method_value(mut self, value: impl Into<String>) -> Self {
        self.config.emulation.value = Some(value.into());
        self
    }

    /// Maximum response body size in bytes
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Build the client
    ///
    /// # Errors
    /// Returns an error if the default transport cannot be constructed
    /// (TLS setup or an invalid user agent).
    pub fn build(self) -> Result<FetchClient, FetchError> {
        let transport: Arc<dyn Transport> = match (self.transport, self.transport_config) {
            (Some(transport), _) => transport,
            (None, Some(config)) => Arc::new(HyperTransport::new(config)?),
            (None, None) => HyperTransport::shared()?,
        };
        Ok(FetchClient::new(self.config, transport))
    }
}

impl Default for FetchClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
