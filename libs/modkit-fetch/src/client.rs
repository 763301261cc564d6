use crate::body::encode_body;
use crate::builder::FetchClientBuilder;
use crate::config::FetchConfig;
use crate::emulation::{self, Emulated};
use crate::error::FetchError;
use crate::headers::{has_header, normalize_header_input};
use crate::interceptor::{Interceptor, InterceptorChain, InterceptorHandle};
use crate::merge::merge_config;
use crate::params::apply_params;
use crate::request::{FetchRequest, RequestBuilder, RequestDescriptor, RequestOptions};
use crate::resolve::resolve_url;
use crate::response::{self, Response};
use crate::transport::Transport;
use std::sync::Arc;
use url::Url;

/// Fetch-style HTTP client
///
/// Layers instance defaults (base URL, headers, query parameters, method
/// emulation) over each call, runs request interceptors, hands the request
/// to the [`Transport`], decodes the response and runs response
/// interceptors. A final status of 400 or above is returned as
/// [`FetchError::Status`].
///
/// `FetchClient` is `Clone + Send + Sync`; clones share the configuration,
/// the transport and both interceptor lists.
///
/// # Example
///
/// ```ignore
/// let client = FetchClient::builder()
///     .base_url("https://api.example.com/v1")
///     .header("accept", "application/json")
///     .emulate_put_patch(true)
///     .build()?;
///
/// let user: User = client.get("/users/42").send().await?.json()?;
/// ```
#[derive(Clone)]
pub struct FetchClient {
    config: Arc<FetchConfig>,
    transport: Arc<dyn Transport>,
    request_interceptors: InterceptorChain<FetchRequest>,
    response_interceptors: InterceptorChain<Response>,
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FetchClient {
    /// Create a client over an explicit transport
    #[must_use]
    pub fn new(config: FetchConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            request_interceptors: InterceptorChain::new(),
            response_interceptors: InterceptorChain::new(),
        }
    }

    /// Create a builder for configuring the client
    #[must_use]
    pub fn builder() -> FetchClientBuilder {
        FetchClientBuilder::new()
    }

    /// Instance configuration
    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Request builder for an arbitrary method
    pub fn request(&self, method: http::Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, url)
    }

    /// GET request builder
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::GET, url)
    }

    /// POST request builder
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::POST, url)
    }

    /// PUT request builder; subject to method emulation when enabled
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::PUT, url)
    }

    /// PATCH request builder; subject to method emulation when enabled
    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::PATCH, url)
    }

    /// DELETE request builder
    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::DELETE, url)
    }

    /// Register a transform run on every outgoing request, after all
    /// previously registered ones
    ///
    /// An error returned by the interceptor aborts the request before the
    /// transport is called.
    #[allow(clippy::must_use_candidate)] // dropping the handle keeps the interceptor
    pub fn add_request_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: Interceptor<FetchRequest>,
    {
        self.request_interceptors.register(Arc::new(interceptor))
    }

    /// Register a transform run on every decoded response, after all
    /// previously registered ones
    ///
    /// Runs before status classification, so an interceptor may turn a
    /// failing status into a success or the other way around.
    #[allow(clippy::must_use_candidate)] // dropping the handle keeps the interceptor
    pub fn add_response_interceptor<I>(&self, interceptor: I) -> InterceptorHandle
    where
        I: Interceptor<Response>,
    {
        self.response_interceptors.register(Arc::new(interceptor))
    }

    /// Run the full request pipeline for one call.
    ///
    /// # Errors
    ///
    /// - `MissingUrl` / `InvalidUrl` when no absolute URL can be resolved
    /// - `Interceptor` when a request or response interceptor fails
    /// - `Transport` when the transport fails to produce a response
    /// - `Cancelled` when the request's cancellation token fires first
    /// - `Body` / `BodyTooLarge` when the response body cannot be read
    /// - `Status` when the final status code is 400 or above
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response, FetchError> {
        let response_type = descriptor.options.response_type;
        let (target, request) = self.prepare(descriptor)?;

        let request = self
            .request_interceptors
            .run(request)
            .await
            .map_err(FetchError::Interceptor)?;

        let url = target.as_str();
        let method = request.method.clone();
        tracing::debug!(method = %method, url, "sending request");

        let signal = request.signal.clone();
        let max_body_size = self.config.max_body_size;
        let exchange = async {
            let raw = self
                .transport
                .fetch(url, request)
                .await
                .map_err(FetchError::Transport)?;
            response::decode(raw, response_type, max_body_size).await
        };

        let response = match signal {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(method = %method, url, "request cancelled");
                    Err(FetchError::Cancelled)
                }
                result = exchange => result,
            },
            None => exchange.await,
        }?;

        let response = self
            .response_interceptors
            .run(response)
            .await
            .map_err(FetchError::Interceptor)?;

        tracing::debug!(method = %method, url, status = response.status_code, "request completed");

        if response.status_code >= 400 {
            return Err(FetchError::Status(Box::new(response)));
        }
        Ok(response)
    }

    /// Resolve the URL, merge instance and call-site layers, apply method
    /// emulation and encode the body.
    fn prepare(&self, descriptor: RequestDescriptor) -> Result<(Url, FetchRequest), FetchError> {
        let RequestDescriptor {
            url,
            method,
            body,
            options:
                RequestOptions {
                    headers: call_headers,
                    params: call_params,
                    signal,
                    ..
                },
        } = descriptor;

        let resolved = resolve_url(&url, self.config.base_url.as_deref());
        if resolved.is_empty() {
            return Err(FetchError::MissingUrl);
        }
        let mut target = Url::parse(&resolved).map_err(|e| FetchError::InvalidUrl {
            url: resolved.clone(),
            reason: e.to_string(),
        })?;

        let params = merge_config([&self.config.params, &call_params]);
        apply_params(&mut target, &params);

        let mut headers = merge_config([
            &normalize_header_input(&self.config.headers),
            &normalize_header_input(&call_headers),
        ]);

        let Emulated { method, body } =
            emulation::apply(&self.config.emulation, method, body, &mut target);

        let body = body.map(|payload| {
            let encoded = encode_body(payload);
            if let Some(content_type) = encoded.content_type
                && !has_header(&headers, "content-type")
            {
                headers.insert("content-type".to_owned(), content_type.to_owned());
            }
            encoded.body
        });

        Ok((
            target,
            FetchRequest {
                method,
                headers,
                body,
                signal,
            },
        ))
    }
}
