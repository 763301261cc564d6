//! Transport abstraction and the default hyper-based transport.
//!
//! The pipeline only ever talks to a [`Transport`]. [`HyperTransport`] is the
//! implementation used when the caller does not inject one.

use crate::body::RequestBody;
use crate::config::{TransportConfig, TransportSecurity};
use crate::error::{BoxError, FetchError, TransportError};
use crate::headers::has_header;
use crate::layers::UserAgentLayer;
use crate::request::FetchRequest;
use crate::tls;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use futures::future::BoxFuture;
use http::Response;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// Boxed response body produced by a [`Transport`]
pub type ResponseBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;

/// Request body type sent through the hyper client
type OutgoingBody = UnsyncBoxBody<Bytes, BoxError>;

type InnerService =
    BoxCloneSyncService<http::Request<OutgoingBody>, Response<ResponseBody>, TransportError>;

/// Performs the network exchange for a fully built request.
///
/// Implementations receive the resolved absolute URL and the request after
/// all request interceptors ran. Any status code is a successful exchange;
/// only failures to obtain a response are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, request: FetchRequest)
    -> Result<Response<ResponseBody>, BoxError>;
}

/// [`Transport`] backed by a closure; see [`transport_fn`]
#[derive(Clone)]
pub struct FnTransport<F> {
    f: F,
}

/// Adapt an async closure into a [`Transport`]
///
/// ```ignore
/// let transport = transport_fn(|url, req| async move {
///     Ok(http::Response::new(full_body(format!("{} {url}", req.method))))
/// });
/// ```
#[must_use]
pub fn transport_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(String, FetchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<ResponseBody>, BoxError>> + Send + 'static,
{
    FnTransport { f }
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(String, FetchRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<ResponseBody>, BoxError>> + Send + 'static,
{
    async fn fetch(
        &self,
        url: &str,
        request: FetchRequest,
    ) -> Result<Response<ResponseBody>, BoxError> {
        (self.f)(url.to_owned(), request).await
    }
}

/// In-memory response body
#[must_use]
pub fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}

/// Empty response body
#[must_use]
pub fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Default transport: pooled hyper client over rustls.
///
/// Layer stack (outer to inner): `Timeout → UserAgent → Decompression →
/// hyper client`. One attempt per request; redirects are returned as-is.
///
/// `HyperTransport` is `Send + Sync` and cheap to share behind an `Arc`.
pub struct HyperTransport {
    service: InnerService,
    transport_security: TransportSecurity,
}

static SHARED: OnceLock<Arc<HyperTransport>> = OnceLock::new();

impl HyperTransport {
    /// Build a transport from `config`
    ///
    /// # Errors
    /// Returns `FetchError::Tls` if the root store cannot be set up, or
    /// `FetchError::InvalidHeaderValue` if the user agent is not a valid
    /// header value.
    pub fn new(config: TransportConfig) -> Result<Self, FetchError> {
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let timeout = config.request_timeout;
        let https = tls::build_https_connector(config.tls_roots, config.transport)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .http2_only(false);
        if let Some(idle_timeout) = config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }
        let hyper_client = client_builder.build::<_, OutgoingBody>(https);

        let ua_layer = UserAgentLayer::try_new(&config.user_agent)?;

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(ua_layer)
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_response(map_decompression_response)
            .map_err(move |e: tower::BoxError| map_tower_error(e, timeout));

        Ok(Self {
            service: BoxCloneSyncService::new(service),
            transport_security: config.transport,
        })
    }

    /// Process-wide transport with the default [`TransportConfig`]
    ///
    /// Built on first use and reused afterwards.
    ///
    /// # Errors
    /// Propagates construction errors of the first build.
    pub fn shared() -> Result<Arc<Self>, FetchError> {
        if let Some(transport) = SHARED.get() {
            return Ok(Arc::clone(transport));
        }
        let transport = Arc::new(Self::new(TransportConfig::default())?);
        Ok(Arc::clone(SHARED.get_or_init(|| transport)))
    }

    /// Parse the URL and check its scheme against the security mode.
    fn validate_url(&self, url: &str) -> Result<http::Uri, TransportError> {
        let uri: http::Uri = url.parse().map_err(http::Error::from)?;

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(TransportError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(TransportError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(TransportError::InvalidScheme {
                scheme: String::new(),
                reason: "missing scheme".to_owned(),
            }),
        }
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn fetch(
        &self,
        url: &str,
        request: FetchRequest,
    ) -> Result<Response<ResponseBody>, BoxError> {
        let uri = self.validate_url(url)?;
        let request = into_http_request(uri, request)?;
        // Unboxed, the tower future fails the async-trait `Send` check.
        let exchange: BoxFuture<'static, Result<Response<ResponseBody>, TransportError>> =
            Box::pin(self.service.clone().oneshot(request));
        Ok(exchange.await?)
    }
}

/// Convert a pipeline request into an `http::Request` for the hyper stack.
///
/// Form and multipart bodies are serialized here; their content type is only
/// added when the request does not carry one already.
fn into_http_request(
    uri: http::Uri,
    request: FetchRequest,
) -> Result<http::Request<OutgoingBody>, TransportError> {
    let FetchRequest {
        method,
        headers,
        body,
        signal: _,
    } = request;

    let mut builder = http::Request::builder().method(method).uri(uri);

    let (body, content_type) = match body {
        None => (full(Bytes::new()), None),
        Some(RequestBody::Bytes(bytes)) => (full(bytes), None),
        Some(RequestBody::Text(text)) => (full(Bytes::from(text)), None),
        Some(RequestBody::Json(value)) => (
            full(Bytes::from(value.to_string())),
            Some(mime::APPLICATION_JSON.to_string()),
        ),
        Some(RequestBody::Form(fields)) => {
            let encoded = serde_urlencoded::to_string(&fields)?;
            (
                full(Bytes::from(encoded)),
                Some(mime::APPLICATION_WWW_FORM_URLENCODED.to_string()),
            )
        }
        Some(RequestBody::Multipart(multipart)) => {
            (full(multipart.to_bytes()), Some(multipart.content_type()))
        }
        Some(RequestBody::Stream(stream)) => (
            StreamBody::new(stream.map_ok(http_body::Frame::data)).boxed_unsync(),
            None,
        ),
    };

    if let Some(content_type) = content_type
        && !has_header(&headers, "content-type")
    {
        builder = builder.header(http::header::CONTENT_TYPE, content_type);
    }
    for (name, value) in headers {
        builder = builder.header(name, value);
    }

    Ok(builder.body(body)?)
}

fn full(bytes: Bytes) -> OutgoingBody {
    Full::new(bytes).map_err(|never| match never {}).boxed_unsync()
}

/// Map tower errors to `TransportError` with the configured timeout
fn map_tower_error(err: tower::BoxError, timeout: Duration) -> TransportError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return TransportError::Timeout(timeout);
    }
    match err.downcast::<hyper_util::client::legacy::Error>() {
        Ok(hyper_err) => TransportError::from(*hyper_err),
        Err(other) => TransportError::Connection(other),
    }
}

/// Box the decompression body into [`ResponseBody`]
fn map_decompression_response<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = response.into_parts();
    let boxed_body: ResponseBody = body.map_err(Into::into).boxed();
    Response::from_parts(parts, boxed_body)
}
