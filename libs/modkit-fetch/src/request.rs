use crate::body::{Multipart, RequestBody};
use crate::client::FetchClient;
use crate::error::FetchError;
use crate::headers::{HeaderInput, Headers, normalize_header_input};
use crate::params::{ParamValue, Params};
use crate::response::{Response, ResponseType};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Request as handed to interceptors and the transport
///
/// Header names are lower-cased. The body has already been encoded, and a
/// `content-type` header is present whenever one could be inferred.
#[derive(Debug)]
pub struct FetchRequest {
    pub method: http::Method,
    pub headers: Headers,
    pub body: Option<RequestBody>,
    pub signal: Option<CancellationToken>,
}

impl FetchRequest {
    /// Header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Per-call options layered over the client defaults
#[derive(Debug, Default)]
pub struct RequestOptions {
    /// Call-site headers (win over client defaults)
    pub headers: HeaderInput,
    /// Call-site query parameters (win over client defaults)
    pub params: Params,
    /// Response decoding mode (default: `Json`)
    pub response_type: ResponseType,
    /// Cancels the transport exchange when triggered
    pub signal: Option<CancellationToken>,
}

/// Everything [`FetchClient::execute`] needs for one call
#[derive(Debug)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: http::Method,
    pub body: Option<RequestBody>,
    pub options: RequestOptions,
}

impl RequestDescriptor {
    #[must_use]
    pub fn new(method: http::Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            options: RequestOptions::default(),
        }
    }
}

/// Fluent request builder
///
/// Created by [`FetchClient::get`], [`FetchClient::post`], etc. Nothing is
/// sent until [`send()`](RequestBuilder::send) is awaited.
///
/// # Example
///
/// ```ignore
/// let resp = client
///     .put("/users/42")
///     .header("x-request-id", "abc123")
///     .param("notify", "false")
///     .json(&UpdateUser { name: "Alice" })
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    client: FetchClient,
    descriptor: RequestDescriptor,
    /// Error captured during building (deferred to `send()`)
    error: Option<FetchError>,
}

impl RequestBuilder {
    pub(crate) fn new(client: FetchClient, method: http::Method, url: &str) -> Self {
        Self {
            client,
            descriptor: RequestDescriptor::new(method, url),
            error: None,
        }
    }

    /// Add a single header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.descriptor.options.headers.append(name, value);
        self
    }

    /// Add headers from any supported representation
    ///
    /// Later calls extend earlier ones; on a name clash the later value wins.
    pub fn headers(mut self, headers: impl Into<HeaderInput>) -> Self {
        let headers = headers.into();
        if self.descriptor.options.headers.is_none() {
            self.descriptor.options.headers = headers;
        } else {
            for (name, value) in normalize_header_input(&headers) {
                self.descriptor.options.headers.append(name, value);
            }
        }
        self
    }

    /// Set a single query parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.descriptor
            .options
            .params
            .insert(name.into(), value.into());
        self
    }

    /// Set several query parameters
    pub fn params(mut self, params: Params) -> Self {
        self.descriptor.options.params.extend(params);
        self
    }

    /// Set the request body
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.descriptor.body = Some(body.into());
        self
    }

    /// Serialize `value` as the request body
    ///
    /// A serialization failure is reported by [`send()`](Self::send).
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match RequestBody::json(value) {
            Ok(body) => self.descriptor.body = Some(body),
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Text body; sent as `application/json` when the text is valid JSON
    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(RequestBody::Text(text.into()))
    }

    /// URL-encoded form body
    pub fn form<K, V, I>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.body(RequestBody::form(fields))
    }

    /// `multipart/form-data` body
    pub fn multipart(self, multipart: Multipart) -> Self {
        self.body(RequestBody::Multipart(multipart))
    }

    /// Response decoding mode
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.descriptor.options.response_type = response_type;
        self
    }

    /// Cancellation token for this request
    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.descriptor.options.signal = Some(signal);
        self
    }

    /// Replace all options at once
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.descriptor.options = options;
        self
    }

    /// Send the request
    ///
    /// # Errors
    ///
    /// Returns the deferred builder error if one was captured, otherwise
    /// whatever [`FetchClient::execute`] returns.
    pub async fn send(mut self) -> Result<Response, FetchError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.client.execute(self.descriptor).await
    }
}
