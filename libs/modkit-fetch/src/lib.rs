#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Fetch-style HTTP request pipeline for `ModKit`
//!
//! [`FetchClient`] builds each request from layered configuration and hands
//! it to a pluggable [`Transport`]:
//! - relative URLs joined to an instance base URL
//! - instance and call-site headers/query parameters merged, call site wins
//! - request bodies classified and given an inferred `content-type`
//! - optional PUT/PATCH emulation over POST or GET for restrictive proxies
//! - async request and response interceptors with removal handles
//! - responses decoded as JSON, text, blob or raw bytes
//! - statuses of 400 and above reported as [`FetchError::Status`]
//! - per-request cancellation via `CancellationToken`
//!
//! The default transport, [`HyperTransport`], is a pooled hyper client over
//! rustls with a per-request timeout, `User-Agent` injection and transparent
//! gzip/brotli/deflate decompression. It makes one attempt per request and
//! does not follow redirects.
//!
//! # Example
//!
//! ```ignore
//! use modkit_fetch::{FetchClient, FetchRequest};
//!
//! let client = FetchClient::builder()
//!     .base_url("https://api.example.com/v1")
//!     .header("accept", "application/json")
//!     .build()?;
//!
//! client.add_request_interceptor(|mut req: FetchRequest| async move {
//!     req.headers.insert("authorization".into(), "Bearer token".into());
//!     Ok(req)
//! });
//!
//! let created = client
//!     .post("/users")
//!     .json(&NewUser { name: "Alice" })
//!     .send()
//!     .await?;
//! ```

mod body;
mod builder;
mod client;
mod config;
mod emulation;
mod error;
mod headers;
mod interceptor;
mod layers;
mod merge;
mod params;
mod request;
mod resolve;
mod response;
mod tls;
mod transport;

pub use body::{ByteStream, EncodedBody, Multipart, RequestBody, encode_body};
pub use builder::FetchClientBuilder;
pub use client::FetchClient;
pub use config::{
    CarrierMethod, DEFAULT_EMULATION_KEY, DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, FetchConfig,
    MethodEmulation, TlsRootConfig, TransportConfig, TransportSecurity,
};
pub use error::{BoxError, FetchError, TransportError, is_status_error};
pub use headers::{HeaderInput, Headers, has_header, normalize_header_input};
pub use interceptor::{Interceptor, InterceptorHandle};
pub use layers::{UserAgentLayer, UserAgentService};
pub use merge::merge_config;
pub use params::{ParamValue, Params, apply_params, set_query_param};
pub use request::{FetchRequest, RequestBuilder, RequestDescriptor, RequestOptions};
pub use resolve::resolve_url;
pub use response::{Blob, Response, ResponseData, ResponseType};
pub use transport::{
    FnTransport, HyperTransport, ResponseBody, Transport, empty_body, full_body, transport_fn,
};
