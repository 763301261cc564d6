use crate::error::FetchError;
use crate::headers::{Headers, native_entries};
use crate::transport::ResponseBody;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the response body is decoded into [`ResponseData`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseType {
    /// UTF-8 text (invalid sequences replaced)
    Text,
    /// JSON value; empty bodies decode to `null`, unparsable bodies fall back
    /// to [`ResponseData::Text`]
    #[default]
    Json,
    /// Bytes plus the response content type
    Blob,
    /// Raw bytes
    ArrayBuffer,
}

/// Binary body together with its declared content type
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl Blob {
    /// Parsed content type, if present and well-formed
    #[must_use]
    pub fn mime(&self) -> Option<mime::Mime> {
        self.content_type.as_deref()?.parse().ok()
    }
}

/// Decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Json(Value),
    Text(String),
    Blob(Blob),
    ArrayBuffer(Bytes),
}

impl ResponseData {
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseData::Json(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Raw bytes of a `Blob` or `ArrayBuffer` body
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseData::Blob(blob) => Some(&blob.bytes),
            ResponseData::ArrayBuffer(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Completed exchange as seen by response interceptors and callers
///
/// Header names are lower-cased; repeated headers are joined with `", "`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub headers: Headers,
    pub status_code: u16,
    pub data: ResponseData,
}

impl Response {
    /// Whether the status code is below 400
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code < 400
    }

    /// Header value by case-insensitive name
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Deserialize the decoded body into `T`
    ///
    /// # Errors
    /// Returns `FetchError::Json` if the body does not match `T`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// #[derive(Deserialize)]
    /// struct User { id: u64, name: String }
    ///
    /// let user: User = client.get("/users/1").send().await?.json()?;
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        let value = match &self.data {
            ResponseData::Json(value) => T::deserialize(value)?,
            ResponseData::Text(text) => serde_json::from_str(text)?,
            ResponseData::Blob(Blob { bytes, .. }) | ResponseData::ArrayBuffer(bytes) => {
                serde_json::from_slice(bytes)?
            }
        };
        Ok(value)
    }
}

/// Turn a raw transport response into a [`Response`].
///
/// The body is read once, up to `max_body_size` bytes, and decoded according
/// to `response_type`.
pub(crate) async fn decode(
    raw: http::Response<ResponseBody>,
    response_type: ResponseType,
    max_body_size: usize,
) -> Result<Response, FetchError> {
    let (parts, body) = raw.into_parts();
    let headers = native_entries(&parts.headers);
    let bytes = read_body_limited(body, max_body_size).await?;

    let data = match response_type {
        ResponseType::Json => decode_json(&bytes),
        ResponseType::Text => ResponseData::Text(String::from_utf8_lossy(&bytes).into_owned()),
        ResponseType::Blob => ResponseData::Blob(Blob {
            content_type: headers.get("content-type").cloned(),
            bytes,
        }),
        ResponseType::ArrayBuffer => ResponseData::ArrayBuffer(bytes),
    };

    Ok(Response {
        headers,
        status_code: parts.status.as_u16(),
        data,
    })
}

fn decode_json(bytes: &Bytes) -> ResponseData {
    let text = String::from_utf8_lossy(bytes);
    if text.is_empty() {
        return ResponseData::Json(Value::Null);
    }
    match serde_json::from_str(&text) {
        Ok(value) => ResponseData::Json(value),
        Err(err) => {
            tracing::debug!(error = %err, "response body is not JSON; returning text");
            ResponseData::Text(text.into_owned())
        }
    }
}

/// Collect a body, failing once more than `limit` bytes have arrived.
///
/// The limit applies to the bytes produced by the body, which for
/// [`HyperTransport`](crate::HyperTransport) are already decompressed.
async fn read_body_limited(body: ResponseBody, limit: usize) -> Result<Bytes, FetchError> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(FetchError::Body)?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(FetchError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}
