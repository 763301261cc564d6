use crate::error::{BoxError, FetchError};
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{BoxStream, Stream};
use serde::Serialize;
use serde_json::Value;

/// Streaming request body
pub type ByteStream = BoxStream<'static, Result<Bytes, BoxError>>;

/// Request payload
///
/// The variant decides how [`encode_body`] treats the payload:
/// binary-like kinds (`Bytes`, `Form`, `Multipart`, `Stream`) pass through,
/// `Text` is checked for JSON, `Json` is serialized by shape.
pub enum RequestBody {
    /// Raw bytes
    Bytes(Bytes),
    /// URL-encoded form fields
    Form(Vec<(String, String)>),
    /// `multipart/form-data` fields
    Multipart(Multipart),
    /// Streaming bytes
    Stream(ByteStream),
    /// Text payload
    Text(String),
    /// Structured payload
    Json(Value),
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Form(fields) => f.debug_tuple("Form").field(fields).finish(),
            RequestBody::Multipart(multipart) => {
                f.debug_tuple("Multipart").field(multipart).finish()
            }
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
            RequestBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            RequestBody::Json(value) => f.debug_tuple("Json").field(value).finish(),
        }
    }
}

impl RequestBody {
    /// Serialize a value into a structured payload
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Json` if the value cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, FetchError> {
        Ok(RequestBody::Json(serde_json::to_value(value)?))
    }

    /// URL-encoded form payload
    #[must_use]
    pub fn form<K, V, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Streaming payload
    #[must_use]
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        RequestBody::Stream(Box::pin(stream))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_owned())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(bytes))
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<Multipart> for RequestBody {
    fn from(multipart: Multipart) -> Self {
        RequestBody::Multipart(multipart)
    }
}

/// A single `multipart/form-data` field
#[derive(Debug, Clone)]
struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

/// `multipart/form-data` payload with a random boundary
#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Create an empty multipart payload
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: format!(
                "modkit-fetch-{:016x}{:016x}",
                rand::random::<u64>(),
                rand::random::<u64>()
            ),
            parts: Vec::new(),
        }
    }

    /// Add a text field
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_text(name, value);
        self
    }

    /// Add a file field
    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(Part {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        });
        self
    }

    pub(crate) fn push_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(Part {
            name: name.into(),
            filename: None,
            content_type: None,
            data: Bytes::from(value.into()),
        });
    }

    /// Boundary separating the parts
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Names of all fields in insertion order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// `Content-Type` header value for this payload
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Serialize all parts
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        for part in &self.parts {
            out.put_slice(b"--");
            out.put_slice(self.boundary.as_bytes());
            out.put_slice(b"\r\nContent-Disposition: form-data; name=\"");
            out.put_slice(escape_quoted(&part.name).as_bytes());
            out.put_u8(b'"');
            if let Some(filename) = &part.filename {
                out.put_slice(b"; filename=\"");
                out.put_slice(escape_quoted(filename).as_bytes());
                out.put_u8(b'"');
            }
            out.put_slice(b"\r\n");
            if let Some(content_type) = &part.content_type {
                out.put_slice(b"Content-Type: ");
                out.put_slice(content_type.as_bytes());
                out.put_slice(b"\r\n");
            }
            out.put_slice(b"\r\n");
            out.put_slice(&part.data);
            out.put_slice(b"\r\n");
        }
        out.put_slice(b"--");
        out.put_slice(self.boundary.as_bytes());
        out.put_slice(b"--\r\n");
        out.freeze()
    }
}

fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Result of [`encode_body`]: transport-ready payload plus inferred content type
#[derive(Debug)]
pub struct EncodedBody {
    pub body: RequestBody,
    pub content_type: Option<&'static str>,
}

const APPLICATION_JSON: &str = "application/json";
const TEXT_PLAIN: &str = "text/plain";

/// Classify a payload and encode it for the transport.
///
/// Classification order: binary-like kinds pass through without a content
/// type; text (including a JSON string value) is passed verbatim with
/// `application/json` when it parses as JSON and `text/plain` otherwise;
/// objects and arrays are serialized as JSON; numbers, booleans and null are
/// stringified as `text/plain`. Never fails.
#[must_use]
pub fn encode_body(payload: RequestBody) -> EncodedBody {
    match payload {
        body @ (RequestBody::Bytes(_)
        | RequestBody::Form(_)
        | RequestBody::Multipart(_)
        | RequestBody::Stream(_)) => EncodedBody {
            body,
            content_type: None,
        },
        RequestBody::Text(text) | RequestBody::Json(Value::String(text)) => encode_text(text),
        RequestBody::Json(value @ (Value::Object(_) | Value::Array(_))) => EncodedBody {
            body: RequestBody::Text(value.to_string()),
            content_type: Some(APPLICATION_JSON),
        },
        RequestBody::Json(primitive) => EncodedBody {
            body: RequestBody::Text(primitive.to_string()),
            content_type: Some(TEXT_PLAIN),
        },
    }
}

fn encode_text(text: String) -> EncodedBody {
    let content_type = if serde_json::from_str::<serde::de::IgnoredAny>(&text).is_ok() {
        APPLICATION_JSON
    } else {
        TEXT_PLAIN
    };
    EncodedBody {
        body: RequestBody::Text(text),
        content_type: Some(content_type),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_of(encoded: &EncodedBody) -> &str {
        match &encoded.body {
            RequestBody::Text(text) => text,
            other => panic!("expected text body, got {other:?}"),
        }
    }

    #[test]
    fn test_binary_kinds_pass_through() {
        let encoded = encode_body(RequestBody::Bytes(Bytes::from_static(b"\x00\x01")));
        assert!(matches!(encoded.body, RequestBody::Bytes(ref b) if b.len() == 2));
        assert_eq!(encoded.content_type, None);

        let encoded = encode_body(RequestBody::form([("a", "1")]));
        assert!(matches!(encoded.body, RequestBody::Form(_)));
        assert_eq!(encoded.content_type, None);

        let encoded = encode_body(RequestBody::from(Multipart::new().text("a", "1")));
        assert!(matches!(encoded.body, RequestBody::Multipart(_)));
        assert_eq!(encoded.content_type, None);

        let stream = futures::stream::iter(vec![Ok::<_, BoxError>(Bytes::from_static(b"x"))]);
        let encoded = encode_body(RequestBody::stream(stream));
        assert!(matches!(encoded.body, RequestBody::Stream(_)));
        assert_eq!(encoded.content_type, None);
    }

    #[test]
    fn test_json_text_is_passed_verbatim() {
        let raw = r#"{ "a" : 1 }"#;
        let encoded = encode_body(RequestBody::from(raw));
        assert_eq!(text_of(&encoded), raw);
        assert_eq!(encoded.content_type, Some("application/json"));
    }

    #[test]
    fn test_plain_text() {
        let encoded = encode_body(RequestBody::from("hello world"));
        assert_eq!(text_of(&encoded), "hello world");
        assert_eq!(encoded.content_type, Some("text/plain"));
    }

    #[test]
    fn test_json_string_value_takes_text_path() {
        let encoded = encode_body(RequestBody::Json(json!("[1,2]")));
        assert_eq!(text_of(&encoded), "[1,2]");
        assert_eq!(encoded.content_type, Some("application/json"));

        let encoded = encode_body(RequestBody::Json(json!("plain")));
        assert_eq!(text_of(&encoded), "plain");
        assert_eq!(encoded.content_type, Some("text/plain"));
    }

    #[test]
    fn test_structured_payload_round_trips() {
        let original = json!({"key": "value", "nested": {"n": [1, 2, 3]}, "flag": true});
        let encoded = encode_body(RequestBody::Json(original.clone()));

        assert_eq!(encoded.content_type, Some("application/json"));
        let parsed: Value = serde_json::from_str(text_of(&encoded)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_primitives_are_stringified() {
        for (value, expected) in [
            (json!(42), "42"),
            (json!(1.5), "1.5"),
            (json!(true), "true"),
            (Value::Null, "null"),
        ] {
            let encoded = encode_body(RequestBody::Json(value));
            assert_eq!(text_of(&encoded), expected);
            assert_eq!(encoded.content_type, Some("text/plain"));
        }
    }

    #[test]
    fn test_request_body_json_helper() {
        #[derive(Serialize)]
        struct NewUser<'a> {
            name: &'a str,
        }

        let body = RequestBody::json(&NewUser { name: "Alice" }).unwrap();
        assert!(matches!(body, RequestBody::Json(ref v) if v == &json!({"name": "Alice"})));
    }

    #[test]
    fn test_multipart_serialization() {
        let multipart = Multipart::new()
            .text("title", "report")
            .file("upload", "a\"b.txt", "text/plain", "content");
        let boundary = multipart.boundary().to_owned();
        let bytes = multipart.to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        let expected = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nreport\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a%22b.txt\"\r\n\
             Content-Type: text/plain\r\n\r\ncontent\r\n--{boundary}--\r\n"
        );
        assert_eq!(text, expected);
        assert_eq!(
            multipart.content_type(),
            format!("multipart/form-data; boundary={boundary}")
        );
    }

    #[test]
    fn test_multipart_boundaries_differ() {
        assert_ne!(Multipart::new().boundary(), Multipart::new().boundary());
    }
}
