use http::HeaderMap;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};

/// Canonical header mapping: lower-cased names to values.
pub type Headers = BTreeMap<String, String>;

/// Header input accepted from configuration and call sites.
///
/// All representations are reduced to [`Headers`] by
/// [`normalize_header_input`] before any merging happens, so header names
/// are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub enum HeaderInput {
    /// No headers supplied
    #[default]
    None,
    /// Native `http` header collection
    Native(HeaderMap),
    /// Ordered key/value pairs
    Pairs(Vec<(String, String)>),
    /// Plain mapping
    Map(BTreeMap<String, String>),
}

impl HeaderInput {
    /// Whether no headers were supplied
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, HeaderInput::None)
    }

    /// Append a header, keeping the current representation where possible.
    ///
    /// Native collections and mappings are converted to ordered pairs first,
    /// so the appended header wins over any earlier spelling of its name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        match self {
            HeaderInput::None => *self = HeaderInput::Pairs(vec![(name, value)]),
            HeaderInput::Pairs(pairs) => pairs.push((name, value)),
            HeaderInput::Map(map) => {
                let mut pairs: Vec<(String, String)> = std::mem::take(map).into_iter().collect();
                pairs.push((name, value));
                *self = HeaderInput::Pairs(pairs);
            }
            HeaderInput::Native(native) => {
                let mut pairs: Vec<(String, String)> = native_entries(native).into_iter().collect();
                pairs.push((name, value));
                *self = HeaderInput::Pairs(pairs);
            }
        }
    }
}

impl From<HeaderMap> for HeaderInput {
    fn from(headers: HeaderMap) -> Self {
        HeaderInput::Native(headers)
    }
}

impl From<Vec<(String, String)>> for HeaderInput {
    fn from(pairs: Vec<(String, String)>) -> Self {
        HeaderInput::Pairs(pairs)
    }
}

impl From<Vec<(&str, &str)>> for HeaderInput {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        HeaderInput::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        )
    }
}

impl<const N: usize> From<[(&str, &str); N]> for HeaderInput {
    fn from(pairs: [(&str, &str); N]) -> Self {
        HeaderInput::from(pairs.to_vec())
    }
}

impl From<BTreeMap<String, String>> for HeaderInput {
    fn from(map: BTreeMap<String, String>) -> Self {
        HeaderInput::Map(map)
    }
}

impl<S: std::hash::BuildHasher> From<HashMap<String, String, S>> for HeaderInput {
    fn from(map: HashMap<String, String, S>) -> Self {
        HeaderInput::Map(map.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for HeaderInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Map(BTreeMap<String, String>),
            Pairs(Vec<(String, String)>),
        }

        Ok(match Option::<Repr>::deserialize(deserializer)? {
            None => HeaderInput::None,
            Some(Repr::Map(map)) => HeaderInput::Map(map),
            Some(Repr::Pairs(pairs)) => HeaderInput::Pairs(pairs),
        })
    }
}

/// Reduce any header representation to a lower-cased [`Headers`] mapping.
///
/// - native collections: repeated names are joined with `", "`, values that
///   are not visible ASCII/UTF-8 are skipped
/// - pairs: a later pair wins over an earlier pair with the same name
/// - mappings: keys are lower-cased, colliding keys keep the last one seen
#[must_use]
pub fn normalize_header_input(input: &HeaderInput) -> Headers {
    match input {
        HeaderInput::None => Headers::new(),
        HeaderInput::Native(native) => native_entries(native),
        HeaderInput::Pairs(pairs) => pairs
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect(),
        HeaderInput::Map(map) => map
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect(),
    }
}

/// Collect a native header map the way fetch `Headers` iteration does.
pub(crate) fn native_entries(headers: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| match v.to_str() {
                Ok(s) => Some(s),
                Err(_) => {
                    tracing::debug!(header = %name, "skipping non-UTF-8 header value");
                    None
                }
            })
            .collect();
        if !values.is_empty() {
            out.insert(name.as_str().to_owned(), values.join(", "));
        }
    }
    out
}

/// Case-insensitive lookup in a canonical mapping.
#[must_use]
pub fn has_header(headers: &Headers, name: &str) -> bool {
    headers.contains_key(&name.to_ascii_lowercase())
}
