//! PUT/PATCH method emulation.
//!
//! With carrier `POST` the marker travels in the body; with carrier `GET` the
//! marker and every body field travel in the query string and the body is
//! dropped. Array elements are keyed by index. A JSON `null` body counts as
//! no body. The marker is written to exactly one location.

use crate::body::RequestBody;
use crate::config::{CarrierMethod, MethodEmulation};
use crate::params::set_query_param;
use http::Method;
use serde_json::{Map, Value};
use url::Url;

/// Method and body after emulation
#[derive(Debug)]
pub(crate) struct Emulated {
    pub method: Method,
    pub body: Option<RequestBody>,
}

/// Rewrite a PUT/PATCH request according to the emulation policy.
///
/// Other verbs, and all verbs when the policy is disabled, pass through
/// unchanged.
pub(crate) fn apply(
    policy: &MethodEmulation,
    method: Method,
    body: Option<RequestBody>,
    url: &mut Url,
) -> Emulated {
    if !policy.enabled || !(method == Method::PUT || method == Method::PATCH) {
        return Emulated { method, body };
    }

    let key = policy.key();
    let value = policy.value.as_deref().unwrap_or(method.as_str()).to_owned();

    let body = match policy.carrier {
        CarrierMethod::Post => inject_into_body(key, value, body, url),
        CarrierMethod::Get => {
            move_to_query(key, &value, body, url);
            None
        }
    };

    tracing::debug!(
        original = %method,
        carrier = %policy.carrier.method(),
        key,
        "emulating request method"
    );

    Emulated {
        method: policy.carrier.method(),
        body,
    }
}

fn inject_into_body(
    key: &str,
    value: String,
    body: Option<RequestBody>,
    url: &mut Url,
) -> Option<RequestBody> {
    match body {
        None | Some(RequestBody::Json(Value::Null)) => {
            let mut object = Map::new();
            object.insert(key.to_owned(), Value::String(value));
            Some(RequestBody::Json(Value::Object(object)))
        }
        Some(RequestBody::Json(Value::Object(mut object))) => {
            object.insert(key.to_owned(), Value::String(value));
            Some(RequestBody::Json(Value::Object(object)))
        }
        Some(RequestBody::Form(mut fields)) => {
            fields.retain(|(k, _)| k != key);
            fields.push((key.to_owned(), value));
            Some(RequestBody::Form(fields))
        }
        Some(RequestBody::Multipart(mut multipart)) => {
            multipart.push_text(key, value);
            Some(RequestBody::Multipart(multipart))
        }
        Some(other) => {
            // No field to merge into; the query string is the only place left.
            set_query_param(url, key, &value);
            Some(other)
        }
    }
}

fn move_to_query(key: &str, value: &str, body: Option<RequestBody>, url: &mut Url) {
    set_query_param(url, key, value);

    match body {
        None | Some(RequestBody::Json(Value::Null)) => {}
        Some(RequestBody::Json(Value::Object(object))) => {
            for (k, v) in &object {
                set_query_param(url, k, &query_value(v));
            }
        }
        Some(RequestBody::Json(Value::Array(items))) => {
            for (index, v) in items.iter().enumerate() {
                set_query_param(url, &index.to_string(), &query_value(v));
            }
        }
        Some(RequestBody::Form(fields)) => {
            for (k, v) in &fields {
                set_query_param(url, k, v);
            }
        }
        Some(other) => {
            tracing::warn!(
                body = ?other,
                "request body has no fields to move into the query string; dropping it"
            );
        }
    }
}

/// Strings are used raw; everything else as compact JSON text.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::body::Multipart;
    use serde_json::json;

    fn url() -> Url {
        Url::parse("https://example.com/items/1").unwrap()
    }

    fn policy(carrier: CarrierMethod) -> MethodEmulation {
        MethodEmulation {
            carrier,
            ..MethodEmulation::enabled()
        }
    }

    fn query(url: &Url) -> Vec<(String, String)> {
        url.query_pairs().into_owned().collect()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_owned(), v.to_owned())
    }

    #[test]
    fn test_disabled_policy_passes_through() {
        let mut url = url();
        let out = apply(
            &MethodEmulation::default(),
            Method::PUT,
            Some(RequestBody::Json(json!({"a": 1}))),
            &mut url,
        );
        assert_eq!(out.method, Method::PUT);
        assert!(matches!(out.body, Some(RequestBody::Json(ref v)) if v == &json!({"a": 1})));
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_other_verbs_pass_through() {
        for method in [Method::GET, Method::POST, Method::DELETE] {
            let mut url = url();
            let out = apply(&policy(CarrierMethod::Post), method.clone(), None, &mut url);
            assert_eq!(out.method, method);
            assert!(out.body.is_none());
            assert_eq!(url.query(), None);
        }
    }

    #[test]
    fn test_post_carrier_merges_marker_into_object_body() {
        let mut url = url();
        let out = apply(
            &policy(CarrierMethod::Post),
            Method::PUT,
            Some(RequestBody::Json(json!({"key": "new-value"}))),
            &mut url,
        );

        assert_eq!(out.method, Method::POST);
        assert!(matches!(
            out.body,
            Some(RequestBody::Json(ref v)) if v == &json!({"key": "new-value", "_method": "PUT"})
        ));
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_post_carrier_marker_becomes_body_when_absent() {
        let mut url = url();
        let out = apply(&policy(CarrierMethod::Post), Method::PATCH, None, &mut url);

        assert_eq!(out.method, Method::POST);
        assert!(matches!(
            out.body,
            Some(RequestBody::Json(ref v)) if v == &json!({"_method": "PATCH"})
        ));
    }

    #[test]
    fn test_custom_key_and_value() {
        let policy = MethodEmulation {
            key: Some("X-HTTP-Method".to_owned()),
            value: Some("put".to_owned()),
            ..MethodEmulation::enabled()
        };
        let mut url = url();
        let out = apply(&policy, Method::PUT, None, &mut url);
        assert!(matches!(
            out.body,
            Some(RequestBody::Json(ref v)) if v == &json!({"X-HTTP-Method": "put"})
        ));
    }

    #[test]
    fn test_post_carrier_appends_to_form_and_multipart() {
        let mut url = url();
        let out = apply(
            &policy(CarrierMethod::Post),
            Method::PUT,
            Some(RequestBody::form([("name", "x"), ("_method", "stale")])),
            &mut url,
        );
        match out.body {
            Some(RequestBody::Form(fields)) => {
                assert_eq!(fields, vec![pair("name", "x"), pair("_method", "PUT")]);
            }
            other => panic!("expected form body, got {other:?}"),
        }

        let out = apply(
            &policy(CarrierMethod::Post),
            Method::PATCH,
            Some(RequestBody::from(Multipart::new().text("a", "1"))),
            &mut url,
        );
        match out.body {
            Some(RequestBody::Multipart(multipart)) => {
                assert_eq!(multipart.field_names().collect::<Vec<_>>(), vec!["a", "_method"]);
            }
            other => panic!("expected multipart body, got {other:?}"),
        }
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_post_carrier_text_body_uses_query_string() {
        let mut url = url();
        let out = apply(
            &policy(CarrierMethod::Post),
            Method::PUT,
            Some(RequestBody::from("raw text")),
            &mut url,
        );
        assert_eq!(out.method, Method::POST);
        assert!(matches!(out.body, Some(RequestBody::Text(ref t)) if t == "raw text"));
        assert_eq!(query(&url), vec![pair("_method", "PUT")]);
    }

    #[test]
    fn test_get_carrier_moves_marker_and_fields_to_query() {
        let mut url = url();
        let out = apply(
            &policy(CarrierMethod::Get),
            Method::PUT,
            Some(RequestBody::Json(json!({"name": "widget", "count": 3}))),
            &mut url,
        );

        assert_eq!(out.method, Method::GET);
        assert!(out.body.is_none());
        let pairs = query(&url);
        assert_eq!(pairs[0], pair("_method", "PUT"));
        assert!(pairs.contains(&pair("name", "widget")));
        assert!(pairs.contains(&pair("count", "3")));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_get_carrier_without_body() {
        let mut url = url();
        let out = apply(&policy(CarrierMethod::Get), Method::PATCH, None, &mut url);
        assert_eq!(out.method, Method::GET);
        assert!(out.body.is_none());
        assert_eq!(query(&url), vec![pair("_method", "PATCH")]);
    }

    #[test]
    fn test_get_carrier_nested_values_use_compact_json() {
        let mut url = url();
        apply(
            &policy(CarrierMethod::Get),
            Method::PUT,
            Some(RequestBody::Json(json!({
                "tags": ["a", "b"],
                "meta": {"x": 1},
                "none": null,
                "flag": false
            }))),
            &mut url,
        );

        let pairs = query(&url);
        assert!(pairs.contains(&pair("tags", r#"["a","b"]"#)));
        assert!(pairs.contains(&pair("meta", r#"{"x":1}"#)));
        assert!(pairs.contains(&pair("none", "null")));
        assert!(pairs.contains(&pair("flag", "false")));
    }

    #[test]
    fn test_get_carrier_flattens_form_and_drops_opaque_bodies() {
        let mut url = url();
        let out = apply(
            &policy(CarrierMethod::Get),
            Method::PUT,
            Some(RequestBody::form([("a", "1")])),
            &mut url,
        );
        assert!(out.body.is_none());
        assert_eq!(query(&url), vec![pair("_method", "PUT"), pair("a", "1")]);

        let mut url = self::url();
        let out = apply(
            &policy(CarrierMethod::Get),
            Method::PUT,
            Some(RequestBody::from("opaque")),
            &mut url,
        );
        assert!(out.body.is_none());
        assert_eq!(query(&url), vec![pair("_method", "PUT")]);
    }

    #[test]
    fn test_null_body_is_treated_as_absent() {
        let mut url = url();
        let out = apply(
            &policy(CarrierMethod::Post),
            Method::PUT,
            Some(RequestBody::Json(Value::Null)),
            &mut url,
        );
        assert_eq!(out.method, Method::POST);
        assert!(matches!(
            out.body,
            Some(RequestBody::Json(ref v)) if v == &json!({"_method": "PUT"})
        ));
        assert_eq!(url.query(), None);

        let mut url = self::url();
        let out = apply(
            &policy(CarrierMethod::Get),
            Method::PATCH,
            Some(RequestBody::Json(Value::Null)),
            &mut url,
        );
        assert_eq!(out.method, Method::GET);
        assert!(out.body.is_none());
        assert_eq!(query(&url), vec![pair("_method", "PATCH")]);
    }

    #[test]
    fn test_get_carrier_keys_array_elements_by_index() {
        let mut url = url();
        let out = apply(
            &policy(CarrierMethod::Get),
            Method::PUT,
            Some(RequestBody::Json(json!(["a", {"b": 1}]))),
            &mut url,
        );
        assert!(out.body.is_none());
        assert_eq!(
            query(&url),
            vec![pair("_method", "PUT"), pair("0", "a"), pair("1", r#"{"b":1}"#)]
        );
    }

    #[test]
    fn test_marker_written_to_exactly_one_location() {
        let mut url = url();
        let out = apply(
            &policy(CarrierMethod::Post),
            Method::PUT,
            Some(RequestBody::Json(json!({"a": 1}))),
            &mut url,
        );
        assert!(url.query().is_none());
        assert!(matches!(out.body, Some(RequestBody::Json(ref v)) if v.get("_method").is_some()));

        let mut url = self::url();
        let out = apply(
            &policy(CarrierMethod::Get),
            Method::PUT,
            Some(RequestBody::Json(json!({"a": 1}))),
            &mut url,
        );
        assert!(out.body.is_none());
        assert!(query(&url).iter().any(|(k, _)| k == "_method"));
    }
}
