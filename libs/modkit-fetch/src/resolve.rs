use url::Url;

/// Resolve a possibly-relative request URL against an optional base URL.
///
/// - an absolute `target` is returned unchanged
/// - without a (non-empty) `base`, `target` is returned unchanged so the
///   caller surfaces the missing/invalid URL instead of guessing
/// - otherwise `base` gets a trailing `/` if it has none, one leading `/` is
///   stripped from `target`, and the two are concatenated
#[must_use]
pub fn resolve_url(target: &str, base: Option<&str>) -> String {
    if Url::parse(target).is_ok() {
        return target.to_owned();
    }

    let Some(base) = base.filter(|b| !b.is_empty()) else {
        return target.to_owned();
    };

    let mut joined = String::with_capacity(base.len() + target.len() + 1);
    joined.push_str(base);
    if !base.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(target.strip_prefix('/').unwrap_or(target));
    joined
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const BASE: &str = "https://api.example.com/v1";

    #[test]
    fn test_absolute_target_is_unchanged() {
        assert_eq!(
            resolve_url("https://other.example.com/x", Some(BASE)),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_relative_without_base_is_unchanged() {
        assert_eq!(resolve_url("/users", None), "/users");
        assert_eq!(resolve_url("/users", Some("")), "/users");
        assert_eq!(resolve_url("", None), "");
    }

    #[test]
    fn test_single_separator_at_join_point() {
        let expected = "https://api.example.com/v1/users";
        assert_eq!(resolve_url("users", Some(BASE)), expected);
        assert_eq!(resolve_url("/users", Some(BASE)), expected);
        assert_eq!(resolve_url("users", Some("https://api.example.com/v1/")), expected);
        assert_eq!(resolve_url("/users", Some("https://api.example.com/v1/")), expected);
    }

    #[test]
    fn test_empty_target_with_base() {
        assert_eq!(resolve_url("", Some(BASE)), "https://api.example.com/v1/");
    }

    #[test]
    fn test_idempotent_for_absolute_base() {
        for target in ["users", "/users?x=1", "https://example.com/a", ""] {
            let once = resolve_url(target, Some(BASE));
            let twice = resolve_url(&once, Some(BASE));
            assert_eq!(once, twice, "target {target:?}");
        }
    }
}
