use std::collections::BTreeMap;

/// Shallow-merge configuration layers left to right.
///
/// Keys from every layer survive; when two layers define the same key the
/// later layer wins. Used for both header and query parameter merging with
/// the order "instance defaults, then call-site overrides".
///
/// # Example
///
/// ```ignore
/// let merged = merge_config([&instance_params, &call_params]);
/// ```
#[must_use]
pub fn merge_config<'a, K, V, I>(layers: I) -> BTreeMap<K, V>
where
    I: IntoIterator<Item = &'a BTreeMap<K, V>>,
    K: Ord + Clone + 'a,
    V: Clone + 'a,
{
    let mut merged = BTreeMap::new();
    for layer in layers {
        merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}
