//! Hierarchical listing over a flat mapping.
//!
//! An entry is under `prefix` only when the character right after the prefix
//! is the separator: `/foo/bar` is under `/foo`, `/foobar` is not, and `/foo`
//! itself is not listed. Matching keys are returned relative to the prefix.
//! The root prefix `/` lists every entry with its key unchanged.

use crkv_types::{DataMap, Key, KeyValue, SEPARATOR};

/// List the entries of `data` under `prefix`.
///
/// Output is sorted by key. Callers must not rely on the order.
pub fn list_under(data: &DataMap, prefix: &Key) -> Vec<KeyValue> {
    if prefix.is_root() {
        return data
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect();
    }

    let prefix = prefix.as_str();
    data.iter()
        .filter_map(|(k, v)| {
            strip_parent(k, prefix).map(|rest| KeyValue::new(rest, v.clone()))
        })
        .collect()
}

/// The part of `key` after `prefix` and its separator, if `key` lies strictly
/// under `prefix`.
fn strip_parent<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    if key.len() <= prefix.len() + 1 {
        return None;
    }
    let rest = key.strip_prefix(prefix)?;
    rest.strip_prefix(SEPARATOR)
}
