//! Trackable resource (TRES) descriptor parsing.
//!
//! Slurm reports requested and allocated resources as strings like
//! `cpu=4,mem=16G,node=1,billing=4,gres/gpu=1`.

use std::collections::BTreeMap;

/// Resource name (lowercased) to value.
pub type ResourceMap = BTreeMap<String, String>;

/// Parse a comma-separated `key=value` descriptor.
///
/// Keys are lowercased so lookups are case-insensitive. Entries without a
/// `=` or with an empty key are skipped.
pub fn parse_tres(s: &str) -> ResourceMap {
    s.split(',')
        .filter_map(|entry| entry.split_once('='))
        .filter_map(|(key, value)| {
            let key = key.trim();
            if key.is_empty() {
                None
            } else {
                Some((key.to_ascii_lowercase(), value.trim().to_string()))
            }
        })
        .collect()
}

/// Look up a resource by name, ignoring case.
pub fn lookup<'a>(resources: &'a ResourceMap, key: &str) -> Option<&'a str> {
    resources
        .get(&key.to_ascii_lowercase())
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// GPU count: `gres/gpu` first, then any key mentioning "gpu".
pub fn lookup_gpu(resources: &ResourceMap) -> Option<&str> {
    lookup(resources, "gres/gpu").or_else(|| {
        resources
            .iter()
            .find(|(key, value)| key.contains("gpu") && !value.is_empty())
            .map(|(_, value)| value.as_str())
    })
}
