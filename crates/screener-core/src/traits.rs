use serde_json::{Map, Value};

/// Marker trait satisfied by each of the four scoring axes. Analyzers are
/// pure functions over already-fetched data — no I/O happens inside
/// `analyze`, so unlike the fetch-layer traits this one is not `async`.
pub trait Analyzer: Send + Sync {
    /// Flat mapping of named sub-scores plus a single `*_score` entry, all
    /// in `[0, 1]`.
    fn name(&self) -> &'static str;
}

/// Helper used by every analyzer to build its result bag consistently.
pub fn score_bag(pairs: impl IntoIterator<Item = (&'static str, f64)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), serde_json::json!(v));
    }
    map
}
