//! The `utils` module contains helper functions used by multiple data types and layers, where a
//! stand-alone function avoids duplicating logic across call sites.
use crate::error::MatchResult;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Produces the canonical form of `input`: uppercased, punctuation stripped, whitespace
/// collapsed. Used for L1's exact-canonical-equality phases and for the `OriginalAddress`
/// dedup key.
pub fn canonicalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for ch in input.to_uppercase().chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_was_space = false;
        } else if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
                last_was_space = true;
            }
        }
        // all other punctuation is dropped entirely
    }
    out.trim_end().to_string()
}

/// Generic CSV serialization, used by the pipeline driver to snapshot the fact/correction
/// tables for forensic comparison between pipeline runs.
pub fn to_csv<T: Serialize, P: AsRef<Path>>(items: &[T], path: P) -> MatchResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for item in items {
        wtr.serialize(item)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Generic CSV deserialization, used by the in-memory store adapters' test fixtures.
pub fn from_csv<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> MatchResult<Vec<T>> {
    let mut records = Vec::new();
    let file = std::fs::File::open(path)?;
    let mut rdr = csv::Reader::from_reader(file);
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Installs a `tracing-subscriber` fmt layer honoring `RUST_LOG`, falling back to `info` level.
/// Safe to call more than once; later calls are no-ops.
pub fn trace_init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
