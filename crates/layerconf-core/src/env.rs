//! Environment variable overlay
//!
//! Variables named `<PREFIX>__<SEGMENT>(__<SEGMENT>)*` become nested keys,
//! lower-cased, with their values typed by [`Value::infer_scalar`]. The
//! resulting overlay is deep-merged over the file-derived tree, so the
//! environment always wins.
//!
//! ```text
//! SETTINGS__DB__HOST=db.internal  ->  db: { host: db.internal }
//! SETTINGS__DB__PORT=5433         ->  db: { port: 5433 }
//! ```

use crate::value::{merge_mappings, Mapping, Value};

/// Separator between the prefix and each key segment
pub const ENV_SEPARATOR: &str = "__";

/// Default prefix, the upper-cased default settings name
pub const DEFAULT_ENV_PREFIX: &str = "SETTINGS";

/// Build the overlay mapping for `prefix` from `vars`
///
/// Variables are applied in name order so a conflicting pair such as
/// `P__A=1` and `P__A__B=2` always resolves the same way (the later name
/// wins). Names with an empty segment are ignored.
pub fn env_overlay<I>(vars: I, prefix: &str) -> Mapping
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut matched: Vec<(Vec<String>, String)> = vars
        .into_iter()
        .filter_map(|(name, value)| {
            let segments = key_segments(&name, prefix)?;
            log::trace!("Applying environment override {}", name);
            Some((segments, value))
        })
        .collect();
    matched.sort_by(|a, b| a.0.cmp(&b.0));

    let mut overlay = Mapping::new();
    for (segments, raw) in matched {
        let nested = segments
            .into_iter()
            .rev()
            .fold(Value::infer_scalar(&raw), |inner, segment| {
                let mut map = Mapping::new();
                map.insert(segment, inner);
                Value::Mapping(map)
            });
        if let Some(map) = nested.into_mapping() {
            merge_mappings(&mut overlay, map);
        }
    }
    overlay
}

/// Deep-merge the environment overlay for `prefix` on top of `root`
pub fn overlay_env<I>(mut root: Mapping, vars: I, prefix: &str) -> Mapping
where
    I: IntoIterator<Item = (String, String)>,
{
    let overlay = env_overlay(vars, prefix);
    merge_mappings(&mut root, overlay);
    root
}

/// Split `name` into lower-cased key segments if it carries `prefix`
fn key_segments(name: &str, prefix: &str) -> Option<Vec<String>> {
    let head = name.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = name[prefix.len()..].strip_prefix(ENV_SEPARATOR)?;

    let segments: Vec<String> = rest
        .split(ENV_SEPARATOR)
        .map(|s| s.to_lowercase())
        .collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(segments)
}
