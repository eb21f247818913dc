//! The settings tree
//!
//! [`Settings`] owns the merged root mapping and the ordered sources that
//! produced it, so it can be reloaded from scratch at any time.

use crate::env;
use crate::error::{Error, Result};
use crate::merge::merge_sources;
use crate::source::Source;
use crate::value::{merge_mappings, Mapping, Value};

/// A merged, queryable settings tree
///
/// Created empty, populated by [`Settings::load`] and optionally overlaid
/// with environment variables by [`Settings::load_env`]. Direct writes via
/// [`Settings::set`] or [`Settings::merge_value`] last until the next
/// [`Settings::reload`].
#[derive(Debug, Clone, Default)]
pub struct Settings {
    root: Mapping,
    sources: Vec<Source>,
    env_prefix: Option<String>,
    /// Variables passed to `load_env_from`; `None` reads the process environment
    env_vars: Option<Vec<(String, String)>>,
    loaded: bool,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create unloaded settings over an ordered list of sources
    pub fn with_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Source>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Append a source; it takes priority over every source added before it
    pub fn add_source(&mut self, source: impl Into<Source>) {
        self.sources.push(source.into());
    }

    /// Insert a source with the lowest priority
    pub fn prepend_source(&mut self, source: impl Into<Source>) {
        self.sources.insert(0, source.into());
    }

    /// The retained sources, lowest priority first
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Whether the last [`Settings::load`] succeeded
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The environment prefix re-applied on reload, if any
    pub fn env_prefix(&self) -> Option<&str> {
        self.env_prefix.as_deref()
    }

    /// Merge all sources into a fresh tree
    ///
    /// On failure the tree is left empty and not loaded.
    pub fn load(&mut self) -> Result<()> {
        self.root.clear();
        self.loaded = false;

        self.root = merge_sources(&self.sources)?;
        self.loaded = true;
        log::debug!(
            "Loaded settings from {} source(s), {} top-level key(s)",
            self.sources.len(),
            self.root.len()
        );
        Ok(())
    }

    /// Overlay process environment variables named `<prefix>__<KEY>...`
    ///
    /// The prefix is remembered; [`Settings::reload`] reads the process
    /// environment again.
    pub fn load_env(&mut self, prefix: &str) -> Result<()> {
        self.apply_env(prefix, process_env())?;
        self.env_vars = None;
        Ok(())
    }

    /// Overlay the given variables instead of the process environment
    ///
    /// The variables are kept, so [`Settings::reload`] re-applies this same
    /// set rather than the process environment.
    pub fn load_env_from<I>(&mut self, prefix: &str, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        self.apply_env(prefix, vars.iter().cloned())?;
        self.env_vars = Some(vars);
        Ok(())
    }

    /// Rebuild the tree from the retained sources
    ///
    /// Re-applies the environment overlay if one was loaded before. Direct
    /// mutations since the last load are discarded.
    pub fn reload(&mut self) -> Result<()> {
        self.load()?;
        let Some(prefix) = self.env_prefix.clone() else {
            return Ok(());
        };
        match self.env_vars.clone() {
            Some(vars) => self.apply_env(&prefix, vars),
            None => self.apply_env(&prefix, process_env()),
        }
    }

    fn apply_env<I>(&mut self, prefix: &str, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if !self.loaded {
            return Err(Error::not_loaded(
                "Environment overlay requires loaded settings",
            ));
        }
        let root = std::mem::take(&mut self.root);
        self.root = env::overlay_env(root, vars, prefix);
        self.env_prefix = Some(prefix.to_string());
        Ok(())
    }

    /// Look up a value by path (e.g., "database.host" or "servers[0].name")
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let (head, rest) = split_head(path);
        let first = self.root.get(head)?;
        first.get_path(rest).ok()
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// Check whether a path is present
    pub fn contains_key(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Top-level keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    /// The root mapping
    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    /// Write a value at `path`, creating intermediate mappings
    ///
    /// Bypasses the merge engine; the next reload discards it. An empty path
    /// is rejected, and a failed write leaves the tree unchanged.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let mut root = Value::Mapping(std::mem::take(&mut self.root));
        // set_path never replaces the root itself, so it stays a mapping
        let result = root.set_path(path, value.into());
        if let Value::Mapping(map) = root {
            self.root = map;
        }
        result.map_err(|e| e.with_path(path))
    }

    /// Deep-merge an ad hoc mapping over the current tree
    ///
    /// Uses the same rule as source merging; the next reload discards it.
    pub fn merge_value(&mut self, overlay: Mapping) {
        merge_mappings(&mut self.root, overlay);
    }

    /// Snapshot the tree as a single mapping value
    pub fn to_value(&self) -> Value {
        Value::Mapping(self.root.clone())
    }

    /// Export the tree as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root).map_err(|e| Error::internal(e.to_string()))
    }

    /// Export the tree as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.root).map_err(|e| Error::internal(e.to_string()))
    }
}

impl<S: Into<Source>> FromIterator<S> for Settings {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::with_sources(iter)
    }
}

/// Process variables as UTF-8 pairs; others can never match a prefix
fn process_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

/// Split the first key off a path: `"a.b[0]"` -> `("a", "b[0]")`, `"a[1]"` -> `("a", "[1]")`
fn split_head(path: &str) -> (&str, &str) {
    match path.find(['.', '[']) {
        Some(i) if path.as_bytes()[i] == b'.' => (&path[..i], &path[i + 1..]),
        Some(i) => (&path[..i], &path[i..]),
        None => (path, ""),
    }
}
