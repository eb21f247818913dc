//! The settings value tree
//!
//! Source documents, environment overlays and ad hoc writes all end up as a
//! [`Value`]. Mapping keys are always strings: YAML scalar keys such as
//! `404:` or `true:` are stringified when a document is converted, and
//! `<<` merge keys are expanded first.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mapping type used for every settings tree
pub type Mapping = IndexMap<String, Value>;

/// A settings value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, or integers widened to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_mapping(self) -> Option<Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Look up `path` (`db.host`, `servers[1].name`); an empty path is `self`
    pub fn get_path(&self, path: &str) -> Result<&Value> {
        parse_path(path)?.iter().try_fold(self, |current, step| {
            current.child(step).ok_or_else(|| Error::path_not_found(path))
        })
    }

    /// Write `value` at `path`, creating missing mappings (or an empty
    /// sequence before an index step) on the way
    ///
    /// The write is all-or-nothing: when it fails, no intermediate node has
    /// been added. An empty path names no key and is rejected.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<()> {
        let steps = parse_path(path)?;
        if steps.is_empty() {
            return Err(Error::path_not_found(path)
                .with_help("Name at least one key; the settings root cannot be replaced"));
        }
        if assign(self, &steps, value) {
            Ok(())
        } else {
            Err(Error::path_not_found(path))
        }
    }

    /// Type an environment override from its raw text
    ///
    /// Case-insensitive keywords `null`/`~`, `true`/`false`; then `i64`;
    /// then `f64` (only when the text contains a digit, so `inf` and `nan`
    /// stay strings); everything else, including `""`, is a string.
    pub fn infer_scalar(raw: &str) -> Value {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "null" | "~" => return Value::Null,
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Integer(i);
        }
        if trimmed.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = trimmed.parse::<f64>() {
                return Value::Float(f);
            }
        }
        Value::String(raw.to_string())
    }

    /// Layer `other` on top of `self`
    ///
    /// Two mappings merge key by key; in every other case (scalars,
    /// sequences, null, mismatched types) `other` replaces `self`.
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Mapping(base), Value::Mapping(overlay)) => merge_mappings(base, overlay),
            (this, other) => *this = other,
        }
    }

    /// Wrap this value under a slash-delimited namespace
    ///
    /// `"a/b"` turns `v` into `{a: {b: v}}`. Empty segments are skipped, so
    /// an empty namespace returns the value unchanged.
    pub fn nest_under(self, namespace: &str) -> Value {
        namespace
            .split('/')
            .filter(|segment| !segment.is_empty())
            .rev()
            .fold(self, |inner, segment| {
                let mut map = Mapping::new();
                map.insert(segment.to_string(), inner);
                Value::Mapping(map)
            })
    }

    fn child(&self, step: &Step) -> Option<&Value> {
        match (self, step) {
            (Value::Mapping(map), Step::Key(key)) => map.get(key),
            (Value::Sequence(seq), Step::Index(i)) => seq.get(*i),
            _ => None,
        }
    }
}

/// Deep-merge `overlay` into `base`; keys present in both go through [`Value::merge`]
pub fn merge_mappings(base: &mut Mapping, overlay: Mapping) {
    for (key, incoming) in overlay {
        match base.get_mut(&key) {
            Some(existing) => existing.merge(incoming),
            None => {
                base.insert(key, incoming);
            }
        }
    }
}

/// Converts a parsed YAML document
///
/// Call [`serde_yaml::Value::apply_merge`] beforehand if `<<` keys should be
/// expanded. Tags are dropped, scalar keys are stringified, and integers
/// beyond `i64` become floats. Sequence or mapping keys are rejected.
impl TryFrom<serde_yaml::Value> for Value {
    type Error = Error;

    fn try_from(raw: serde_yaml::Value) -> Result<Self> {
        use serde_yaml::Value as Yaml;

        Ok(match raw {
            Yaml::Null => Value::Null,
            Yaml::Bool(b) => Value::Bool(b),
            Yaml::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Yaml::String(s) => Value::String(s),
            Yaml::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_>>()?,
            ),
            Yaml::Mapping(entries) => {
                let mut map = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key_string(key)?, Value::try_from(value)?);
                }
                Value::Mapping(map)
            }
            Yaml::Tagged(tagged) => Value::try_from(tagged.value)?,
        })
    }
}

fn key_string(key: serde_yaml::Value) -> Result<String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        Yaml::Tagged(tagged) => key_string(tagged.value),
        Yaml::Sequence(_) | Yaml::Mapping(_) => Err(Error::parse(
            "Mapping keys must be scalars, found a sequence or mapping key",
        )),
    }
}

/// Deserializes through [`serde_yaml::Value`] so merge keys and non-string
/// scalar keys behave the same as in settings files
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut raw = serde_yaml::Value::deserialize(deserializer)?;
        raw.apply_merge().map_err(de::Error::custom)?;
        Value::try_from(raw).map_err(de::Error::custom)
    }
}

/// Scalars print bare; sequences and mappings print as compact JSON
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::Sequence(_) | Value::Mapping(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

/// One step of a lookup path: `servers[0].name` is `servers`, `0`, `name`
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    Index(usize),
}

/// Split a dotted path with optional `[n]` suffixes; empty keys are skipped
fn parse_path(path: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    for part in path.split('.') {
        let (key, mut rest) = part.split_at(part.find('[').unwrap_or(part.len()));
        if key.contains(']') {
            return Err(Error::parse(format!("Unexpected ']' in path '{}'", path)));
        }
        if !key.is_empty() {
            steps.push(Step::Key(key.to_string()));
        }

        while let Some(inner) = rest.strip_prefix('[') {
            let close = inner
                .find(']')
                .ok_or_else(|| Error::parse(format!("Unclosed '[' in path '{}'", path)))?;
            let index = inner[..close].parse().map_err(|_| {
                Error::parse(format!(
                    "Invalid sequence index '{}' in path '{}'",
                    &inner[..close],
                    path
                ))
            })?;
            steps.push(Step::Index(index));
            rest = &inner[close + 1..];
        }
        if !rest.is_empty() {
            return Err(Error::parse(format!(
                "Unexpected '{}' in path '{}'",
                rest, path
            )));
        }
    }

    Ok(steps)
}

/// Write below `target`; a missing branch is built detached and only
/// attached once the write into it succeeded
fn assign(target: &mut Value, steps: &[Step], value: Value) -> bool {
    let Some((step, rest)) = steps.split_first() else {
        *target = value;
        return true;
    };

    match (target, step) {
        (Value::Mapping(map), Step::Key(key)) => {
            if let Some(child) = map.get_mut(key) {
                return assign(child, rest, value);
            }
            let mut branch = match rest.first() {
                Some(Step::Index(_)) => Value::Sequence(Vec::new()),
                _ => Value::Mapping(Mapping::new()),
            };
            if !assign(&mut branch, rest, value) {
                return false;
            }
            map.insert(key.clone(), branch);
            true
        }
        (Value::Sequence(seq), Step::Index(i)) => match seq.get_mut(*i) {
            Some(child) => assign(child, rest, value),
            None => false,
        },
        _ => false,
    }
}
