//! Settings sources
//!
//! A [`Source`] names one candidate YAML document and, optionally, the
//! namespace its content is merged under. Sources whose file does not exist
//! resolve to an empty mapping; that is the normal case for optional
//! override files such as `settings.local.yml`.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, SourceLocation};
use crate::value::{Mapping, Value};

/// One candidate settings document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    path: PathBuf,
    namespace: Option<String>,
}

impl Source {
    /// A source merged at the root of the settings tree
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            namespace: None,
        }
    }

    /// A source merged under a slash-delimited namespace (e.g. `"api/v1"`)
    pub fn namespaced(path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: Some(namespace.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Read and parse this source
    ///
    /// Returns an empty mapping when the file does not exist. A file that
    /// exists but cannot be read, is not valid YAML, or whose top level is not
    /// a mapping is a parse error carrying the file path.
    pub fn resolve(&self) -> Result<Mapping> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("Skipping missing settings source {}", self.path.display());
                return Ok(Mapping::new());
            }
            Err(e) => return Err(Error::source_read(&self.path, &e)),
        };

        parse_document(&content, &self.path)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(ns) = &self.namespace {
            write!(f, " (namespace {})", ns)?;
        }
        Ok(())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::new(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::new(path)
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::new(path)
    }
}

/// Parse a YAML document whose top level must be a mapping (or empty)
///
/// `<<` merge keys are expanded and scalar keys such as `404` are
/// stringified before the document joins the settings tree.
fn parse_document(content: &str, file: &Path) -> Result<Mapping> {
    let mut raw: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| Error::source_parse(file, &e))?;
    raw.apply_merge()
        .map_err(|e| Error::source_parse(file, &e))?;
    let value = Value::try_from(raw)
        .map_err(|e| e.with_source_location(SourceLocation::file(file)))?;

    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        other => Err(Error::parse(format!(
            "Top level of a settings document must be a mapping, got {}",
            other.type_name()
        ))
        .with_source_location(SourceLocation::file(file))),
    }
}
