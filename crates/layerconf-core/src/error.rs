//! Error types for layerconf
//!
//! Errors are structured: a kind, the settings path or file involved,
//! the underlying cause and an actionable help message.

use std::fmt;
use std::path::Path;

/// Result type alias for layerconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for layerconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Path in the settings tree where the error occurred (e.g., "database.port")
    pub path: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl SourceLocation {
    /// A location naming only the file
    pub fn file(path: &Path) -> Self {
        Self {
            file: path.display().to_string(),
            line: None,
            column: None,
        }
    }
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A source document could not be read or parsed
    Parse,
    /// Error accessing a path that doesn't exist
    PathNotFound,
    /// The settings tree has not been loaded yet
    NotLoaded,
    /// A settings name is already bound in a registry
    BindingConflict { name: String },
    /// Internal error (bug in layerconf)
    Internal,
}

impl Error {
    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            path: None,
            source_location: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a parse error for a source file, keeping the parser's line and column
    pub fn source_parse(file: &Path, err: &serde_yaml::Error) -> Self {
        let location = match err.location() {
            Some(loc) => SourceLocation {
                file: file.display().to_string(),
                line: Some(loc.line()),
                column: Some(loc.column()),
            },
            None => SourceLocation::file(file),
        };
        Self::parse(err.to_string())
            .with_source_location(location)
            .with_help("Fix the YAML syntax in this file or remove it")
    }

    /// Create a read error for a source file that exists but could not be read
    pub fn source_read(file: &Path, err: &std::io::Error) -> Self {
        Self::parse(format!("Failed to read file '{}': {}", file.display(), err))
            .with_source_location(SourceLocation::file(file))
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            kind: ErrorKind::PathNotFound,
            path: Some(path_str.clone()),
            source_location: None,
            help: Some(format!(
                "Check that '{}' exists in the settings",
                path_str
            )),
            cause: None,
        }
    }

    /// Create a not loaded error
    pub fn not_loaded(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotLoaded,
            path: None,
            source_location: None,
            help: Some("Call load() successfully before this operation".into()),
            cause: Some(message.into()),
        }
    }

    /// Create a binding conflict error
    pub fn binding_conflict(name: impl Into<String>) -> Self {
        let n = name.into();
        Self {
            kind: ErrorKind::BindingConflict { name: n.clone() },
            path: None,
            source_location: None,
            help: Some(format!(
                "Unbind '{}' first or use bind() to replace it",
                n
            )),
            cause: None,
        }
    }

    /// Create an internal error (bug in layerconf)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            path: None,
            source_location: None,
            help: Some("This is likely a bug in layerconf. Please report it.".into()),
            cause: Some(message.into()),
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::PathNotFound => write!(f, "Path not found")?,
            ErrorKind::NotLoaded => write!(f, "Settings not loaded")?,
            ErrorKind::BindingConflict { name } => {
                write!(f, "Settings '{}' are already bound", name)?
            }
            ErrorKind::Internal => write!(f, "Internal error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
