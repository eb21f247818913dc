//! On-disk layouts that produce ordered source lists
//!
//! Two conventions are supported:
//!
//! - **Flat** ([`setting_files`]): a config root with base settings,
//!   per-environment settings and `.local` overrides.
//! - **Nested** ([`nested_sources`]): a directory tree where every
//!   subdirectory is a namespace with its own default and priority files,
//!   inheriting from its ancestors.
//!
//! In both cases earlier entries have lower priority.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::MatchOptions;

use crate::error::{Error, Result};
use crate::source::Source;

/// The six candidate files for `env` under `config_root`, lowest priority first
///
/// ```text
/// settings.yml
/// settings/{env}.yml
/// environments/{env}.yml
/// settings.local.yml
/// settings/{env}.local.yml
/// environments/{env}.local.yml
/// ```
pub fn setting_files(config_root: impl AsRef<Path>, env: &str) -> [PathBuf; 6] {
    let root = config_root.as_ref();
    [
        root.join("settings.yml"),
        root.join("settings").join(format!("{}.yml", env)),
        root.join("environments").join(format!("{}.yml", env)),
        root.join("settings.local.yml"),
        root.join("settings").join(format!("{}.local.yml", env)),
        root.join("environments").join(format!("{}.local.yml", env)),
    ]
}

/// Build the namespaced source list for a nested settings tree
///
/// The root pair (`default_name`, then `priority_name`) comes first. Every
/// directory below `base_path` contributes one namespace per ancestor prefix
/// (`a`, `a/b`, ...), each with its own default-then-priority pair.
/// Namespaces are emitted once each, ordered by depth and then name, so an
/// ancestor is always merged before any of its descendants.
pub fn nested_sources(
    base_path: impl AsRef<Path>,
    default_name: &str,
    priority_name: &str,
) -> Result<Vec<Source>> {
    let base = base_path.as_ref();

    let mut sources = vec![
        Source::new(base.join(default_name)),
        Source::new(base.join(priority_name)),
    ];

    for namespace in namespaces(base)? {
        let mut dir = base.to_path_buf();
        dir.extend(namespace.segments.iter());
        let ns = namespace.segments.join("/");
        sources.push(Source::namespaced(dir.join(default_name), ns.clone()));
        sources.push(Source::namespaced(dir.join(priority_name), ns));
    }

    Ok(sources)
}

/// A namespace path; orders by depth first, then segment-wise by name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Namespace {
    depth: usize,
    segments: Vec<String>,
}

impl Namespace {
    fn new(segments: &[String]) -> Self {
        Self {
            depth: segments.len(),
            segments: segments.to_vec(),
        }
    }
}

/// Every namespace prefix of every directory under `base`, sorted
fn namespaces(base: &Path) -> Result<BTreeSet<Namespace>> {
    let mut found = BTreeSet::new();

    for dir in subdirectories(base)? {
        let Ok(relative) = dir.strip_prefix(base) else {
            continue;
        };
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if segments.iter().any(|s| s.starts_with('.')) {
            continue;
        }

        for i in 1..=segments.len() {
            found.insert(Namespace::new(&segments[..i]));
        }
    }

    Ok(found)
}

/// All directories below `base` (recursive), skipping hidden ones
fn subdirectories(base: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/**/*",
        glob::Pattern::escape(&base.to_string_lossy())
    );
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let entries = glob::glob_with(&pattern, options)
        .map_err(|e| Error::internal(format!("Invalid directory pattern '{}': {}", pattern, e)))?;

    let mut dirs = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_dir() => dirs.push(path),
            Ok(_) => {}
            Err(e) => {
                log::warn!("Skipping unreadable settings directory: {}", e);
            }
        }
    }
    Ok(dirs)
}
