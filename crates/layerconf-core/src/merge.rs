//! Ordered deep merge of settings sources
//!
//! Sources are merged strictly in the order given; a later source wins for
//! every key path it defines. Mappings merge recursively, everything else
//! (scalars, sequences, nulls) is replaced wholesale.

use crate::error::Result;
use crate::source::Source;
use crate::value::{merge_mappings, Mapping, Value};

/// Resolve and deep-merge `sources` into a single root mapping
///
/// The first source that fails to parse aborts the merge; no partially
/// merged tree is returned.
pub fn merge_sources(sources: &[Source]) -> Result<Mapping> {
    let mut root = Mapping::new();

    for source in sources {
        let content = source.resolve()?;
        if content.is_empty() {
            continue;
        }
        log::debug!("Merging settings source {}", source);

        let incoming = match source.namespace() {
            Some(ns) => Value::Mapping(content)
                .nest_under(ns)
                .into_mapping()
                .unwrap_or_default(),
            None => content,
        };

        merge_mappings(&mut root, incoming);
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn yaml(s: &str) -> Mapping {
        serde_yaml::from_str::<Value>(s)
            .unwrap()
            .into_mapping()
            .unwrap()
    }

    #[test]
    fn test_later_source_wins() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.yml", "name: first\nport: 1\n");
        let b = write(dir.path(), "b.yml", "name: second\n");

        let merged = merge_sources(&[Source::new(a), Source::new(b)]).unwrap();

        assert_eq!(merged, yaml("name: second\nport: 1\n"));
    }

    #[test]
    fn test_mappings_deep_merge() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.yml", "a:\n  x: 1\n  y: 2\n");
        let b = write(dir.path(), "b.yml", "a:\n  y: 3\n");

        let merged = merge_sources(&[Source::new(a), Source::new(b)]).unwrap();

        assert_eq!(merged, yaml("a:\n  x: 1\n  y: 3\n"));
    }

    #[test]
    fn test_sequences_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.yml", "a: [1, 2, 3]\n");
        let b = write(dir.path(), "b.yml", "a: [4]\n");

        let merged = merge_sources(&[Source::new(a), Source::new(b)]).unwrap();

        assert_eq!(merged, yaml("a: [4]\n"));
    }

    #[test]
    fn test_missing_source_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.yml", "a:\n  x: 1\n");
        let missing = dir.path().join("nope.yml");

        let with_missing =
            merge_sources(&[Source::new(&a), Source::new(&missing)]).unwrap();
        let without = merge_sources(&[Source::new(&a)]).unwrap();

        assert_eq!(with_missing, without);
    }

    #[test]
    fn test_namespace_nests_content() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "default.yml", "timeout: 1\n");
        let api = write(dir.path(), "api/v1/default.yml", "timeout: 5\n");

        let merged = merge_sources(&[
            Source::new(root),
            Source::namespaced(api, "api/v1"),
        ])
        .unwrap();

        assert_eq!(merged, yaml("timeout: 1\napi:\n  v1:\n    timeout: 5\n"));
    }

    #[test]
    fn test_namespace_merges_over_root_defined_section() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(dir.path(), "default.yml", "api:\n  timeout: 1\n  retries: 3\n");
        let api = write(dir.path(), "api/default.yml", "timeout: 5\n");

        let merged =
            merge_sources(&[Source::new(root), Source::namespaced(api, "api")]).unwrap();

        assert_eq!(merged, yaml("api:\n  timeout: 5\n  retries: 3\n"));
    }

    #[test]
    fn test_parse_error_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "good.yml", "a: 1\n");
        let bad = write(dir.path(), "bad.yml", "a: b: c\n");

        let err = merge_sources(&[Source::new(good), Source::new(&bad)]).unwrap_err();

        assert_eq!(
            err.source_location.unwrap().file,
            bad.display().to_string()
        );
    }
}
