//! Process-wide setup, binding and reload.
//!
//! Setup runs at most once per process, so the whole flow lives in a single
//! test to keep it independent of test ordering.

use std::path::{Path, PathBuf};

use layerconf_core::global::{self, current, global_registry};
use layerconf_core::{
    load_and_set_nested_settings, load_and_set_settings, load_files, reload, setting_files,
    setup, ErrorKind,
};

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_global_setup_bind_and_reload() {
    setup(|opts| {
        opts.const_name = "AppSettings".into();
        opts.use_env = true;
    });
    // Second setup is ignored
    setup(|opts| {
        opts.const_name = "Ignored".into();
        opts.use_env = false;
    });

    let opts = global::options();
    assert_eq!(opts.const_name, "AppSettings");
    assert!(opts.use_env);
    assert_eq!(opts.resolved_env_prefix(), "APPSETTINGS");

    // Flat mode with the environment overlay applied on load
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("config");
    write(&root, "settings.yml", "db:\n  host: file\n  port: 5432\nname: base\n");
    write(&root, "settings/production.yml", "name: production\n");
    std::env::set_var("APPSETTINGS__DB__HOST", "env");

    let handle = load_and_set_settings(setting_files(&root, "production")).unwrap();
    {
        let settings = handle.read().unwrap();
        assert_eq!(settings.get_str("db.host"), Some("env"));
        assert_eq!(settings.get_i64("db.port"), Some(5432));
        assert_eq!(settings.get_str("name"), Some("production"));
    }
    assert!(global_registry().read().unwrap().contains("AppSettings"));

    // Reload finds the bound instance and drops ad hoc mutations
    handle.write().unwrap().set("name", "patched").unwrap();
    write(&root, "settings.local.yml", "db:\n  port: 6543\n");
    reload().unwrap();
    {
        let settings = handle.read().unwrap();
        assert_eq!(settings.get_str("name"), Some("production"));
        assert_eq!(settings.get_i64("db.port"), Some(6543));
        assert_eq!(settings.get_str("db.host"), Some("env"));
    }

    // load_files honours use_env too but binds nothing new
    let unbound = load_files([root.join("settings.yml")]).unwrap();
    assert_eq!(unbound.get_str("db.host"), Some("env"));
    assert!(std::sync::Arc::ptr_eq(&current().unwrap(), &handle));

    // Nested mode replaces the binding
    let nested = dir.path().join("nested");
    write(&nested, "default.yml", "timeout: 1\n");
    write(&nested, "prod.yml", "timeout: 9\n");
    write(&nested, "api/default.yml", "timeout: 5\n");
    write(&nested, "api/prod.yml", "timeout: 7\n");

    let nested_handle = load_and_set_nested_settings(&nested, "default.yml", "prod.yml").unwrap();
    assert!(!std::sync::Arc::ptr_eq(&nested_handle, &handle));
    {
        let settings = nested_handle.read().unwrap();
        assert_eq!(settings.get_i64("timeout"), Some(9));
        assert_eq!(settings.get_i64("api.timeout"), Some(7));
        // The overlay still applies on top of the nested tree
        assert_eq!(settings.get_str("db.host"), Some("env"));
    }
    assert!(std::sync::Arc::ptr_eq(&current().unwrap(), &nested_handle));

    // A failed load leaves nothing bound
    write(&root, "settings.yml", "db: [broken\n");
    let err = load_and_set_settings(setting_files(&root, "production")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Parse);
    assert!(current().is_none());
    assert_eq!(reload().unwrap_err().kind, ErrorKind::NotLoaded);

    std::env::remove_var("APPSETTINGS__DB__HOST");
}
