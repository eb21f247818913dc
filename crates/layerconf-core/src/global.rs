//! Process-wide setup and settings binding
//!
//! The engine itself ([`Settings`]) needs no global state. This module is a
//! thin convenience layer on top of it:
//!
//! - a run-once [`setup`] that configures the binding name and whether the
//!   environment overlay is applied,
//! - a [`SettingsRegistry`] holding shared settings by name,
//! - loaders that build settings and bind them under the configured name,
//!   and [`reload`] to refresh that exact instance.
//!
//! Setup is init-then-freeze: call it once before any loading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use indexmap::IndexSet;

use crate::error::{Error, Result};
use crate::layout::nested_sources;
use crate::settings::Settings;

/// Default name settings are bound under
pub const DEFAULT_CONST_NAME: &str = "Settings";

/// Settings shared between the registry and the host application
pub type SharedSettings = Arc<RwLock<Settings>>;

/// Knobs adjusted inside [`setup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOptions {
    /// Name the loaded settings are bound under
    pub const_name: String,
    /// Apply the environment overlay after every load
    pub use_env: bool,
    /// Environment prefix; defaults to `const_name` upper-cased
    pub env_prefix: Option<String>,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            const_name: DEFAULT_CONST_NAME.to_string(),
            use_env: false,
            env_prefix: None,
        }
    }
}

impl SetupOptions {
    /// The prefix environment variables must carry
    pub fn resolved_env_prefix(&self) -> String {
        match &self.env_prefix {
            Some(prefix) => prefix.clone(),
            None => self.const_name.to_uppercase(),
        }
    }
}

/// Configure-once state
///
/// The first [`Bootstrap::setup`] runs its closure; later calls are silent
/// no-ops.
#[derive(Debug, Default)]
pub struct Bootstrap {
    ran: bool,
    options: SetupOptions,
}

impl Bootstrap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `configure` if setup has not run yet; returns whether it ran
    pub fn setup<F>(&mut self, configure: F) -> bool
    where
        F: FnOnce(&mut SetupOptions),
    {
        if self.ran {
            return false;
        }
        self.ran = true;
        configure(&mut self.options);
        true
    }

    pub fn has_run(&self) -> bool {
        self.ran
    }

    pub fn options(&self) -> &SetupOptions {
        &self.options
    }
}

/// Named, shared settings instances
#[derive(Debug, Default)]
pub struct SettingsRegistry {
    bound: HashMap<String, SharedSettings>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `settings` under `name`, replacing (unbinding) any previous binding
    pub fn bind(&mut self, name: impl Into<String>, settings: Settings) -> SharedSettings {
        let name = name.into();
        let shared = Arc::new(RwLock::new(settings));
        if self.bound.insert(name.clone(), Arc::clone(&shared)).is_some() {
            log::info!("Replaced settings bound as '{}'", name);
        } else {
            log::info!("Bound settings as '{}'", name);
        }
        shared
    }

    /// Bind `settings` under `name`, failing if the name is taken
    pub fn bind_new(&mut self, name: impl Into<String>, settings: Settings) -> Result<SharedSettings> {
        let name = name.into();
        if self.bound.contains_key(&name) {
            return Err(Error::binding_conflict(name));
        }
        Ok(self.bind(name, settings))
    }

    /// Remove the binding for `name`, returning it if present
    pub fn unbind(&mut self, name: &str) -> Option<SharedSettings> {
        self.bound.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<SharedSettings> {
        self.bound.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bound.contains_key(name)
    }

    /// Reload the settings bound under `name` in place
    pub fn reload(&self, name: &str) -> Result<()> {
        let shared = self
            .get(name)
            .ok_or_else(|| Error::not_loaded(format!("No settings are bound as '{}'", name)))?;
        let mut settings = shared
            .write()
            .map_err(|_| Error::internal(format!("Settings '{}' lock poisoned", name)))?;
        settings.reload()?;
        log::info!("Reloaded settings '{}'", name);
        Ok(())
    }
}

static BOOTSTRAP: OnceLock<RwLock<Bootstrap>> = OnceLock::new();
static GLOBAL_REGISTRY: OnceLock<RwLock<SettingsRegistry>> = OnceLock::new();

fn bootstrap() -> &'static RwLock<Bootstrap> {
    BOOTSTRAP.get_or_init(|| RwLock::new(Bootstrap::new()))
}

/// Get the process-wide settings registry
pub fn global_registry() -> &'static RwLock<SettingsRegistry> {
    GLOBAL_REGISTRY.get_or_init(|| RwLock::new(SettingsRegistry::new()))
}

/// Configure the process-wide options; runs `configure` at most once per process
///
/// `configure` must not call back into this module.
pub fn setup<F>(configure: F)
where
    F: FnOnce(&mut SetupOptions),
{
    let mut state = bootstrap().write().unwrap_or_else(PoisonError::into_inner);
    state.setup(configure);
}

/// A copy of the current process-wide options
pub fn options() -> SetupOptions {
    bootstrap()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .options()
        .clone()
}

/// Load `paths` (duplicates removed, first occurrence kept) into new settings
///
/// Applies the environment overlay when `use_env` was enabled in [`setup`].
pub fn load_files<I, P>(paths: I) -> Result<Settings>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let unique: IndexSet<PathBuf> = paths
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();
    let mut settings: Settings = unique.into_iter().collect();
    load_with_options(&mut settings, &options())?;
    Ok(settings)
}

/// Load `paths` and bind the result under the configured name
///
/// Any previous binding is removed first, so a failed load leaves nothing
/// bound.
pub fn load_and_set_settings<I, P>(paths: I) -> Result<SharedSettings>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let name = options().const_name;
    unbind_global(&name);
    let settings = load_files(paths)?;
    bind_global(name, settings)
}

/// Load a nested settings tree and bind it under the configured name
///
/// See [`nested_sources`] for the directory convention.
pub fn load_and_set_nested_settings(
    base_path: impl AsRef<Path>,
    default_name: &str,
    priority_name: &str,
) -> Result<SharedSettings> {
    let opts = options();
    unbind_global(&opts.const_name);

    let mut settings: Settings = nested_sources(base_path, default_name, priority_name)?
        .into_iter()
        .collect();
    load_with_options(&mut settings, &opts)?;
    bind_global(opts.const_name, settings)
}

/// The settings bound under the configured name, if any
pub fn current() -> Option<SharedSettings> {
    let name = options().const_name;
    global_registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&name)
}

/// Reload the settings bound under the configured name
pub fn reload() -> Result<()> {
    let name = options().const_name;
    global_registry()
        .read()
        .map_err(|_| Error::internal("Global settings registry lock poisoned"))?
        .reload(&name)
}

fn load_with_options(settings: &mut Settings, opts: &SetupOptions) -> Result<()> {
    settings.load()?;
    if opts.use_env {
        settings.load_env(&opts.resolved_env_prefix())?;
    }
    Ok(())
}

fn bind_global(name: String, settings: Settings) -> Result<SharedSettings> {
    let mut registry = global_registry()
        .write()
        .map_err(|_| Error::internal("Global settings registry lock poisoned"))?;
    Ok(registry.bind(name, settings))
}

fn unbind_global(name: &str) {
    global_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .unbind(name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_setup_runs_once() {
        let mut boot = Bootstrap::new();

        let first = boot.setup(|o| {
            o.const_name = "AppConfig".into();
            o.use_env = true;
        });
        let second = boot.setup(|o| o.const_name = "Other".into());

        assert!(first);
        assert!(!second);
        assert!(boot.has_run());
        assert_eq!(boot.options().const_name, "AppConfig");
        assert!(boot.options().use_env);
    }

    #[test]
    fn test_default_options() {
        let opts = SetupOptions::default();

        assert_eq!(opts.const_name, "Settings");
        assert!(!opts.use_env);
        assert_eq!(opts.resolved_env_prefix(), "SETTINGS");
    }

    #[test]
    fn test_env_prefix_follows_const_name() {
        let opts = SetupOptions {
            const_name: "AppConfig".into(),
            ..SetupOptions::default()
        };
        assert_eq!(opts.resolved_env_prefix(), "APPCONFIG");

        let explicit = SetupOptions {
            env_prefix: Some("MYAPP".into()),
            ..opts
        };
        assert_eq!(explicit.resolved_env_prefix(), "MYAPP");
    }

    #[test]
    fn test_registry_bind_replaces() {
        let mut registry = SettingsRegistry::new();
        let mut first = Settings::new();
        first.set("v", 1).unwrap();
        let mut second = Settings::new();
        second.set("v", 2).unwrap();

        registry.bind("Settings", first);
        registry.bind("Settings", second);

        let bound = registry.get("Settings").unwrap();
        assert_eq!(bound.read().unwrap().get_i64("v"), Some(2));
    }

    #[test]
    fn test_registry_bind_new_conflict() {
        let mut registry = SettingsRegistry::new();
        registry.bind_new("Settings", Settings::new()).unwrap();

        let err = registry.bind_new("Settings", Settings::new()).unwrap_err();

        assert_eq!(
            err.kind,
            ErrorKind::BindingConflict {
                name: "Settings".into()
            }
        );
    }

    #[test]
    fn test_registry_unbind() {
        let mut registry = SettingsRegistry::new();
        registry.bind("Settings", Settings::new());

        assert!(registry.unbind("Settings").is_some());
        assert!(!registry.contains("Settings"));
        assert!(registry.unbind("Settings").is_none());
    }

    #[test]
    fn test_registry_reload_unbound() {
        let registry = SettingsRegistry::new();

        let err = registry.reload("Settings").unwrap_err();

        assert_eq!(err.kind, ErrorKind::NotLoaded);
    }

    #[test]
    fn test_registry_reload_refreshes_shared_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yml");
        std::fs::write(&path, "mode: a\n").unwrap();

        let mut settings = Settings::with_sources([path.clone()]);
        settings.load().unwrap();
        let mut registry = SettingsRegistry::new();
        let handle = registry.bind("Settings", settings);

        std::fs::write(&path, "mode: b\n").unwrap();
        registry.reload("Settings").unwrap();

        assert_eq!(handle.read().unwrap().get_str("mode"), Some("b"));
    }
}
