//! layerconf CLI - inspect layered settings from the command line
//!
//! Usage:
//!   layerconf files config production
//!   layerconf dump --root config --env production
//!   layerconf dump --nested config/services --default-name default.yml --priority-name prod.yml
//!   layerconf get settings.yml settings.local.yml --path database.host
//!   layerconf check config/settings.yml

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indexmap::IndexSet;
use layerconf_core::{nested_sources, setting_files, Settings, Source, Value};
use std::path::PathBuf;
use std::process::ExitCode;

/// layerconf - Layered YAML settings with environment overrides
#[derive(Parser)]
#[command(name = "layerconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the candidate settings files for an environment, lowest priority first
    Files {
        /// Settings root directory
        root: PathBuf,

        /// Environment name (e.g., development, production)
        env: String,

        /// Mark which candidates exist
        #[arg(long)]
        existing: bool,
    },

    /// Print the merged settings tree
    Dump {
        #[command(flatten)]
        layers: LayerArgs,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Get a specific value from the merged settings
    Get {
        #[command(flatten)]
        layers: LayerArgs,

        /// Path to the value (e.g., database.host or servers[0].name)
        #[arg(short, long)]
        path: String,

        /// Output format: text, json, yaml
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Default value if key not found
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Quick syntax check of settings files
    Check {
        /// Settings file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Where the settings layers come from
#[derive(Args, Debug, Default)]
struct LayerArgs {
    /// Settings files, lowest priority first
    files: Vec<PathBuf>,

    /// Settings root for the standard layout (requires --env)
    #[arg(long, requires = "env", conflicts_with_all = ["files", "nested"])]
    root: Option<PathBuf>,

    /// Environment name for the standard layout
    #[arg(long, requires = "root")]
    env: Option<String>,

    /// Base directory of a nested (namespaced) settings tree
    #[arg(long, conflicts_with = "files")]
    nested: Option<PathBuf>,

    /// Default file name in each nested namespace
    #[arg(long = "default-name", default_value = "default.yml")]
    default_name: String,

    /// Priority file name in each nested namespace
    #[arg(long = "priority-name", default_value = "priority.yml")]
    priority_name: String,

    /// Overlay environment variables carrying this prefix (e.g., SETTINGS)
    #[arg(long)]
    env_prefix: Option<String>,
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Files {
            root,
            env,
            existing,
        } => cmd_files(root, &env, existing),

        Commands::Dump {
            layers,
            format,
            output,
        } => cmd_dump(&layers, &format, output),

        Commands::Get {
            layers,
            path,
            format,
            default,
        } => cmd_get(&layers, &path, &format, default),

        Commands::Check { files } => cmd_check(files),
    }
}

/// Build the ordered source list described by the layer arguments
fn layer_sources(layers: &LayerArgs) -> Result<Vec<Source>, String> {
    if let (Some(root), Some(env)) = (&layers.root, &layers.env) {
        return Ok(setting_files(root, env).into_iter().map(Source::new).collect());
    }

    if let Some(base) = &layers.nested {
        return nested_sources(base, &layers.default_name, &layers.priority_name)
            .map_err(|e| format!("Failed to scan {}: {}", base.display(), e));
    }

    if layers.files.is_empty() {
        return Err("No settings files specified (pass files, --root/--env or --nested)".into());
    }

    // Explicit lists apply each file once, keeping the first position
    let unique: IndexSet<Source> = layers.files.iter().map(Source::new).collect();
    Ok(unique.into_iter().collect())
}

fn load_settings(layers: &LayerArgs) -> Result<Settings, String> {
    let mut settings = Settings::with_sources(layer_sources(layers)?);
    settings
        .load()
        .map_err(|e| format!("Failed to load settings: {}", e))?;

    if let Some(prefix) = &layers.env_prefix {
        settings
            .load_env(prefix)
            .map_err(|e| format!("Failed to apply environment overlay: {}", e))?;
    }

    Ok(settings)
}

fn cmd_files(root: PathBuf, env: &str, existing: bool) -> ExitCode {
    for path in setting_files(&root, env) {
        if existing {
            let marker = if path.is_file() {
                "✓".green()
            } else {
                "·".dimmed()
            };
            println!("{} {}", marker, path.display());
        } else {
            println!("{}", path.display());
        }
    }
    ExitCode::SUCCESS
}

fn cmd_dump(layers: &LayerArgs, format: &str, output: Option<PathBuf>) -> ExitCode {
    let settings = match load_settings(layers) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let result = match format {
        "json" => settings.to_json().map(|s| format!("{}\n", s)),
        "yaml" | "yml" => settings.to_yaml(),
        _ => {
            eprintln!("Unsupported format: {}. Use yaml or json.", format);
            return ExitCode::from(1);
        }
    };

    match result {
        Ok(content) => {
            if let Some(output_path) = output {
                if let Err(e) = std::fs::write(&output_path, &content) {
                    eprintln!("{}: {}", "Error writing file".red(), e);
                    return ExitCode::from(2);
                }
                eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
            } else {
                print!("{}", content);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_get(layers: &LayerArgs, path: &str, format: &str, default: Option<String>) -> ExitCode {
    let settings = match load_settings(layers) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let Some(value) = settings.get(path) else {
        return match default {
            Some(default_val) => {
                println!("{}", default_val);
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("{}: Path '{}' not found", "Error".red(), path);
                ExitCode::from(1)
            }
        };
    };

    match render_value(value, format) {
        Ok(text) => {
            print!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

/// Render a single value; scalars print bare in text mode
fn render_value(value: &Value, format: &str) -> Result<String, String> {
    match format {
        "json" => serde_json::to_string_pretty(value)
            .map(|s| format!("{}\n", s))
            .map_err(|e| e.to_string()),
        "yaml" | "yml" => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        _ => match value {
            Value::Sequence(_) | Value::Mapping(_) => {
                serde_yaml::to_string(value).map_err(|e| e.to_string())
            }
            scalar => Ok(format!("{}\n", scalar)),
        },
    }
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        if !file.exists() {
            eprintln!("{} {}: file not found", "✗".red(), file.display());
            all_valid = false;
            continue;
        }

        match Source::new(&file).resolve() {
            Ok(map) => {
                println!(
                    "{} {}: valid YAML ({} top-level key{})",
                    "✓".green(),
                    file.display(),
                    map.len(),
                    if map.len() == 1 { "" } else { "s" }
                );
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_parse_dump_root_env() {
        let cli = parse(&["layerconf", "dump", "--root", "config", "--env", "production"]);

        let Commands::Dump { layers, format, .. } = cli.command else {
            panic!("expected dump");
        };
        assert_eq!(layers.root, Some(PathBuf::from("config")));
        assert_eq!(layers.env.as_deref(), Some("production"));
        assert_eq!(format, "yaml");
    }

    #[test]
    fn test_root_requires_env() {
        assert!(Cli::try_parse_from(["layerconf", "dump", "--root", "config"]).is_err());
    }

    #[test]
    fn test_layer_sources_from_root() {
        let layers = LayerArgs {
            root: Some(PathBuf::from("config")),
            env: Some("test".into()),
            ..LayerArgs::default()
        };

        let sources = layer_sources(&layers).unwrap();

        assert_eq!(sources.len(), 6);
        assert_eq!(sources[1].path(), PathBuf::from("config/settings/test.yml"));
    }

    #[test]
    fn test_layer_sources_dedupes_files() {
        let layers = LayerArgs {
            files: vec!["a.yml".into(), "b.yml".into(), "a.yml".into()],
            ..LayerArgs::default()
        };

        let sources = layer_sources(&layers).unwrap();

        let paths: Vec<_> = sources.iter().map(|s| s.path().to_path_buf()).collect();
        assert_eq!(paths, vec![PathBuf::from("a.yml"), PathBuf::from("b.yml")]);
    }

    #[test]
    fn test_layer_sources_requires_input() {
        assert!(layer_sources(&LayerArgs::default()).is_err());
    }

    #[test]
    fn test_load_settings_nested() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("api")).unwrap();
        std::fs::write(dir.path().join("default.yml"), "timeout: 1\n").unwrap();
        std::fs::write(dir.path().join("api/priority.yml"), "timeout: 9\n").unwrap();

        let layers = LayerArgs {
            nested: Some(dir.path().to_path_buf()),
            default_name: "default.yml".into(),
            priority_name: "priority.yml".into(),
            ..LayerArgs::default()
        };
        let settings = load_settings(&layers).unwrap();

        assert_eq!(settings.get_i64("timeout"), Some(1));
        assert_eq!(settings.get_i64("api.timeout"), Some(9));
    }

    #[test]
    fn test_render_scalar_text() {
        assert_eq!(render_value(&Value::from("db.local"), "text").unwrap(), "db.local\n");
        assert_eq!(render_value(&Value::Integer(5), "json").unwrap(), "5\n");
    }
}
