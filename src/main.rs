//! Kiln CLI
//!
//! Entry point for the `kiln` command-line tool.

use clap::{Parser, Subcommand};
use kiln::{App, HookSet, Scaffolder, Substitutions, TypeState};
use kiln_config::{write_snapshot, ConfigTree};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Configuration-driven, lazily materializing type loader", version)]
struct Cli {
    /// Application root (default: current directory)
    #[arg(long, short = 'r', global = true, default_value = ".")]
    root: PathBuf,

    /// Configuration snapshot to prefer over scanning
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration store commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Resolve types by name and report their state
    Resolve {
        /// Type names, e.g. `App::Widget`
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Render a unit from a base type's template
    Scaffold {
        /// Name of the type to generate
        target: String,

        /// Base type whose template is used
        #[arg(long, short = 'b')]
        base: String,

        /// Template variable binding (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_binding)]
        vars: Vec<(String, String)>,

        /// Write the unit under this directory instead of printing it
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Scan the configuration directory and print the merged tree
    Build {
        /// Also write the tree to this snapshot file
        #[arg(long)]
        write: Option<PathBuf>,
    },

    /// Print the value at a path (first segment case-insensitive)
    Get {
        #[arg(required = true)]
        path: Vec<String>,
    },

    /// Print the sub-value of every fragment of a kind
    Kind {
        kind: String,

        /// Path inside each fragment
        subpath: Vec<String>,
    },
}

#[derive(Serialize)]
struct ResolveReport {
    name: String,
    state: TypeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let mut app = App::new(&cli.root);
    if let Some(snapshot) = cli.snapshot {
        app = app.with_snapshot(snapshot);
    }

    match cli.command {
        Commands::Config { action } => match action {
            ConfigCommands::Build { write } => run_config_build(&app, write),
            ConfigCommands::Get { path } => run_config_get(&app, &path),
            ConfigCommands::Kind { kind, subpath } => run_config_kind(&app, &kind, &subpath),
        },
        Commands::Resolve { names } => run_resolve(&app, &names),
        Commands::Scaffold {
            target,
            base,
            vars,
            out,
        } => run_scaffold(&app, &target, &base, vars, out),
    }
}

fn fail(context: &str, error: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, error);
    process::exit(1);
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail("Error serializing output", e),
    }
}

fn load_config(app: &App) -> ConfigTree {
    match app.load_config() {
        Ok(tree) => tree,
        Err(e) => fail("Error loading configuration", e),
    }
}

fn run_config_build(app: &App, write: Option<PathBuf>) {
    let tree = load_config(app);

    if let Some(ref target) = write {
        if let Err(e) = write_snapshot(&tree, target) {
            fail("Error writing snapshot", e);
        }
        eprintln!("Snapshot written: {}", target.display());
    }

    print_json(&tree);
}

fn run_config_get(app: &App, path: &[String]) {
    let tree = load_config(app);
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();

    match tree.get(&segments) {
        Some(value) => print_json(value),
        None => fail("Not found", segments.join(".")),
    }
}

fn run_config_kind(app: &App, kind: &str, subpath: &[String]) {
    let tree = load_config(app);
    let segments: Vec<&str> = subpath.iter().map(String::as_str).collect();
    print_json(&tree.get_by_kind(kind, &segments));
}

fn run_resolve(app: &App, names: &[String]) {
    let mut resolver = match app.boot(HookSet::builtin()) {
        Ok(resolver) => resolver,
        Err(e) => fail("Error booting loader", e),
    };

    let mut failed = false;
    let reports: Vec<ResolveReport> = names
        .iter()
        .map(|name| match resolver.resolve(name) {
            Ok(state) => ResolveReport {
                name: name.clone(),
                state,
                error: None,
            },
            Err(e) => {
                failed = true;
                ResolveReport {
                    name: name.clone(),
                    state: resolver.state(name),
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    print_json(&reports);
    if failed {
        process::exit(1);
    }
}

fn run_scaffold(
    app: &App,
    target: &str,
    base: &str,
    vars: Vec<(String, String)>,
    out: Option<PathBuf>,
) {
    let settings = match app.load_config().map_err(kiln::BootError::from).and_then(|tree| {
        kiln::LoaderSettings::from_config(&tree)
    }) {
        Ok(settings) => settings,
        Err(e) => fail("Error loading configuration", e),
    };

    let substitutions: Substitutions = vars.into_iter().collect();
    let mut scaffolder = Scaffolder::new(app.root().join(&settings.templates));

    match out {
        Some(destination) => {
            let destination = resolve_out(app.root(), &destination);
            match scaffolder.persist(target, base, &substitutions, &destination) {
                Ok(path) => print_json(&serde_json::json!({
                    "target": target,
                    "base": base,
                    "path": path,
                })),
                Err(e) => fail("Error scaffolding", e),
            }
        }
        None => match scaffolder.synthesize(target, base, &substitutions) {
            Ok(source) => print!("{}", source),
            Err(e) => fail("Error scaffolding", e),
        },
    }
}

fn resolve_out(root: &Path, out: &Path) -> PathBuf {
    if out.is_absolute() {
        out.to_path_buf()
    } else {
        root.join(out)
    }
}
