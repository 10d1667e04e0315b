//! diagtrace command-line tool.
//!
//! ```text
//! diagtrace check <directive file>       parse and print the resulting masks
//! diagtrace emit [-s settings.toml] ...  start a context and record a message
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diagtrace::config::directive::{canonical, parse_str, Switches};
use diagtrace::config::loader::load_settings;
use diagtrace::trace::TraceOutput;
use diagtrace::{ModuleRegistry, TraceContext, TraceKind, TraceSettings};

#[derive(Parser)]
#[command(name = "diagtrace")]
#[command(about = "Diagnostic trace configuration and logging tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a directive file and print diagnostics and module masks as JSON
    Check {
        path: PathBuf,

        /// Declare the well-known modules before applying the directives
        #[arg(long)]
        well_known: bool,
    },
    /// Start a trace context and record one message
    Emit {
        /// Settings file (TOML); defaults are used when omitted
        #[arg(short, long)]
        settings: Option<PathBuf>,

        #[arg(short, long, default_value = "misc")]
        module: String,

        /// Trace kind name, e.g. message, error, debug
        #[arg(short, long, default_value = "message")]
        kind: String,

        message: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diagtrace=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { path, well_known } => check(&path, well_known)?,
        Commands::Emit {
            settings,
            module,
            kind,
            message,
        } => emit(settings, &module, &kind, &message)?,
    }

    Ok(())
}

fn check(path: &Path, well_known: bool) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let parsed = parse_str(&text);

    let registry = ModuleRegistry::new(Arc::new(TraceOutput::detached()));
    if well_known {
        registry.declare_well_known();
    }
    let mut switches = Switches::default();
    parsed.apply(&registry, &mut switches);

    let mut modules = Map::new();
    for name in registry.names() {
        if let Some(module) = registry.get(&name) {
            modules.insert(
                name.clone(),
                json!({
                    "mask": module.mask().bits(),
                    "directive": canonical(&name, module.mask()),
                }),
            );
        }
    }

    let report = json!({
        "switches": {
            "deletefile": switches.reset_log_on_start,
            "verbose": switches.verbose_kinds,
            "milliseconds": switches.millisecond_timestamps,
        },
        "errors": parsed.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "modules": Value::Object(modules),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !parsed.errors.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn emit(
    settings: Option<PathBuf>,
    module: &str,
    kind: &str,
    message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match settings {
        Some(path) => load_settings(&path)?,
        None => TraceSettings::default(),
    };
    let kind = TraceKind::parse_name(kind).ok_or_else(|| format!("unknown trace kind '{kind}'"))?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let context = TraceContext::start(settings, &args, None)?;

    let module = context.module(module);
    if !module.is_enabled(kind) {
        tracing::warn!(module = %module.name(), kind = %kind.describe(), "Kind is not enabled for module");
    }
    module.trace(kind, message);
    context.call_complete();
    context.exit();

    Ok(())
}
