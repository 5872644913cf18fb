//! alertdsl - run automation scripts in response to build, work-item and
//! check-in notifications.

use alertdsl_core::fakes::{FakeBackend, Fixtures, LogNotifier, RecordingNotifier};
use alertdsl_dsl::{compose, LibraryContext, PluginRegistry};
use alertdsl_service::{serve, DslScriptService, LoggingConfig, ServiceConfig};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "alertdsl",
    version,
    about = "Notification-driven automation scripts"
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "alertdsl.toml")]
    config: PathBuf,

    /// Plugin manifest directory (overrides the config file)
    #[arg(long)]
    dsl_folder: Option<PathBuf>,

    /// Script base folder (overrides the config file)
    #[arg(long)]
    script_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept notifications over HTTP
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        #[arg(short, long)]
        bind: Option<String>,
        /// Backend fixture data (JSON)
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },
    /// Run one notification from files and print the run report
    Notify {
        /// Event XML file
        #[arg(short, long)]
        event: PathBuf,
        /// Identity XML file
        #[arg(short, long)]
        identity: Option<PathBuf>,
        /// Backend fixture data (JSON)
        #[arg(long)]
        fixtures: Option<PathBuf>,
        /// Run this script whatever the event kind
        #[arg(short, long)]
        script: Option<String>,
    },
    /// List discovered extension libraries and the names they export
    Plugins,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(&cli.config);
    if let Some(dir) = cli.dsl_folder {
        config.dsl_folder = dir;
    }
    if let Some(dir) = cli.script_folder {
        config.script_folder = dir;
    }

    match cli.command {
        Commands::Serve { port, bind, fixtures } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            let _guard = init_logging(&config.logging);
            // Shared by every request: keep nothing per run.
            let backend = load_backend(fixtures.as_deref())?.without_call_log();
            let service = DslScriptService::new(Arc::new(backend), Arc::new(LogNotifier), config);
            serve(Arc::new(service)).await?;
        }

        Commands::Notify { event, identity, fixtures, script } => {
            if let Some(script) = script {
                config.script_file = script;
            }
            let _guard = init_logging(&config.logging);
            tracing::info!(event = %event.display(), "running notification from file");
            let event_xml = std::fs::read_to_string(&event)
                .with_context(|| format!("reading event {}", event.display()))?;
            let identity_xml = match identity {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading identity {}", path.display()))?,
                None => String::new(),
            };

            let service = DslScriptService::new(
                Arc::new(load_backend(fixtures.as_deref())?),
                Arc::new(RecordingNotifier::new()),
                config,
            );
            let report = service.notify(&event_xml, &identity_xml);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Plugins => {
            let _guard = init_logging(&config.logging);
            list_plugins(&config)?;
        }

        Commands::Config => {
            print!("{}", config.to_toml());
        }
    }

    Ok(())
}

/// Installs the process-wide subscriber. The returned guard flushes the log
/// file on drop.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "alertdsl=info,tower_http=info".into());

    let json_layer = logging.json.then(|| fmt::layer().json());
    let text_layer = (!logging.json).then(fmt::layer);

    let (file_layer, guard) = match &logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "alertdsl.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();
    guard
}

fn load_backend(fixtures: Option<&Path>) -> anyhow::Result<FakeBackend> {
    match fixtures {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading fixtures {}", path.display()))?;
            Ok(FakeBackend::from_fixtures(Fixtures::from_json(&json)?))
        }
        None => Ok(FakeBackend::new()),
    }
}

fn list_plugins(config: &ServiceConfig) -> anyhow::Result<()> {
    let catalog = alertdsl_dsl::create_default_catalog();
    let mut found = PluginRegistry::new(&catalog).discover(&config.dsl_folder)?;

    for plugin in &found {
        println!(
            "{:<16} {:<8} {}",
            plugin.name,
            plugin.library.name(),
            plugin.library.description()
        );
    }

    let context = LibraryContext::new(
        Arc::new(FakeBackend::new()),
        Arc::new(LogNotifier),
        String::new(),
        config.script_folder.clone(),
    );
    let namespace = compose(found.iter_mut().map(|d| &mut d.library), &context);
    println!();
    println!("Namespace ({} names):", namespace.len());
    for name in namespace.names() {
        println!("  {}", name);
    }
    Ok(())
}
