//! Blobwatch - run functions when objects appear or change
//!
//! Hosts blob-triggered functions over a local directory object store.
//! Every `--watch function=container/pattern` registers a function whose
//! invocations are logged.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use blobwatch_core::config::BlobwatchConfig;
use blobwatch_core::types::{FunctionInstance, FunctionResult};
use blobwatch_core::utils::sanitize_host_id;
use blobwatch_listener::{
    BlobListenerFactory, CompositeListener, DefaultInstanceFactory, FunctionExecutor, Listener,
    ListenerFactoryContext, PipelineSettings,
};
use blobwatch_storage::{FileReceiptStore, LocalObjectStore, MemoryQueueClient};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "blobwatch")]
#[command(author = "Blobwatch Team")]
#[command(version = blobwatch_core::VERSION)]
#[command(about = "Blob-triggered function host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Host id; scopes receipts and the trigger queue
    #[arg(long, env = "BLOBWATCH_HOST_ID", global = true)]
    host_id: Option<String>,

    /// Object store root; containers are subdirectories
    #[arg(long, env = "BLOBWATCH_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BLOBWATCH_LOG_LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch containers and run the registered functions
    Run {
        /// `function=container/pattern`, repeatable
        #[arg(short, long = "watch", required = true)]
        watches: Vec<String>,

        /// Directory for receipts; defaults to `.blobwatch/receipts` in the data dir
        #[arg(long, env = "BLOBWATCH_RECEIPTS_DIR")]
        receipts_dir: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

/// Logs every invocation and reports success
struct LoggingExecutor;

#[async_trait]
impl FunctionExecutor for LoggingExecutor {
    async fn execute(&self, instance: FunctionInstance) -> FunctionResult {
        info!(
            function = %instance.function_id,
            object = %instance.trigger,
            bytes = instance.content.len(),
            delivery = instance.delivery_count,
            bindings = ?instance.binding_data,
            "Function invoked"
        );
        FunctionResult::success()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load or create config
    let mut config = if let Some(config_path) = &cli.config {
        BlobwatchConfig::from_file(config_path)?
    } else {
        BlobwatchConfig::from_env()
    };

    // Override with CLI args
    if let Some(host_id) = &cli.host_id {
        config.host.host_id = sanitize_host_id(host_id);
    }
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init_logging(&config);

    match cli.command {
        Some(Commands::Run {
            watches,
            receipts_dir,
        }) => run(config, watches, receipts_dir).await?,
        Some(Commands::Version) | None => {
            println!("blobwatch {}", blobwatch_core::VERSION);
        }
    }

    Ok(())
}

fn init_logging(config: &BlobwatchConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    }
}

/// Split `function=container/pattern`
fn parse_watch(watch: &str) -> anyhow::Result<(String, String)> {
    let (function_id, pattern) = watch
        .split_once('=')
        .with_context(|| format!("watch '{}' is not function=container/pattern", watch))?;
    if function_id.trim().is_empty() || pattern.trim().is_empty() {
        anyhow::bail!("watch '{}' is not function=container/pattern", watch);
    }
    Ok((function_id.trim().to_string(), pattern.trim().to_string()))
}

async fn run(
    config: BlobwatchConfig,
    watches: Vec<String>,
    receipts_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    config.validate()?;

    let objects = Arc::new(LocalObjectStore::new(&config.storage.data_dir));
    objects.init().await?;

    let receipts_dir = receipts_dir
        .unwrap_or_else(|| config.storage.data_dir.join(".blobwatch").join("receipts"));
    let receipts = Arc::new(FileReceiptStore::new(&receipts_dir));
    receipts.init().await?;

    let queues = Arc::new(MemoryQueueClient::new(config.queue.max_delivery_count));
    let context = ListenerFactoryContext::new(
        config.host.host_id.clone(),
        objects,
        receipts,
        queues,
        PipelineSettings::from(&config),
    );

    let executor: Arc<dyn FunctionExecutor> = Arc::new(LoggingExecutor);
    let mut listeners: Vec<CompositeListener> = Vec::new();
    for watch in &watches {
        let (function_id, pattern) = parse_watch(watch)?;
        let factory =
            BlobListenerFactory::new(function_id, &pattern, Arc::new(DefaultInstanceFactory))?;
        listeners.push(factory.create(Arc::clone(&executor), &context).await?);
    }

    for listener in &listeners {
        listener.start().await?;
    }
    info!(
        "Blobwatch host {} watching {} function(s) under {:?}",
        config.host.host_id,
        listeners.len(),
        config.storage.data_dir
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    for listener in &listeners {
        if let Err(e) = listener.stop().await {
            error!("Failed to stop listener: {}", e);
        }
    }
    Ok(())
}
