//! tasksync CLI
//!
//! Command-line client for the tasks REST service.
//!
//! # Commands
//!
//! - `list` - List tasks, optionally filtered
//! - `create` - Create a task
//! - `update` - Change fields of a task
//! - `delete` - Delete a task
//! - `demo` - Scripted session against an in-process mock server

mod commands;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tasksync_mock::{MockConfig, MockTaskServer};
use tasksync_store::{TaskPriority, TaskStatus, TaskStore};
use tasksync_transport::{
    HttpClient, LoopbackClient, ReqwestClient, RetryConfig, Transport, TransportConfig,
};
use tracing_subscriber::EnvFilter;

/// Number of tasks the `--mock` server starts with.
const MOCK_SEED: usize = 5;

/// Command-line client for the tasks REST service.
#[derive(Parser)]
#[command(name = "tasksync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the service (defaults to $TASKSYNC_API_BASE, then http://localhost)
    #[arg(global = true, short, long)]
    base_url: Option<String>,

    /// Run against a seeded in-process mock server
    #[arg(global = true, long)]
    mock: bool,

    /// Disable retries of transient failures
    #[arg(global = true, long)]
    no_retry: bool,

    /// Send an Idempotency-Key header with every write
    #[arg(global = true, long)]
    idempotency_keys: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks
    List {
        /// Only tasks with this status (pending, completed)
        #[arg(short, long)]
        status: Option<TaskStatus>,

        /// Only tasks with this priority (low, medium, high)
        #[arg(short, long)]
        priority: Option<TaskPriority>,
    },

    /// Create a task
    Create {
        /// Task title
        #[arg(short, long)]
        title: String,

        /// Task description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Initial status
        #[arg(short, long, default_value = "pending")]
        status: TaskStatus,

        /// Priority
        #[arg(short, long, default_value = "medium")]
        priority: TaskPriority,
    },

    /// Change fields of a task
    Update {
        /// Task id
        id: i64,

        /// New title
        #[arg(short, long)]
        title: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New status
        #[arg(short, long)]
        status: Option<TaskStatus>,

        /// New priority
        #[arg(short, long)]
        priority: Option<TaskPriority>,
    },

    /// Delete a task
    Delete {
        /// Task id
        id: i64,
    },

    /// Run a scripted session against an in-process mock server
    Demo,

    /// Show version information
    Version,
}

impl Cli {
    fn transport_config(&self) -> TransportConfig {
        let config = match &self.base_url {
            Some(url) => TransportConfig::new(url.clone()),
            None => TransportConfig::from_env(),
        }
        .with_idempotency_keys(self.idempotency_keys);
        if self.no_retry {
            config.with_retry(RetryConfig::no_retry())
        } else {
            config
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.transport_config();
    match cli.command {
        Commands::Version => {
            println!("tasksync CLI v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Demo => commands::demo::run(config, &cli.format).await,
        command if cli.mock => {
            let server = Arc::new(MockTaskServer::seeded(MOCK_SEED, MockConfig::default()));
            let store = TaskStore::new(Transport::new(config, LoopbackClient::new(server)));
            dispatch(&store, command, &cli.format).await
        }
        command => {
            tracing::debug!(base_url = %config.base_url, "using remote service");
            let store = TaskStore::new(Transport::new(config, ReqwestClient::new()?));
            dispatch(&store, command, &cli.format).await
        }
    }
}

async fn dispatch<C: HttpClient>(
    store: &TaskStore<C>,
    command: Commands,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List { status, priority } => {
            commands::list::run(store, status, priority, format).await?;
        }
        Commands::Create {
            title,
            description,
            status,
            priority,
        } => {
            let input = tasksync_store::TaskInput::new(title)
                .with_description(description)
                .with_status(status)
                .with_priority(priority);
            commands::create::run(store, input, format).await?;
        }
        Commands::Update {
            id,
            title,
            description,
            status,
            priority,
        } => {
            let patch = tasksync_store::TaskPatch {
                title,
                description,
                status,
                priority,
            };
            commands::update::run(store, id, patch, format).await?;
        }
        Commands::Delete { id } => {
            commands::delete::run(store, id).await?;
        }
        Commands::Demo | Commands::Version => {}
    }
    Ok(())
}
