#![forbid(unsafe_code)]

//! **outline-cli** – manual-exercise harness for the collaborative outline
//! engine (spec §6 External Interfaces).
//!
//! Transport to browsers is out of scope for the engine itself (spec §1);
//! this binary stands in for that transport during development. It boots
//! the in-memory or SQLite storage driver, submits one command per
//! invocation (or a newline-delimited batch via `repl`), and prints the
//! committed event or error as JSON.

mod command_args;
mod engine;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use outline_bus_core::EventBus;
use outline_store_core::NodeStore;
use outline_types::{Command, ContainerId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::engine::Engine;

#[derive(Parser)]
#[command(name = "outline")]
#[command(about = "Exercise the collaborative outline engine from the command line")]
#[command(version)]
struct Cli {
    /// Path to a SQLite database file. Omit to use the in-memory driver
    /// (state does not survive the process).
    #[arg(long)]
    db: Option<String>,

    /// Originator segment of the `event_id` this invocation issues
    /// (spec §3, §9) — distinguishes this CLI session from others for
    /// echo-suppression purposes.
    #[arg(long, default_value = "outline-cli")]
    session: String,

    /// Command deadline in milliseconds (spec §6 `command_timeout_ms`).
    #[arg(long, default_value_t = 5_000)]
    timeout_ms: u64,

    /// Disable the URL analyzer worker (content changes will not enqueue
    /// rescans).
    #[arg(long)]
    no_analyzer: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a single command, read as JSON (`{"command": "insert_node", ...}`
    /// matching `outline_types::Command`'s serde representation) from
    /// `--json` or, if omitted, stdin.
    Exec {
        /// Command payload as JSON. Reads stdin if omitted.
        #[arg(long)]
        json: Option<String>,
    },
    /// Read newline-delimited JSON commands from stdin, executing each in
    /// turn and printing its outcome as it commits.
    Repl,
    /// Insert a new node.
    Insert {
        #[command(flatten)]
        target: command_args::ContainerTarget,
        /// Parent node id, omit for a root-level node.
        #[arg(long)]
        parent: Option<String>,
        /// Preceding sibling id, omit to become the head of its group.
        #[arg(long)]
        prev: Option<String>,
        /// Initial text content.
        #[arg(long, default_value = "")]
        content: String,
        /// Creating user id.
        #[arg(long)]
        creator: String,
    },
    /// Replace a node's content.
    ChangeContent {
        /// Node to update.
        node: String,
        /// New content.
        #[arg(long)]
        content: String,
    },
    /// Reposition a node within its own container.
    Move {
        /// Node to move.
        node: String,
        /// New parent, omit for root level.
        #[arg(long)]
        parent: Option<String>,
        /// New preceding sibling, omit to become head.
        #[arg(long)]
        prev: Option<String>,
    },
    /// Move a node into a different container.
    MoveToContainer {
        /// Node to move.
        node: String,
        /// Destination container.
        #[arg(long)]
        target: String,
        /// New parent within the destination, omit for root level.
        #[arg(long)]
        parent: Option<String>,
        /// New preceding sibling within the destination.
        #[arg(long)]
        prev: Option<String>,
    },
    /// Swap a node with its preceding sibling.
    MoveUp {
        /// Node to move.
        node: String,
    },
    /// Swap a node with its following sibling.
    MoveDown {
        /// Node to move.
        node: String,
    },
    /// Nest a node under its previous sibling.
    Indent {
        /// Node to indent.
        node: String,
    },
    /// Lift a node to its grandparent's level.
    Outdent {
        /// Node to outdent.
        node: String,
    },
    /// Split a node's content at a byte range.
    Split {
        /// Node to split.
        node: String,
        /// Selection start byte offset.
        #[arg(long)]
        start: usize,
        /// Selection stop byte offset.
        #[arg(long)]
        stop: usize,
    },
    /// Merge a node with its previous sibling.
    MergePrev {
        /// Node receiving the merged content.
        node: String,
    },
    /// Merge a node with its next sibling.
    MergeNext {
        /// Node receiving the merged content.
        node: String,
    },
    /// Delete a node, flattening its children into its former position.
    Delete {
        /// Node to delete.
        node: String,
    },
    /// Print a container's current tree as a pre-order JSON array (the
    /// "initial-state fetch" half of spec §6's client-sync recipe).
    List {
        /// Container to list.
        container: String,
    },
    /// Stream a container's committed events as they arrive (the
    /// "subscription from that sequence onward" half of spec §6's
    /// client-sync recipe). Runs until interrupted.
    Tail {
        /// Container to subscribe to.
        container: String,
        /// Suppress events whose `event_id` originator matches this CLI's
        /// `--session` (spec §9 echo suppression).
        #[arg(long)]
        suppress_own: bool,
    },
    /// Print live serializer and analyzer queue counts.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let engine = Engine::build(cli.db.as_deref(), !cli.no_analyzer, Duration::from_millis(cli.timeout_ms)).await?;

    match cli.command {
        Commands::Exec { json } => {
            let raw = match json {
                Some(j) => j,
                None => read_stdin_all()?,
            };
            let command: Command = serde_json::from_str(&raw).context("parsing command JSON")?;
            run_one(&engine, command).await;
        }
        Commands::Repl => {
            for line in std::io::stdin().lines() {
                let line = line.context("reading stdin")?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Command>(&line) {
                    Ok(command) => run_one(&engine, command).await,
                    Err(err) => print_error(&format!("invalid command JSON: {err}")),
                }
            }
        }
        Commands::Insert { target, parent, prev, content, creator } => {
            let command = command_args::insert_command(&cli.session, target, parent, prev, content, creator)?;
            run_one(&engine, command).await;
        }
        Commands::ChangeContent { node, content } => {
            let command = command_args::change_content_command(&cli.session, &node, content)?;
            run_one(&engine, command).await;
        }
        Commands::Move { node, parent, prev } => {
            let command = command_args::move_command(&cli.session, &node, parent, prev)?;
            run_one(&engine, command).await;
        }
        Commands::MoveToContainer { node, target, parent, prev } => {
            let command = command_args::move_to_container_command(&cli.session, &node, &target, parent, prev)?;
            run_one(&engine, command).await;
        }
        Commands::MoveUp { node } => run_one(&engine, command_args::move_up_command(&cli.session, &node)?).await,
        Commands::MoveDown { node } => run_one(&engine, command_args::move_down_command(&cli.session, &node)?).await,
        Commands::Indent { node } => run_one(&engine, command_args::indent_command(&cli.session, &node)?).await,
        Commands::Outdent { node } => run_one(&engine, command_args::outdent_command(&cli.session, &node)?).await,
        Commands::Split { node, start, stop } => {
            run_one(&engine, command_args::split_command(&cli.session, &node, start, stop)?).await
        }
        Commands::MergePrev { node } => run_one(&engine, command_args::merge_prev_command(&cli.session, &node)?).await,
        Commands::MergeNext { node } => run_one(&engine, command_args::merge_next_command(&cli.session, &node)?).await,
        Commands::Delete { node } => run_one(&engine, command_args::delete_command(&cli.session, &node)?).await,
        Commands::List { container } => {
            let container_id: ContainerId = parse_container(&container)?;
            let nodes = engine.store.list_by_container(container_id).await?;
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
        Commands::Tail { container, suppress_own } => {
            let container_id: ContainerId = parse_container(&container)?;
            tail(&engine, container_id, if suppress_own { Some(cli.session.as_str()) } else { None }).await?;
        }
        Commands::Status => {
            let status = serde_json::json!({
                "live_containers": engine.registry.live_container_count(),
                "analyzer_queue_depth": engine.analyzer.as_ref().map(|a| a.queue_depth()),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

async fn run_one(engine: &Engine, command: Command) {
    match engine.dispatcher.dispatch(command).await {
        Ok(outline_kernel::Outcome::Committed(event)) => {
            println!("{}", serde_json::to_string(&event).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}")));
        }
        Ok(outline_kernel::Outcome::NoOp) => {
            println!("{}", serde_json::json!({"outcome": "no_op"}));
        }
        Err(err) => print_error(&err.to_string()),
    }
}

fn print_error(message: &str) {
    eprintln!("{}", serde_json::json!({"error": message}));
}

async fn tail(engine: &Engine, container_id: ContainerId, suppress_originator: Option<&str>) -> Result<()> {
    if let Some(origin) = suppress_originator {
        let mut rx = outline_bus_core::EchoFilteredReceiver::new(engine.bus.subscribe(container_id), origin.to_string());
        loop {
            match rx.recv().await {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(err) => {
                    print_error(&err.to_string());
                    break;
                }
            }
        }
    } else {
        let mut rx = engine.bus.subscribe(container_id);
        loop {
            match rx.recv().await {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(err) => {
                    print_error(&err.to_string());
                    break;
                }
            }
        }
    }
    Ok(())
}

fn parse_container(raw: &str) -> Result<ContainerId> {
    Ok(ContainerId(raw.parse().context("parsing container id")?))
}

fn read_stdin_all() -> Result<String> {
    use std::io::Read;
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
    Ok(buf)
}

fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
