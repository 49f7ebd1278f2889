//! Kiosk relay - durable delivery of kiosk check-ins.

mod app;
mod connectivity;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kiosk_config_and_utils::{init_logging, level_directive, Config, Paths};
use kiosk_storage::{open_store, DurableStore, MemoryStore};
use std::sync::Arc;

/// Kiosk relay command-line interface.
#[derive(Parser)]
#[command(name = "kiosk-relay")]
#[command(about = "Queue kiosk check-ins and deliver them when the destination is reachable")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Defaults to the config file value
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (store, logs, config). Defaults to ~/.kiosk-relay
    #[arg(long, global = true, env = "KIOSK_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Keep all state in memory for this process only
    #[arg(long, global = true)]
    ephemeral: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the flush scheduler until interrupted
    Run,
    /// Capture one check-in: deliver now or queue it
    Capture(app::CaptureArgs),
    /// Show queue and audit counts
    Status,
    /// Inspect or clear the pending queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Export or clear the audit log
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },
    /// Show or change delivery settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Print pending check-ins as JSON
    Peek,
    /// Drop every pending check-in
    Clear,
}

#[derive(Subcommand)]
enum AuditAction {
    /// Write the audit log as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove every audit entry
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print relay config and delivery settings (secrets redacted)
    Show,
    /// Set a delivery setting, e.g. `endpoint_url http://collector:8080`
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = level_directive(cli.log_level.as_deref().unwrap_or(&config.log_level));
    let log_file = match (&cli.command, cli.ephemeral) {
        (None | Some(Commands::Run), false) => Some(paths.log_file()),
        _ => None,
    };
    init_logging(level, log_file.as_deref())?;

    let store: Arc<dyn DurableStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        open_store(&paths.store_file())?
    };

    match cli.command {
        None | Some(Commands::Run) => app::run_relay(&config, store).await?,
        Some(Commands::Capture(args)) => app::capture(&config, store, args).await?,
        Some(Commands::Status) => app::print_status(&config, store)?,
        Some(Commands::Queue { action }) => match action {
            QueueAction::Peek => app::print_queue(&config, store)?,
            QueueAction::Clear => app::clear_queue(&config, store)?,
        },
        Some(Commands::Audit { action }) => match action {
            AuditAction::Export { output } => app::export_audit(&config, store, output.as_deref())?,
            AuditAction::Clear => app::clear_audit(&config, store)?,
        },
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => app::show_config(&config, store.as_ref())?,
            ConfigAction::Set { key, value } => {
                app::set_delivery_setting(store.as_ref(), &key, &value)?
            }
        },
    }

    Ok(())
}
