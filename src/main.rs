// src/main.rs
//! Usage Guard command line
//!
//! `run` plays the host: it reads UI events as JSON lines, feeds them to
//! the monitor and enforces the block-list with desktop stand-ins for the
//! host services. `history` and `policy` inspect and edit the stores a
//! monitor would use.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, trace, warn};

use usage_guard::api::ControlSurface;
use usage_guard::config::MonitorConfig;
use usage_guard::core::event_types::{EventKind, ExtractedSignal, MonitorListener, MonitoredEvent};
use usage_guard::core::monitor::{Monitor, SessionSummary};
use usage_guard::core::policy::PolicyChannel;
use usage_guard::host::json_tree::{HandleLedger, JsonNode, NodeSpec};
use usage_guard::host::system::{ConsoleNotifier, StaticAppDirectory, SystemProcessControl};
use usage_guard::host::HostBindings;
use usage_guard::storage::history::{HistoryStore, MemoryHistoryStore, SqliteHistoryStore};
use usage_guard::storage::policy_store::{JsonPolicyStore, MemoryPolicyStore, PolicyStore};

/// Command line interface for usage guard
#[derive(Debug, Parser)]
#[command(
    name = "usage-guard",
    version,
    about = "Browser history logging and application blocking from UI events",
    long_about = "Scans host UI trees for browser address-bar text, keeps a de-duplicated browsing history and sends blocked applications back to the home surface."
)]
struct Args {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level for logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for events and listings
    #[arg(long, default_value = "human", value_enum, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Feed host events to a monitor until EOF or Ctrl-C
    Run {
        /// Read events from a file instead of stdin
        #[arg(long)]
        events: Option<PathBuf>,

        /// Write structured events to file
        #[arg(long)]
        output_file: Option<PathBuf>,

        /// Keep history and block-list in memory only
        #[arg(long)]
        in_memory: bool,
    },
    /// List the browsing history, newest first
    History {
        /// Remove every entry instead
        #[arg(long)]
        clear: bool,
    },
    /// Inspect or edit the block-list
    Policy {
        #[command(subcommand)]
        action: PolicyCommand,
    },
}

#[derive(Debug, Subcommand)]
enum PolicyCommand {
    Show,
    /// Replace the block-list with the given application ids
    Set { ids: Vec<String> },
    Clear,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for programmatic processing
    Json,
}

/// One line of host input.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostMessage {
    Event {
        app: String,
        #[serde(default)]
        kind: EventKind,
        #[serde(default)]
        root: Option<NodeSpec>,
    },
    UpdatePolicy {
        blocked: Vec<String>,
    },
    ReloadPolicy,
}

struct GuardApp {
    args: Args,
    config: MonitorConfig,
    start_time: Instant,
}

impl GuardApp {
    fn new(args: Args) -> Result<Self> {
        Self::setup_logging(&args);

        let config = match &args.config {
            Some(path) => MonitorConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => MonitorConfig::default(),
        };
        info!("🚀 Starting Usage Guard v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration: {:#?}", config);

        Ok(Self {
            args,
            config,
            start_time: Instant::now(),
        })
    }

    async fn run(self) -> Result<()> {
        match &self.args.command {
            Command::Run {
                events,
                output_file,
                in_memory,
            } => self.run_monitor(events.clone(), output_file.clone(), *in_memory).await,
            Command::History { clear } => self.history(*clear).await,
            Command::Policy { action } => self.policy(action),
        }
    }

    async fn run_monitor(
        &self,
        events: Option<PathBuf>,
        output_file: Option<PathBuf>,
        in_memory: bool,
    ) -> Result<()> {
        let (history, policy_store): (Arc<dyn HistoryStore>, Arc<dyn PolicyStore>) = if in_memory {
            info!("💭 In-memory stores, nothing will be saved");
            (Arc::new(MemoryHistoryStore::new()), Arc::new(MemoryPolicyStore::new()))
        } else {
            (
                Arc::new(self.open_history().await?),
                Arc::new(JsonPolicyStore::new(&self.config.policy_path)),
            )
        };

        let mut monitor = Monitor::new(&self.config, history, policy_store, self.host_bindings())
            .context("Failed to set up monitor")?;
        monitor.add_listener(BasicEventLogger::new(self.args.format));
        if let Some(path) = output_file {
            let file_logger = FileEventLogger::new(path.clone())?;
            monitor.add_listener(file_logger);
            info!("📁 File output enabled: {}", path.display());
        }
        let control = monitor.control_surface();

        monitor.start().context("Failed to start monitoring")?;

        let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &events {
            Some(path) => Box::new(BufReader::new(
                tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open events file {}", path.display()))?,
            )),
            None => Box::new(BufReader::new(tokio::io::stdin())),
        };
        let ledger = Arc::new(HandleLedger::default());
        self.feed_events(&mut monitor, reader, &ledger).await;

        let summary = monitor.shutdown().await?;
        self.print_summary(&summary, &ledger, &control);
        Ok(())
    }

    /// Read host messages until EOF or Ctrl-C.
    async fn feed_events(
        &self,
        monitor: &mut Monitor,
        reader: Box<dyn AsyncBufRead + Unpin + Send>,
        ledger: &Arc<HandleLedger>,
    ) {
        let mut lines = reader.lines();
        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);

        info!("👀 Reading host events. Press Ctrl+C to stop gracefully.");
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => Self::dispatch(monitor, ledger, &line),
                    Ok(None) => {
                        info!("End of event stream");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read events: {}", e);
                        break;
                    }
                },
                _ = &mut interrupted => {
                    info!("Interrupted");
                    break;
                }
            }
        }
    }

    fn dispatch(monitor: &mut Monitor, ledger: &Arc<HandleLedger>, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let message: HostMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Skipping malformed event line: {}", e);
                return;
            }
        };

        match message {
            HostMessage::Event { app, kind, root } => {
                let root = root.map(|spec| JsonNode::root(spec, Arc::clone(ledger)));
                let outcome = monitor.handle_event(MonitoredEvent::new(app, kind, root));
                trace!(?outcome, "event handled");
            }
            HostMessage::UpdatePolicy { blocked } => {
                if let Err(e) = monitor.update_policy(blocked) {
                    warn!("⚠️  Block-list not saved: {}", e);
                }
            }
            HostMessage::ReloadPolicy => {
                if let Err(e) = monitor.policy_channel().reload() {
                    warn!("⚠️  Block-list reload failed: {}", e);
                }
            }
        }
    }

    fn print_summary(&self, summary: &SessionSummary, ledger: &HandleLedger, control: &ControlSurface) {
        let elapsed = self.start_time.elapsed();
        let usage = control.usage_report();
        match self.args.format {
            OutputFormat::Human => {
                println!("\n📊 Session summary ({:.2}s)", elapsed.as_secs_f64());
                println!("   Events:          {}", summary.events_seen);
                println!("   Blocked:         {}", summary.events_blocked);
                println!("   Addresses:       {}", summary.signals_accepted);
                println!(
                    "   History writes:  {} ok, {} failed",
                    summary.entries_written, summary.write_failures
                );
                println!(
                    "   Node handles:    {} acquired, {} released, {} outstanding",
                    ledger.acquired(),
                    ledger.released(),
                    ledger.outstanding()
                );
                for (app, time) in &usage.top_apps_by_usage {
                    println!("   ⏰ {}: {:.1}s", app, time.as_secs_f64());
                }
            }
            OutputFormat::Json => {
                let json_summary = serde_json::json!({
                    "type": "summary",
                    "runtime_secs": elapsed.as_secs_f64(),
                    "events": summary.events_seen,
                    "blocked": summary.events_blocked,
                    "addresses": summary.signals_accepted,
                    "history_written": summary.entries_written,
                    "history_failed": summary.write_failures,
                    "handles": {
                        "acquired": ledger.acquired(),
                        "released": ledger.released(),
                        "outstanding": ledger.outstanding(),
                    },
                    "usage": usage,
                });
                println!("{}", json_summary);
            }
        }
        if ledger.outstanding() != 0 {
            error!("❌ {} node handles were never released", ledger.outstanding());
        }
    }

    async fn history(&self, clear: bool) -> Result<()> {
        let store = self.open_history().await?;
        if clear {
            let removed = store.clear().await?;
            println!("🧹 Removed {} history entries", removed);
            store.close().await;
            return Ok(());
        }

        let entries = store.list_all().await?;
        match self.args.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No history yet");
                }
                for entry in &entries {
                    println!("🕒 {}  {}", entry.timestamp, entry.address);
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string(&entries)?),
        }
        store.close().await;
        Ok(())
    }

    fn policy(&self, action: &PolicyCommand) -> Result<()> {
        let channel = PolicyChannel::load(Arc::new(JsonPolicyStore::new(&self.config.policy_path)))
            .context("Failed to load block-list")?;
        let snapshot = match action {
            PolicyCommand::Show => channel.snapshot(),
            PolicyCommand::Set { ids } => channel.update_policy(ids.iter().cloned())?,
            PolicyCommand::Clear => channel.update_policy(Vec::<String>::new())?,
        };

        match self.args.format {
            OutputFormat::Human => {
                if snapshot.is_empty() {
                    println!("No blocked applications");
                }
                for id in snapshot.blocked_application_ids() {
                    println!("🚫 {}", id);
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string(&*snapshot)?),
        }
        Ok(())
    }

    async fn open_history(&self) -> Result<SqliteHistoryStore> {
        SqliteHistoryStore::open(&self.config.database_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open history database {}",
                    self.config.database_path.display()
                )
            })
    }

    fn host_bindings(&self) -> HostBindings {
        HostBindings::new(
            Arc::new(SystemProcessControl::new()),
            Arc::new(ConsoleNotifier::new()),
            Arc::new(StaticAppDirectory::new(self.config.app_names.clone())),
        )
    }

    /// Set up logging based on verbosity level. Logs go to stderr so
    /// stdout carries only event output.
    fn setup_logging(args: &Args) {
        use tracing_subscriber::{fmt, EnvFilter};

        let level = match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(args.verbose > 1)
            .with_thread_ids(args.verbose > 2)
            .init();
    }
}

/// Prints accepted addresses and blocks to stdout
struct BasicEventLogger {
    format: OutputFormat,
    event_count: usize,
}

impl BasicEventLogger {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            event_count: 0,
        }
    }
}

impl MonitorListener for BasicEventLogger {
    fn on_signal(&mut self, signal: &ExtractedSignal) {
        self.event_count += 1;
        match self.format {
            OutputFormat::Human => {
                println!("\n🔗 #{} VISITED: {}", self.event_count, signal.address);
                println!("   At: {}", signal.timestamp());
                println!("   Icon: {}", signal.icon_reference);
            }
            OutputFormat::Json => {
                let json_event = serde_json::json!({
                    "event_number": self.event_count,
                    "type": "visit",
                    "address": signal.address,
                    "icon_reference": signal.icon_reference,
                    "timestamp": signal.timestamp(),
                });
                println!("{}", json_event);
            }
        }
    }

    fn on_block(&mut self, application_id: &str, display_name: &str) {
        self.event_count += 1;
        match self.format {
            OutputFormat::Human => {
                println!("\n🚫 #{} BLOCKED: {} ({})", self.event_count, display_name, application_id);
            }
            OutputFormat::Json => {
                let json_event = serde_json::json!({
                    "event_number": self.event_count,
                    "type": "block",
                    "application_id": application_id,
                    "display_name": display_name,
                    "timestamp": chrono::Local::now().to_rfc3339(),
                });
                println!("{}", json_event);
            }
        }
    }

    fn on_monitoring_started(&mut self) {
        match self.format {
            OutputFormat::Human => println!("🚀 Usage guard started"),
            OutputFormat::Json => {
                let start_event = serde_json::json!({
                    "type": "monitoring_started",
                    "timestamp": chrono::Local::now().to_rfc3339(),
                });
                println!("{}", start_event);
            }
        }
    }

    fn on_monitoring_stopped(&mut self) {
        if let OutputFormat::Human = self.format {
            println!("🛑 Usage guard stopped after {} events", self.event_count);
        }
    }
}

/// Appends every signal and block as one JSON line
struct FileEventLogger {
    file: std::fs::File,
}

impl FileEventLogger {
    fn new(path: PathBuf) -> Result<Self> {
        use std::fs::OpenOptions;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context("Failed to open output file")?;

        Ok(Self { file })
    }

    fn write_line(&mut self, value: serde_json::Value) {
        use std::io::Write;

        if let Err(e) = writeln!(self.file, "{}", value) {
            error!("Failed to write to output file: {}", e);
        }
    }
}

impl MonitorListener for FileEventLogger {
    fn on_signal(&mut self, signal: &ExtractedSignal) {
        self.write_line(serde_json::json!({
            "type": "visit",
            "address": signal.address,
            "icon_reference": signal.icon_reference,
            "timestamp": signal.timestamp(),
        }));
    }

    fn on_block(&mut self, application_id: &str, display_name: &str) {
        self.write_line(serde_json::json!({
            "type": "block",
            "application_id": application_id,
            "display_name": display_name,
            "timestamp": chrono::Local::now().to_rfc3339(),
        }));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let app = GuardApp::new(args).context("Failed to initialize usage guard")?;
    app.run().await.context("Application runtime error")?;

    Ok(())
}
