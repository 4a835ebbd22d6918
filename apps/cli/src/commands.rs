//! CLI command definitions, routing, and tracing setup.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use lodebot_core::{
    AnnouncementScheduler, ClassTable, CommandRouter, IncomingMessage, KNOWN_UPSTREAM_CLASS_IDS,
    LookupRequest, ProgressReporter, ResolutionPipeline, format_summary,
};
use lodebot_lookup::LookupClient;
use lodebot_shared::{AppConfig, LookupConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// lodebot — character lookups and scheduled announcements.
#[derive(Parser)]
#[command(
    name = "lodebot",
    version,
    about = "Look up game characters by name or id and run the community chat bot.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.lodebot/lodebot.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search a world for a character by full name.
    Lookup {
        /// World (server) name, e.g. Gilgamesh.
        world: String,
        forename: String,
        surname: String,
    },

    /// Fetch a character by numeric id.
    LookupId {
        id: String,
    },

    /// Run the bot: route chat lines from stdin and fire scheduled announcements
    /// until stdin closes or ctrl-c.
    Run,

    /// Print the announcement schedule and the next run of each trigger.
    Schedule,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lodebot=info",
        1 => "lodebot=debug",
        _ => "lodebot=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so replies on stdout stay clean.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Lookup {
            world,
            forename,
            surname,
        } => {
            let request = LookupRequest::Search {
                world,
                forename,
                surname,
            };
            cmd_lookup(config_path, request).await
        }
        Command::LookupId { id } => cmd_lookup(config_path, LookupRequest::DirectId(id)).await,
        Command::Run => cmd_run(config_path).await,
        Command::Schedule => cmd_schedule(config_path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Wire the pipeline from config. Refuses to start on a class table that
/// does not cover every id upstream is known to return.
fn build_pipeline(config: &AppConfig) -> Result<ResolutionPipeline> {
    let classes = ClassTable::builtin().with_overrides(&config.classes)?;
    classes.validate_complete(KNOWN_UPSTREAM_CLASS_IDS)?;
    debug!(classes = classes.len(), "class table ready");

    let client = LookupClient::new(LookupConfig::try_from(config)?)?;
    Ok(ResolutionPipeline::new(client, Arc::new(classes)))
}

// ---------------------------------------------------------------------------
// One-shot lookups
// ---------------------------------------------------------------------------

async fn cmd_lookup(config_path: Option<&Path>, request: LookupRequest) -> Result<()> {
    let config = load(config_path)?;
    let pipeline = build_pipeline(&config)?;
    info!(%request, "looking up character");

    let progress = CliProgress::new();
    let outcome = pipeline.run_with_progress(request, &progress).await;
    progress.finish();

    match outcome {
        Ok(resolved) => {
            println!("{}", format_summary(&resolved).to_plain_text());
            Ok(())
        }
        Err(err) => Err(eyre!("{}: {err}", err.kind().user_message())),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner showing the pipeline state while a lookup runs.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.replace('_', " "));
    }
}

// ---------------------------------------------------------------------------
// Bot loop
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let pipeline = build_pipeline(&config)?;
    let router = Arc::new(CommandRouter::new(
        config.bot.prefix.clone(),
        pipeline,
        &config.announcements,
    ));
    let scheduler = AnnouncementScheduler::from_config(&config)?;

    info!(prefix = %config.bot.prefix, commands = ?router.command_names(), "lodebot ready");
    info!(schedule = %scheduler.describe(Utc::now()), "announcement schedule");

    let (tx, rx) = mpsc::channel::<IncomingMessage>(64);
    tokio::spawn(scheduler.run(tx.clone()));
    let input_closed = spawn_stdin_reader(tx);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("interrupt received, shutting down");
    };
    let sink: ReplySink = Arc::new(|channel: u64, text: String| println!("[{channel}] {text}"));

    serve(router, rx, input_closed, shutdown, sink).await;
    Ok(())
}

/// Where replies go, as `(channel, text)`.
type ReplySink = Arc<dyn Fn(u64, String) + Send + Sync>;

/// Route every message from `rx` in its own task until the input side
/// closes or `shutdown` resolves, then wait for running commands to reply.
async fn serve(
    router: Arc<CommandRouter>,
    mut rx: mpsc::Receiver<IncomingMessage>,
    mut input_closed: oneshot::Receiver<()>,
    shutdown: impl Future<Output = ()>,
    sink: ReplySink,
) {
    tokio::pin!(shutdown);

    let mut inflight = JoinSet::new();
    loop {
        tokio::select! {
            // Lines already queued are routed before end of input is acted on.
            biased;

            Some(message) = rx.recv() => {
                let router = Arc::clone(&router);
                let sink = Arc::clone(&sink);
                inflight.spawn(async move {
                    let reply = router.handle(&message).await;
                    if let Some(text) = reply.to_plain_text() {
                        sink(message.channel, text);
                    }
                });
            }
            Some(joined) = inflight.join_next() => {
                if let Err(e) = joined {
                    warn!(error = %e, "command task failed");
                }
            }
            _ = &mut input_closed => {
                info!("input closed, shutting down");
                break;
            }
            () = &mut shutdown => break,
        }
    }

    // Dropping the receiver stops the scheduler.
    drop(rx);
    while let Some(joined) = inflight.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "command task failed");
        }
    }
}

/// Forward stdin lines into the command channel from a plain thread, so a
/// blocked read never holds up runtime shutdown. The returned receiver
/// resolves once stdin reaches EOF.
fn spawn_stdin_reader(tx: mpsc::Sender<IncomingMessage>) -> oneshot::Receiver<()> {
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            if tx.blocking_send(parse_line(&line)).is_err() {
                break;
            }
        }
        debug!("stdin closed");
        let _ = done_tx.send(());
    });
    done_rx
}

/// `<channel>\t<text>`, or bare `<text>` for channel 0.
fn parse_line(line: &str) -> IncomingMessage {
    if let Some((channel, text)) = line.split_once('\t') {
        if let Ok(channel) = channel.trim().parse::<u64>() {
            return IncomingMessage {
                channel,
                text: text.to_string(),
            };
        }
    }
    IncomingMessage {
        channel: 0,
        text: line.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Schedule / config
// ---------------------------------------------------------------------------

fn cmd_schedule(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let scheduler = AnnouncementScheduler::from_config(&config)?;
    if scheduler.jobs().is_empty() {
        println!("No announcements configured.");
    } else {
        println!("{}", scheduler.describe(Utc::now()));
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::time::Duration;

    use url::Url;

    #[test]
    fn parse_line_with_channel() {
        let msg = parse_line("42\t!lookupId 12345");
        assert_eq!(msg.channel, 42);
        assert_eq!(msg.text, "!lookupId 12345");
    }

    #[test]
    fn parse_line_without_channel() {
        let msg = parse_line("!events");
        assert_eq!(msg.channel, 0);
        assert_eq!(msg.text, "!events");

        // A non-numeric head is part of the text.
        let msg = parse_line("hey\tthere");
        assert_eq!(msg.channel, 0);
        assert_eq!(msg.text, "hey\tthere");
    }

    #[tokio::test]
    async fn serve_stops_when_input_closes() {
        let client = LookupClient::new(LookupConfig::for_base_url(
            Url::parse("http://127.0.0.1:9").unwrap(),
        ))
        .unwrap();
        let pipeline = ResolutionPipeline::new(client, Arc::new(ClassTable::builtin()));
        let router = Arc::new(CommandRouter::new(
            "!",
            pipeline,
            &AppConfig::default().announcements,
        ));

        let (tx, rx) = mpsc::channel(8);
        let (closed_tx, closed_rx) = oneshot::channel();
        tx.send(parse_line("5\t!events")).await.unwrap();
        tx.send(parse_line("just chatting")).await.unwrap();
        closed_tx.send(()).unwrap();

        let replies = Arc::new(Mutex::new(Vec::new()));
        let sink: ReplySink = {
            let replies = Arc::clone(&replies);
            Arc::new(move |channel: u64, text: String| replies.lock().unwrap().push((channel, text)))
        };

        // `tx` stays open the way the scheduler's sender does.
        tokio::time::timeout(
            Duration::from_secs(5),
            serve(router, rx, closed_rx, std::future::pending(), sink),
        )
        .await
        .expect("serve kept running after input closed");
        drop(tx);

        assert_eq!(
            *replies.lock().unwrap(),
            vec![(5, "Sign-ups for this week's events are open!".to_string())]
        );
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::parse_from(["lodebot", "-v", "lookup", "Gilgamesh", "Test", "Character"]);
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Command::Lookup { ref world, .. } if world == "Gilgamesh"));

        let cli = Cli::parse_from(["lodebot", "lookup-id", "12345", "--config", "/tmp/x.toml"]);
        assert!(matches!(cli.command, Command::LookupId { ref id } if id == "12345"));
        assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/x.toml")));
    }
}
