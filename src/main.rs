//! termlink
//!
//! Opens one remote shell session through a session host and wires it to the
//! current terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use termlink::config::{ClientConfig, SessionProfile, CONFIG_FILE};
use termlink::hooks::{CredentialPrompt, LoggingHooks, SessionHooks, SessionUi};
use termlink::session::{Geometry, Session, SessionOutcome, SessionRequest, StatusUpdate};
use termlink::surface::{spawn_stdin_reader, LineGate, PromptInput, StdioSurface};
use termlink::transport::{Endpoint, HttpTransport};

/// Remote shell client
///
/// Connects to a session host and streams a shell to this terminal
#[derive(Parser, Debug)]
#[command(name = "termlink")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Saved profile to open
    #[arg(long, conflicts_with = "host")]
    profile: Option<String>,

    /// Remote host to open through the session host
    #[arg(long)]
    host: Option<String>,

    /// SSH port of the remote host
    #[arg(long, requires = "host")]
    port: Option<u16>,

    /// SSH user on the remote host
    #[arg(short, long, requires = "host")]
    user: Option<String>,

    /// Terminal columns
    #[arg(long)]
    cols: Option<u16>,

    /// Terminal rows
    #[arg(long)]
    rows: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn profile(&self, config: &ClientConfig) -> anyhow::Result<SessionProfile> {
        if let Some(title) = &self.profile {
            return match config.profile(title) {
                Some(profile) => Ok(profile.clone()),
                None => bail!("No profile named '{}'", title),
            };
        }

        let Some(host) = &self.host else {
            return Ok(SessionProfile::local());
        };
        let mut profile = SessionProfile::remote(host.as_str());
        if let Some(port) = self.port {
            profile = profile.with_port(port);
        }
        if let Some(user) = &self.user {
            profile = profile.with_username(user.as_str());
        }
        Ok(profile)
    }

    fn geometry(&self) -> Geometry {
        let env = StdioSurface::geometry_from_env(Geometry::default());
        Geometry::new(self.cols.unwrap_or(env.cols), self.rows.unwrap_or(env.rows))
    }
}

/// Status and credential prompt on stderr
struct TerminalUi {
    gate: Arc<LineGate>,
}

impl SessionUi for TerminalUi {
    fn status_changed(&self, session_id: &str, update: StatusUpdate) {
        info!("Session {}: {}", session_id, update.status);
    }

    fn credential_required(&self, _session_id: &str, prompt: &CredentialPrompt) {
        eprintln!("{}", prompt.last_error);
        eprint!("Password: ");
        self.gate.arm();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout belongs to the remote shell
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = ClientConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let profile = args.profile(&config)?;
    let geometry = args.geometry();

    info!(
        "termlink v{} via {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.host,
        config.port
    );

    let transport = Arc::new(HttpTransport::new(Endpoint::new(
        config.host.clone(),
        config.port,
    )));

    let (passwords_tx, mut passwords) = mpsc::unbounded_channel();
    let gate = LineGate::new(passwords_tx);
    let logging = Arc::new(LoggingHooks);
    let hooks = SessionHooks::new(
        logging.clone(),
        logging,
        Arc::new(TerminalUi { gate: gate.clone() }),
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let surface = StdioSurface::new(geometry, events_tx.clone());
    spawn_stdin_reader(events_tx, gate);

    let request = SessionRequest::new(profile, &config).with_geometry(geometry);
    let (controller, mut join) =
        Session::spawn(request, transport, hooks, Box::new(surface), events_rx);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut closing = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut join => break outcome.context("Session task failed")?,
            Some(input) = passwords.recv() => match input {
                PromptInput::Line(password) => {
                    controller.submit_credential(password, false);
                }
                PromptInput::Closed => {
                    controller.cancel_credential();
                }
            },
            _ = &mut shutdown, if !closing => {
                closing = true;
                controller.close();
            }
        }
    };

    match outcome {
        SessionOutcome::Closed => {
            info!("Session closed");
            Ok(())
        }
        SessionOutcome::Errored(e) => Err(e.into()),
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
