//! logrelay - sign in, relay the ID token to the log server, watch its logs.
//!
//! With no arguments the terminal UI starts on the log page. The flags run
//! a single action from the command line instead.

mod app;
mod bridge;
mod services;
mod ui;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use logrelay_core::{Config, Destination, LogClient, NoticeKind, Notifier, ViewBinding};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AppState};
use bridge::ChannelBridge;
use services::Services;
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_PREFIX: &str = "logrelay.log";

const USAGE: &str = "\
Usage: logrelay [OPTION]

With no option, start the terminal UI.

Options:
  --login          Sign in from the terminal and relay the ID token
  --logout         Sign out and clear the relayed token
  --emit <MSG>     Append a message to the server log
  -h, --help       Show this help";

enum Command {
    Tui,
    Login,
    Logout,
    Emit(String),
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        None => Ok(Command::Tui),
        Some("--login") => Ok(Command::Login),
        Some("--logout") => Ok(Command::Logout),
        Some("--emit") => {
            let message = args[1..].join(" ");
            if message.trim().is_empty() {
                anyhow::bail!("--emit needs a message");
            }
            Ok(Command::Emit(message))
        }
        Some("-h") | Some("--help") => Ok(Command::Help),
        Some(other) => anyhow::bail!("Unknown option: {}\n\n{}", other, USAGE),
    }
}

/// Initialize the tracing subscriber for logging.
///
/// The UI owns the terminal, so it logs to a daily file in the cache
/// directory; command-line modes log to stderr. Use RUST_LOG to control
/// the level (e.g. RUST_LOG=logrelay_core=debug).
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

/// Notices and navigation for the command-line modes
struct ConsoleView;

impl Notifier for ConsoleView {
    fn notify(&self, kind: NoticeKind, message: &str) {
        eprintln!("[{}] {}", kind.label(), message);
    }
}

impl ViewBinding for ConsoleView {
    fn reveal(&self) {}

    fn navigate(&self, destination: Destination) {
        match destination {
            Destination::ViewLogs => eprintln!("Token accepted by the log server"),
            Destination::Login => eprintln!("Not signed in"),
        }
    }

    fn render_log(&self, text: &str) {
        print!("{}", text);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let mut config = Config::load()?;
    config.apply_env();

    match command {
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        Command::Tui => {
            let log_dir = config.cache_dir()?;
            std::fs::create_dir_all(&log_dir)
                .with_context(|| format!("Failed to create {}", log_dir.display()))?;
            let _guard = init_tracing(Some(&log_dir));
            run_tui(config).await
        }
        Command::Login => {
            let _guard = init_tracing(None);
            login(config).await
        }
        Command::Logout => {
            let _guard = init_tracing(None);
            logout(config).await
        }
        Command::Emit(message) => {
            let _guard = init_tracing(None);
            let client = LogClient::new(&config.server()?)?;
            let reply = client.append(&message).await?;
            println!("{}", reply);
            Ok(())
        }
    }
}

async fn login(mut config: Config) -> Result<()> {
    let view = Arc::new(ConsoleView);
    let services = Services::build(&config, view.clone(), view)?;

    let default_email = config.last_email.clone().unwrap_or_default();
    if default_email.is_empty() {
        eprint!("Email: ");
    } else {
        eprint!("Email [{}]: ", default_email);
    }
    io::stderr().flush()?;

    let mut email = String::new();
    io::stdin().lock().read_line(&mut email)?;
    let email = match email.trim() {
        "" => default_email,
        typed => typed.to_string(),
    };
    let password = rpassword::prompt_password("Password: ")?;

    if email.is_empty() || password.is_empty() {
        anyhow::bail!("Email and password required");
    }

    config.last_email = Some(email.clone());
    config.save()?;

    let result = services.auth.sign_in(&email, &password).await;
    services.auth.shutdown();
    result?;
    Ok(())
}

async fn logout(config: Config) -> Result<()> {
    let view = Arc::new(ConsoleView);
    let services = Services::build(&config, view.clone(), view)?;

    let result = services.auth.sign_out().await;
    services.auth.shutdown();
    result?;
    Ok(())
}

async fn run_tui(config: Config) -> Result<()> {
    info!(server = %config.server_url, "logrelay starting");

    let (bridge, events) = ChannelBridge::new();
    let bridge = Arc::new(bridge);
    let services = Services::build(&config, bridge.clone(), bridge)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, services, events);
    app.start();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("logrelay shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Apply events from background tasks
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
