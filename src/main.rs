// ABOUTME: Main entry point for the hubshell remote shell TUI

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, Terminal};
use std::{
    io,
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{error, info};

use hubshell::app::{App, EventHandler, TerminalGuard};
use hubshell::components::LayoutComponent;
use hubshell::config::{AppConfig, Overrides};

/// Remote command shell over HTTP and WebSocket
#[derive(Parser)]
#[command(name = "hubshell")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ~/.hubshell/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server base URL, e.g. http://localhost:9000
    #[arg(long)]
    server: Option<String>,

    /// Root path of the terminal endpoints
    #[arg(long)]
    root: Option<String>,

    /// Topic carrying command results
    #[arg(long)]
    topic: Option<String>,

    /// Require authentication before accepting commands
    #[arg(long, conflicts_with = "no_auth")]
    auth: bool,

    /// Do not start the authentication provider
    #[arg(long)]
    no_auth: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let auth = match (self.auth, self.no_auth) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Overrides {
            server: self.server.clone(),
            root: self.root.clone(),
            topic: self.topic.clone(),
            auth,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();
    setup_panic_handler();

    let path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&path)?;
    config.apply(cli.overrides());
    info!("Connecting to {}{}", config.server, config.root);

    let mut app = App::new(config)?;
    app.init().await?;
    let mut layout = LayoutComponent::new();

    let result = run_tui(&mut app, &mut layout).await;
    app.shutdown().await;
    result
}

async fn run_tui(app: &mut App, layout: &mut LayoutComponent) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let _restore = TerminalGuard::new(|| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        if std::thread::panicking() {
            eprintln!("Application panicked, see the logs in ~/.hubshell/logs for details.");
        }
    });
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| {
            layout.render(frame, &app.state);
        })?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout)? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press {
                    if let Some(app_event) = EventHandler::handle_key_event(key_event, &app.state) {
                        EventHandler::process_event(app_event, &mut app.state);
                    }
                }
            }
        }

        // Submitted lines are handled right away instead of waiting for the tick
        if last_tick.elapsed() >= tick_rate || app.state.pending_action.is_some() {
            if let Err(e) = app.tick().await {
                error!("Error during app tick: {}", e);
            }
            last_tick = Instant::now();
        }

        if app.state.should_quit {
            break;
        }
    }

    terminal.show_cursor()?;

    Ok(())
}

fn setup_logging() {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    // Never log to the terminal the shell is drawn on
    let log_dir = AppConfig::config_dir().join("logs");
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Cannot create log directory {}: {}", log_dir.display(), e);
        return;
    }

    let log_file = log_dir.join(format!(
        "hubshell-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    let file = match OpenOptions::new().create(true).append(true).open(&log_file) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file {}: {}", log_file.display(), e);
            return;
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hubshell=info".into()),
        )
        .init();
}

/// Only logs: the hook also runs for panics the hub recovers from, and the
/// terminal is restored by the guard in `run_tui` once a panic leaves the loop
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Panic: {}", panic_info);
    }));
}
