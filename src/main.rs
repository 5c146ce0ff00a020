mod advisor;
mod app;
mod batch;
mod browser;
mod client;
mod config;
mod directory;
mod error;
mod event;
mod session;
mod ui;

use std::io;
use std::time::Instant;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::AppConfig;

/// Send `tracing` output to the log file. Nothing may reach stdout while the
/// UI owns the terminal, so with file logging off no subscriber is installed.
fn init_logging(config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
    if !config.settings.log_to_file {
        return Ok(None);
    }
    let dir = AppConfig::config_dir();
    std::fs::create_dir_all(&dir)?;
    let appender = tracing_appender::rolling::never(&dir, config::LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load();
    let _log_guard = init_logging(&config)?;
    info!(
        "Starting amq-explorer with {} saved connection(s)",
        config.connections.len()
    );
    let mut app = App::new(config);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        tracing::error!("Terminal loop failed: {}", e);
        eprintln!("Error: {}", e);
    }
    info!("Exiting");

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| {
            ui::layout::render(frame, app);
        })?;

        if !event::handle_events(app)? {
            break;
        }

        // ──────── Poll background task results ────────
        while let Ok(event) = app.bg_rx.try_recv() {
            app.apply_bg_event(event);
        }

        // ──────── Async action dispatch ────────
        // Broker calls run on spawned tasks and report back through `bg_rx`.
        app.tick(Instant::now());
        app.dispatch_pending();
    }

    Ok(())
}
