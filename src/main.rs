use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;

use taskers::app::App;
use taskers::settings::{self, Settings};
use taskers::{logging, ui, ConfirmationGate, HttpTaskRepository, TaskStore};

/// Terminal client for a remote task list.
#[derive(Parser, Debug)]
#[command(name = "taskers", version, about)]
struct Cli {
    /// Settings file (defaults to ~/.taskers/settings.json).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the task service.
    #[arg(long)]
    api_url: Option<String>,

    /// Log filter, e.g. `debug` or `taskers=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => settings::load_settings_from_path(path),
            None => settings::load_settings(),
        }
        .context("failed to load settings")?;

        if let Some(url) = &self.api_url {
            settings.api.base_url.clone_from(url);
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        settings.validate().context("invalid settings")?;
        Ok(settings)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    logging::init_subscriber(&settings.logging.level, &settings.logging.file).with_context(|| {
        format!("failed to open log file {}", settings.logging.file.display())
    })?;
    info!(api = %settings.api.base_url, "starting taskers");

    let repository = HttpTaskRepository::new(&settings.api.base_url, settings.request_timeout())?;
    let store = Arc::new(TaskStore::new(Arc::new(repository), settings.notification_display()));
    let gate = Arc::new(ConfirmationGate::new(Arc::clone(&store)));

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = ui::run_app(&mut terminal, App::new(store, gate), settings.tick()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        tracing::error!(error = %err, "terminal loop failed");
    }
    info!("taskers stopped");
    result.context("terminal error")
}
