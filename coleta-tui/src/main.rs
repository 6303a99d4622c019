//! Terminal UI for coleta that lets users pick a municipality and materials and browse collection points.

mod app;
mod config;
mod input;
mod location;
mod ui;

use std::{
    fs::File,
    io,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use anyhow::{Context as _, Result, anyhow};
use clap::Parser as _;
use coleta_core::{plugin::BackendRegistry, service::DiscoveryService};
use coleta_provider_ecoleta as ecoleta;
use coleta_provider_rest as rest;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tracing_subscriber::EnvFilter;

use crate::app::{App, Screen};
use crate::config::Config;
use crate::input::Action;
use crate::location::ConfiguredLocation;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config.validate().map_err(|msg| anyhow!(msg))?;

    init_logging(&config)?;
    tracing::info!(
        backend = ?config.backend,
        api_url = %config.api_url,
        timeout_secs = config.timeout_secs,
        debounce_ms = config.debounce_ms,
        "starting coleta"
    );

    // HTTP + service setup
    let client = Client::builder()
        .user_agent("coleta/0.1")
        .timeout(config.request_timeout())
        .build()?;

    let plugins = vec![
        rest::plugin(client.clone(), &config.api_url),
        ecoleta::plugin(client, &config.api_url, &config.localities_url),
    ];
    let registry = BackendRegistry::new(plugins);
    let location = Arc::new(ConfiguredLocation::new(config.device_position()));
    let service = Arc::new(DiscoveryService::from_registry(
        &registry,
        &config.backend.id(),
        location,
        config.coordinator_config(),
    )?);

    // App state
    let mut app = App::new(service);
    app.viewport = app.service.initial_viewport().await;
    load_options(&mut app).await;

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn init_logging(config: &Config) -> Result<()> {
    let file = File::create(&config.log_file)
        .with_context(|| format!("cannot open log file {}", config.log_file.display()))?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coleta_core=debug,coleta_tui=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn load_options(app: &mut App) {
    match app.service.load_options().await {
        Ok(options) => {
            app.options = options;
            app.region_list_index = 0;
            app.category_list_index = 0;
            app.error_message = None;
        }
        Err(err) => {
            tracing::error!(error = %err, kind = %err.kind(), "failed to load catalog options");
            app.error_message = Some(format!("Failed to load regions and materials: {err}"));
        }
    }
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    let mut snapshots = app.service.coordinator().subscribe();

    loop {
        // Pick up whatever the coordinator committed since the last frame
        let snapshot = snapshots.borrow_and_update().clone();
        app.refresh(snapshot);

        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::ReloadOptions => {
                    app.is_loading = true;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    load_options(&mut app).await;
                    app.is_loading = false;
                }
                Action::LoadPointDetail(id) => {
                    app.is_loading = true;
                    app.error_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let res = app.service.point_detail(id).await;

                    app.is_loading = false;
                    match res {
                        Ok(detail) => {
                            app.detail = Some(detail);
                            app.screen = Screen::PointDetail;
                        }
                        Err(err) => {
                            tracing::warn!(point = %id, error = %err, "point detail failed");
                            app.error_message = Some(format!("Failed to load point: {err}"));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
