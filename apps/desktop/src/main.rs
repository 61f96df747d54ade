use std::{collections::HashSet, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    view::{self, SortDirection, SortState},
    ControllerError, ControllerOptions, HttpReaderBackend, SelectionController,
};
use shared::domain::ArticleId;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod render;
mod shell;
mod sink;

use cli::{Cli, Command, Selection};
use config::Settings;
use sink::DirectorySink;

/// Exit status when the server asked for a fresh sign-in.
const EXIT_SIGN_IN: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }

    info!(server_url = %settings.server_url, "using reader service");
    let backend = HttpReaderBackend::new(&settings.server_url, settings.request_timeout())?;
    if let Some(password) = settings.password.as_deref() {
        backend
            .login(password)
            .await
            .with_context(|| format!("signing in to {}", backend.server_url()))?;
    }

    let controller = SelectionController::with_options(
        Arc::new(backend),
        ControllerOptions {
            phase_pause: settings.phase_pause(),
            ..ControllerOptions::default()
        },
    );
    let progress = render::spawn_progress_printer(controller.subscribe_events());

    let outcome = run(cli.command, &settings, controller).await;
    // The controller is gone now, so the printer drains and stops.
    render::wait_for_printer(progress).await;

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if needs_sign_in(&err) => Ok(ExitCode::from(EXIT_SIGN_IN)),
        Err(err) => Err(err),
    }
}

fn needs_sign_in(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ControllerError>()
        .is_some_and(ControllerError::requires_reauth)
}

async fn run(command: Command, settings: &Settings, controller: Arc<SelectionController>) -> Result<()> {
    match command {
        Command::List {
            location,
            search,
            sort,
            desc,
            json,
        } => {
            let location = location.or_else(|| settings.default_location.clone());
            controller.load(location.as_deref()).await?;

            let order = match sort {
                Some(key) => SortState {
                    key,
                    direction: if desc {
                        SortDirection::Descending
                    } else {
                        SortDirection::Ascending
                    },
                },
                None => SortState::default(),
            };
            let collection = controller.collection().await;
            let visible = view::project(&collection, search.as_deref().unwrap_or(""), order);
            if json {
                println!("{}", serde_json::to_string_pretty(&visible)?);
            } else {
                print!("{}", render::render_table(&visible, &HashSet::new()));
            }
        }
        Command::Send(selection) => {
            apply_selection(&controller, &selection, settings).await?;
            let outcome = controller.create_and_deliver().await?;
            println!("{}", render::delivery_message(&outcome));
        }
        Command::Download { selection, out } => {
            apply_selection(&controller, &selection, settings).await?;
            let sink = DirectorySink::new(out.unwrap_or_else(|| settings.download_dir.clone()));
            let outcome = controller.download(&sink).await?;
            println!("{}", render::download_message(&outcome));
        }
        Command::Shell { location } => {
            let location = location.or_else(|| settings.default_location.clone());
            let sink = DirectorySink::new(settings.download_dir.clone());
            shell::Session::new(controller, sink, location).run().await?;
        }
    }
    Ok(())
}

/// Loads the listing and checks the requested rows.
async fn apply_selection(
    controller: &SelectionController,
    selection: &Selection,
    settings: &Settings,
) -> Result<()> {
    let location = selection
        .location
        .as_deref()
        .or(settings.default_location.as_deref());
    controller.load(location).await?;

    if selection.all {
        let collection = controller.collection().await;
        let visible = view::project(
            &collection,
            selection.search.as_deref().unwrap_or(""),
            SortState::default(),
        );
        controller.select_all(&view::visible_ids(&visible)).await;
    } else {
        for id in &selection.ids {
            controller
                .set_selected(&ArticleId::from(id.as_str()), true)
                .await?;
        }
    }

    eprintln!("{}", render::selection_summary(&controller.derived_stats().await));
    Ok(())
}
