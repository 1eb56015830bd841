use notes_ai::cli::{Cli, Command};
use notes_ai::commands::{ai, listen};
use notes_ai::error::AppError;
use notes_ai::logger::initialize as LoggerInitialize;
use notes_ai::paths::AppPaths;
use notes_ai::state::AppState;

use ai_client::config::AppConfig;
use ai_client::credentials;

use common::ErrorLocation;

use std::io::stdout;
use std::panic::Location;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            match serde_json::to_string_pretty(&e) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{e}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let paths = AppPaths::resolve(cli.config_dir.as_deref(), cli.log_dir.as_deref())?;
    paths.ensure_exists()?;

    // before config so load failures reach notes-ai.log
    LoggerInitialize(&paths.log_dir, cli.verbose)?;

    info!("notes-ai starting");
    info!("Config directory: {}", paths.config_dir.display());

    let config = AppConfig::load(&paths.config_dir)?;
    let token = credentials::load_token(&paths.config_dir)?.map(|loaded| {
        info!("Token source: {}", loaded.source);
        loaded.token
    });
    if token.is_none() {
        warn!("No API token configured; requests are sent without Authorization");
    }

    let state = AppState::new(config, token)?;
    state.start();

    let signal = CancellationToken::new();
    let ctrl_c = signal.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, cancelling");
                ctrl_c.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
        }
    });

    let result = match &cli.command {
        Command::Summarize(args) => ai::summarize(&state, args, &signal)
            .await
            .and_then(|summary| print_json(&summary)),
        Command::Flashcards(args) => ai::flashcards(&state, args, &signal)
            .await
            .and_then(|cards| print_json(&cards)),
        Command::Tags(args) => ai::tags(&state, args, &signal)
            .await
            .and_then(|tags| print_json(&tags)),
        Command::Listen => listen::listen(&state, &signal, &mut stdout())
            .await
            .map(|_| ()),
    };

    state.shutdown().await;
    info!("notes-ai finished");

    result
}

fn print_json(value: &impl Serialize) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AppError::App {
        message: format!("Failed to encode output: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;
    println!("{json}");
    Ok(())
}
