use crate::cli::{FlashcardsArgs, SummarizeArgs, TagsArgs};
use crate::commands::read_note;
use crate::error::AppError;
use crate::state::AppState;

use ai_client::CallOptions;
use ai_client::executor::RetryProgress;

use models::{AiSummary, Flashcard, SummaryOptions, TagSuggestion};

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

fn call_options(signal: &CancellationToken) -> CallOptions {
    CallOptions::new()
        .with_signal(signal.clone())
        .on_retry(|progress: &RetryProgress| {
            warn!(
                "Request {} attempt {} failed ({}), retrying in {:?}",
                progress.request_id,
                progress.attempt + 1,
                progress.error,
                progress.delay
            );
        })
}

/// Summarize the note at `args.file`.
pub async fn summarize(
    state: &AppState,
    args: &SummarizeArgs,
    signal: &CancellationToken,
) -> Result<AiSummary, AppError> {
    let content = read_note(&args.file)?;
    let options = SummaryOptions {
        max_length: args.max_length,
        style: args.style.into(),
        include_key_points: !args.no_key_points,
        language: args.language.clone(),
    };

    let summary = state
        .service()
        .generate_summary(&content, &options, &call_options(signal))
        .await
        .map_err(|e| {
            error!("Summarize failed: {e}");
            AppError::from(e)
        })?;

    info!("Summary generated ({} key points)", summary.key_points.len());
    Ok(summary)
}

pub async fn flashcards(
    state: &AppState,
    args: &FlashcardsArgs,
    signal: &CancellationToken,
) -> Result<Vec<Flashcard>, AppError> {
    let content = read_note(&args.file)?;

    let cards = state
        .service()
        .generate_flashcards(
            &content,
            args.count,
            args.difficulty.into(),
            &call_options(signal),
        )
        .await
        .map_err(|e| {
            error!("Flashcard generation failed: {e}");
            AppError::from(e)
        })?;

    info!("Generated {} flashcards", cards.len());
    Ok(cards)
}

pub async fn tags(
    state: &AppState,
    args: &TagsArgs,
    signal: &CancellationToken,
) -> Result<Vec<TagSuggestion>, AppError> {
    let content = read_note(&args.file)?;

    let suggestions = state
        .service()
        .suggest_tags(&content, &args.existing, &call_options(signal))
        .await
        .map_err(|e| {
            error!("Tag suggestion failed: {e}");
            AppError::from(e)
        })?;

    info!("Suggested {} tags", suggestions.len());
    Ok(suggestions)
}
