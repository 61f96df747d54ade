//! Plain-text rendering of the article table and controller progress.

use std::collections::HashSet;

use client_core::{ControllerEvent, DeliveryOutcome, DerivedStats, DownloadOutcome};
use shared::domain::{Article, ArticleId};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::warn;

const TITLE_WIDTH: usize = 40;
const PERSON_WIDTH: usize = 18;

pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

pub fn selection_summary(stats: &DerivedStats) -> String {
    let mut summary = format!("{} selected", stats.count);
    if stats.total_words > 0 {
        summary.push_str(&format!(
            " (~{} min read, {} words)",
            stats.estimated_minutes,
            group_thousands(stats.total_words)
        ));
    }
    summary
}

pub fn render_table(visible: &[&Article], selected: &HashSet<ArticleId>) -> String {
    if visible.is_empty() {
        return "No articles found\n".to_string();
    }

    let id_width = visible
        .iter()
        .map(|article| article.id.as_str().chars().count())
        .max()
        .unwrap_or(2)
        .max(2);

    let mut out = format!(
        "    {:<id_width$}  {:<TITLE_WIDTH$}  {:<PERSON_WIDTH$}  {:<PERSON_WIDTH$}  {:>14}  {:<9}  {}\n",
        "ID", "TITLE", "AUTHOR", "SITE", "WORDS", "LOCATION", "SAVED"
    );
    for article in visible {
        let mark = if selected.contains(&article.id) { "[x]" } else { "[ ]" };
        let words = format!(
            "{} (~{}m)",
            group_thousands(article.words()),
            article.reading_minutes()
        );
        let saved = article
            .created_at
            .map(|created| created.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let location = if article.location.is_empty() {
            "-"
        } else {
            article.location.as_str()
        };
        out.push_str(&format!(
            "{mark} {:<id_width$}  {:<TITLE_WIDTH$}  {:<PERSON_WIDTH$}  {:<PERSON_WIDTH$}  {:>14}  {:<9}  {}\n",
            article.id.as_str(),
            truncate(&article.title, TITLE_WIDTH),
            truncate(article.author.as_deref().unwrap_or("-"), PERSON_WIDTH),
            truncate(article.site_name.as_deref().unwrap_or("-"), PERSON_WIDTH),
            words,
            location,
            saved,
        ));
    }
    out
}

pub const NOTHING_SELECTED: &str = "Select at least one article first.";

pub fn delivery_message(outcome: &DeliveryOutcome) -> String {
    match outcome {
        DeliveryOutcome::NothingSelected => NOTHING_SELECTED.to_string(),
        DeliveryOutcome::Delivered { article_count, .. } => {
            format!("Sent {article_count} articles to your Kindle!")
        }
    }
}

pub fn download_message(outcome: &DownloadOutcome) -> String {
    match outcome {
        DownloadOutcome::NothingSelected => NOTHING_SELECTED.to_string(),
        DownloadOutcome::Saved {
            path,
            size_bytes,
            article_count,
            ..
        } => format!(
            "Saved {article_count} articles to {} ({} bytes)",
            path.display(),
            group_thousands(*size_bytes as u64)
        ),
    }
}

/// Prints loading and phase transitions to stderr. Ends after an auth
/// redirect has been shown, or when the controller is dropped.
pub fn spawn_progress_printer(mut events: broadcast::Receiver<ControllerEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ControllerEvent::Loading { active: true }) => eprintln!("Loading articles..."),
                Ok(ControllerEvent::Phase(phase)) => eprintln!("{}", phase.label()),
                Ok(ControllerEvent::AuthRedirect { login_url }) => {
                    eprintln!("Sign-in required. Continue at {login_url}");
                    return;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
}

/// Joins the printer task; returns false if it panicked or was cancelled.
pub async fn wait_for_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "progress printer stopped abnormally");
            false
        }
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
