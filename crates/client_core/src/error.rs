use shared::domain::ArticleId;
use thiserror::Error;

use crate::BackendError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("{0}")]
    FetchFailed(String),
    #[error("{0}")]
    BundleCreation(String),
    #[error("{0}")]
    Delivery(String),
    #[error("{0}")]
    Download(String),
    /// Redirect signal, never shown to the user.
    #[error("authentication required")]
    AuthRequired,
    #[error("article {0} is not in the current collection")]
    UnknownArticle(ArticleId),
}

impl ControllerError {
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ControllerError::AuthRequired)
    }

    pub fn is_user_visible(&self) -> bool {
        !self.requires_reauth()
    }
}

/// Collaborator call a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    ListArticles,
    CreateBundle,
    Deliver,
    Download,
}

impl Operation {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Operation::ListArticles => "list_articles",
            Operation::CreateBundle => "create_bundle",
            Operation::Deliver => "deliver_bundle",
            Operation::Download => "download_bundle",
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            Operation::ListArticles => "Failed to fetch articles",
            Operation::CreateBundle => "Failed to create EPUB",
            Operation::Deliver => "Failed to send to Kindle",
            Operation::Download => "Failed to download EPUB",
        }
    }

    pub(crate) fn error(self, message: impl Into<String>) -> ControllerError {
        let message = message.into();
        match self {
            Operation::ListArticles => ControllerError::FetchFailed(message),
            Operation::CreateBundle => ControllerError::BundleCreation(message),
            Operation::Deliver => ControllerError::Delivery(message),
            Operation::Download => ControllerError::Download(message),
        }
    }

    pub(crate) fn classify(self, err: &BackendError) -> ControllerError {
        if matches!(err, BackendError::AuthRequired) {
            return ControllerError::AuthRequired;
        }
        let message = err
            .message()
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| self.default_message());
        self.error(message)
    }
}
