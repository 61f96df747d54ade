use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{Article, ArticleId, BundleRef},
    protocol::DeliveryAck,
};
use thiserror::Error;

pub mod controller;
pub mod error;
pub mod http;
pub mod view;

pub use controller::{
    ControllerEvent, ControllerOptions, DeliveryOutcome, DerivedStats, DownloadOutcome, Phase,
    SelectionController,
};
pub use error::ControllerError;
pub use http::HttpReaderBackend;

/// Failure reported by a [`ReaderBackend`] call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The session lacks valid credentials; the caller must redirect to login.
    #[error("authentication required")]
    AuthRequired,
    #[error("request rejected with status {status}")]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl BackendError {
    /// Human-readable message supplied by the collaborator, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            BackendError::AuthRequired => None,
            BackendError::Rejected { message, .. } => message.as_deref(),
            BackendError::Transport(message) => Some(message.as_str()),
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// The reader service as seen by the selection controller.
#[async_trait]
pub trait ReaderBackend: Send + Sync {
    async fn list_articles(&self, location: Option<&str>) -> BackendResult<Vec<Article>>;
    async fn create_bundle(&self, article_ids: &[ArticleId]) -> BackendResult<BundleRef>;
    async fn deliver_bundle(&self, bundle: &BundleRef) -> BackendResult<DeliveryAck>;
    async fn download_bundle(&self, bundle: &BundleRef) -> BackendResult<Vec<u8>>;

    /// Where an unauthenticated session is sent to sign in.
    fn login_entry_point(&self) -> String {
        "/login".to_string()
    }
}

/// Persists downloaded bundle bytes on the local machine.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;
}
