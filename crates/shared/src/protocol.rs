use serde::{Deserialize, Serialize};

use crate::domain::{Article, ArticleId, BundleRef, FileLocator};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListArticlesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListArticlesResponse {
    #[serde(default)]
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBundleRequest {
    pub article_ids: Vec<ArticleId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBundleResponse {
    pub filepath: FileLocator,
    pub filename: String,
    pub article_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_title: Option<String>,
}

impl From<CreateBundleResponse> for BundleRef {
    fn from(value: CreateBundleResponse) -> Self {
        Self {
            locator: value.filepath,
            filename: value.filename,
            article_count: value.article_count,
            digest_title: value.digest_title,
        }
    }
}

/// Body shared by the deliver and download endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleFileRequest {
    pub filepath: FileLocator,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_title: Option<String>,
}

impl BundleFileRequest {
    pub fn for_delivery(bundle: &BundleRef) -> Self {
        Self {
            filepath: bundle.locator.clone(),
            filename: bundle.filename.clone(),
            digest_title: bundle.digest_title.clone(),
        }
    }

    pub fn for_download(bundle: &BundleRef) -> Self {
        Self {
            filepath: bundle.locator.clone(),
            filename: bundle.filename.clone(),
            digest_title: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
