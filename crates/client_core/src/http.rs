use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, LOCATION},
    redirect, Client, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Article, ArticleId, BundleRef},
    error::ApiErrorBody,
    protocol::{
        BundleFileRequest, CreateBundleRequest, CreateBundleResponse, DeliveryAck,
        ListArticlesQuery, ListArticlesResponse,
    },
};
use tracing::{debug, info};
use url::Url;

use crate::{BackendError, BackendResult, ReaderBackend};

const LOGIN_PATH: &str = "login";

/// [`ReaderBackend`] over the reader service's JSON API.
///
/// Redirects are not followed: the service answers an unauthenticated request
/// either with 401 or with a redirect to its login page, and both must reach
/// the controller as an auth challenge.
pub struct HttpReaderBackend {
    http: Client,
    server_url: Url,
}

impl HttpReaderBackend {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let mut server_url =
            Url::parse(server_url).with_context(|| format!("invalid server url '{server_url}'"))?;
        if !server_url.path().ends_with('/') {
            let path = format!("{}/", server_url.path());
            server_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        let http = Client::builder()
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;

        Ok(Self { http, server_url })
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    /// Signs in with the shared application password; the session cookie is
    /// kept for every later call.
    pub async fn login(&self, password: &str) -> Result<()> {
        let url = self.server_url.join(LOGIN_PATH)?;
        let response = self
            .http
            .post(url)
            .form(&[("password", password)])
            .send()
            .await
            .context("login request failed")?;

        let status = response.status();
        if status.is_redirection() && !is_login_redirect(&response) {
            info!("signed in to reader service");
            return Ok(());
        }
        if status.is_success() || is_login_redirect(&response) {
            bail!("invalid password");
        }
        Err(anyhow!("login failed with status {status}"))
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.server_url
            .join(path)
            .map_err(|err| BackendError::Transport(format!("invalid endpoint '{path}': {err}")))
    }
}

fn is_login_redirect(response: &Response) -> bool {
    response.status().is_redirection()
        && response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|location| location.contains("/login"))
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || is_login_redirect(&response) {
        debug!(%status, "auth challenge from reader service");
        return Err(BackendError::AuthRequired);
    }
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message().map(str::to_string));
    Err(BackendError::Rejected {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    check_status(response)
        .await?
        .json::<T>()
        .await
        .map_err(|err| BackendError::Transport(format!("invalid response body: {err}")))
}

#[async_trait]
impl ReaderBackend for HttpReaderBackend {
    async fn list_articles(&self, location: Option<&str>) -> BackendResult<Vec<Article>> {
        let query = ListArticlesQuery {
            location: location.map(str::to_string),
        };
        let response = self
            .http
            .get(self.endpoint("api/articles")?)
            .query(&query)
            .send()
            .await
            .map_err(transport)?;
        let body: ListArticlesResponse = read_json(response).await?;
        Ok(body.articles)
    }

    async fn create_bundle(&self, article_ids: &[ArticleId]) -> BackendResult<BundleRef> {
        let response = self
            .http
            .post(self.endpoint("api/create-epub")?)
            .json(&CreateBundleRequest {
                article_ids: article_ids.to_vec(),
            })
            .send()
            .await
            .map_err(transport)?;
        let body: CreateBundleResponse = read_json(response).await?;
        Ok(body.into())
    }

    async fn deliver_bundle(&self, bundle: &BundleRef) -> BackendResult<DeliveryAck> {
        let response = self
            .http
            .post(self.endpoint("api/send-to-kindle")?)
            .json(&BundleFileRequest::for_delivery(bundle))
            .send()
            .await
            .map_err(transport)?;
        read_json(response).await
    }

    async fn download_bundle(&self, bundle: &BundleRef) -> BackendResult<Vec<u8>> {
        let response = self
            .http
            .post(self.endpoint("api/download-epub")?)
            .json(&BundleFileRequest::for_download(bundle))
            .send()
            .await
            .map_err(transport)?;
        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(transport)?;
        Ok(bytes.to_vec())
    }

    fn login_entry_point(&self) -> String {
        self.server_url
            .join(LOGIN_PATH)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}{LOGIN_PATH}", self.server_url))
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
