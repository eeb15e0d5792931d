use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::model::Block;

/// Body of a database query request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRequest {
    pub page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorts: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultsPage<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Single requests against the content source.
///
/// Implementations report rate limiting as an error for which
/// [`RemoteError::is_rate_limited`] holds; they never retry themselves.
pub trait ContentSource: Send + Sync {
    /// Fetch a database object (title, properties schema).
    fn retrieve_database(
        &self,
        database_id: &str,
        token: &str,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Fetch one page of rows. Rows come back as raw page objects.
    fn query_database(
        &self,
        database_id: &str,
        token: &str,
        query: &QueryRequest,
    ) -> impl Future<Output = Result<ResultsPage<Value>, RemoteError>> + Send;

    /// Fetch one page of a block's direct children.
    fn list_children(
        &self,
        block_id: &str,
        token: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> impl Future<Output = Result<ResultsPage<Block>, RemoteError>> + Send;
}

/// HTTP client for the hosted API.
#[derive(Debug, Clone)]
pub struct HttpContentSource {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl HttpContentSource {
    pub fn new(config: RemoteConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: RemoteConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
    ) -> Result<reqwest::RequestBuilder, RemoteError> {
        let url = self.config.endpoint(path)?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("Notion-Version", &self.config.api_version))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RemoteError::from_response(status.as_u16(), &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl ContentSource for HttpContentSource {
    async fn retrieve_database(
        &self,
        database_id: &str,
        token: &str,
    ) -> Result<Value, RemoteError> {
        debug!(database = %database_id, "retrieving database");
        let request = self.request(
            reqwest::Method::GET,
            &format!("databases/{database_id}"),
            token,
        )?;
        self.send(request).await
    }

    async fn query_database(
        &self,
        database_id: &str,
        token: &str,
        query: &QueryRequest,
    ) -> Result<ResultsPage<Value>, RemoteError> {
        debug!(
            database = %database_id,
            page_size = query.page_size,
            cursor = ?query.start_cursor,
            "querying database"
        );
        let request = self
            .request(
                reqwest::Method::POST,
                &format!("databases/{database_id}/query"),
                token,
            )?
            .json(query);
        self.send(request).await
    }

    async fn list_children(
        &self,
        block_id: &str,
        token: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ResultsPage<Block>, RemoteError> {
        debug!(block = %block_id, page_size, cursor = ?cursor, "listing block children");
        let mut request = self
            .request(
                reqwest::Method::GET,
                &format!("blocks/{block_id}/children"),
                token,
            )?
            .query(&[("page_size", page_size.to_string())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("start_cursor", cursor)]);
        }
        self.send(request).await
    }
}
