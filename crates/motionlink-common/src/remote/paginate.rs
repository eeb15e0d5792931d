use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use n0_future::{Stream, StreamExt, pin, stream};
use serde_json::Value;
use tracing::debug;

use super::client::{ContentSource, QueryRequest, ResultsPage};
use super::retry::RetryPolicy;
use crate::config::Credentials;
use crate::error::RemoteError;
use crate::model::{Block, Row};

/// Largest page the content source will return.
pub const PAGE_SIZE_LIMIT: usize = 100;

type PageFuture<T> = Pin<Box<dyn Future<Output = Result<ResultsPage<T>, RemoteError>> + Send>>;
type TreeFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Block>, RemoteError>> + Send + 'a>>;

/// Row selection for a database fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowQuery {
    /// Stop after this many rows. `None` fetches everything.
    pub take_only: Option<usize>,
    pub sorts: Option<Value>,
    pub filter: Option<Value>,
}

/// Cursor state for one paginated listing.
///
/// Items are buffered a page at a time; a new request is only made once the
/// buffer is drained and the cap still allows more.
struct Pager<T, F> {
    fetch: F,
    cursor: Option<String>,
    buffer: VecDeque<T>,
    has_more: bool,
    remaining: Option<usize>,
}

impl<T, F> Pager<T, F>
where
    T: Send + 'static,
    F: FnMut(Option<String>, usize) -> PageFuture<T> + Send + 'static,
{
    fn new(fetch: F, remaining: Option<usize>) -> Self {
        Self {
            fetch,
            cursor: None,
            buffer: VecDeque::new(),
            has_more: true,
            remaining,
        }
    }

    fn into_stream(self) -> impl Stream<Item = Result<T, RemoteError>> + Send + 'static {
        stream::try_unfold(self, |mut pager| async move {
            pager
                .next_item()
                .await
                .map(|item| item.map(|item| (item, pager)))
        })
    }

    async fn next_item(&mut self) -> Result<Option<T>, RemoteError> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }
            if let Some(item) = self.buffer.pop_front() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Ok(Some(item));
            }
            if !self.has_more {
                return Ok(None);
            }

            let page_size = self
                .remaining
                .map_or(PAGE_SIZE_LIMIT, |r| r.min(PAGE_SIZE_LIMIT));
            let page = (self.fetch)(self.cursor.take(), page_size).await?;
            self.has_more = page.has_more && page.next_cursor.is_some();
            self.cursor = page.next_cursor;
            self.buffer.extend(page.results);
        }
    }
}

/// Paged, rate-limit aware reads from a [`ContentSource`].
///
/// Every stream it hands out is lazy: nothing is requested until the first
/// item is polled, and dropping the stream stops further requests.
#[derive(Debug)]
pub struct RemotePaginator<S> {
    source: Arc<S>,
    retry: RetryPolicy,
}

impl<S> Clone for RemotePaginator<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            retry: self.retry,
        }
    }
}

impl<S: ContentSource + 'static> RemotePaginator<S> {
    pub fn new(source: S, retry: RetryPolicy) -> Self {
        Self::from_shared(Arc::new(source), retry)
    }

    pub fn from_shared(source: Arc<S>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// The database object itself, without rows.
    pub async fn fetch_database(&self, credentials: &Credentials) -> Result<Value, RemoteError> {
        self.retry
            .run(|| {
                self.source
                    .retrieve_database(&credentials.database_id, &credentials.token)
            })
            .await
    }

    /// Rows of a database in source order, honoring the query's cap.
    pub fn fetch_rows(
        &self,
        credentials: &Credentials,
        query: &RowQuery,
    ) -> impl Stream<Item = Result<Row, RemoteError>> + Send + 'static {
        let source = self.source.clone();
        let retry = self.retry;
        let database_id = credentials.database_id.clone();
        let token = credentials.token.clone();
        let sorts = query.sorts.clone();
        let filter = query.filter.clone();

        let fetch = move |cursor: Option<String>, page_size: usize| -> PageFuture<Value> {
            let source = source.clone();
            let database_id = database_id.clone();
            let token = token.clone();
            let request = QueryRequest {
                page_size,
                start_cursor: cursor,
                sorts: sorts.clone(),
                filter: filter.clone(),
            };
            Box::pin(async move {
                retry
                    .run(|| source.query_database(&database_id, &token, &request))
                    .await
            })
        };

        Pager::new(fetch, query.take_only)
            .into_stream()
            .map(|page| page.and_then(Row::from_page))
    }

    /// Direct children of a block, without recursing.
    pub fn fetch_children(
        &self,
        block_id: &str,
        token: &str,
    ) -> impl Stream<Item = Result<Block, RemoteError>> + Send + 'static {
        let source = self.source.clone();
        let retry = self.retry;
        let block_id = block_id.to_string();
        let token = token.to_string();

        let fetch = move |cursor: Option<String>, page_size: usize| -> PageFuture<Block> {
            let source = source.clone();
            let block_id = block_id.clone();
            let token = token.clone();
            Box::pin(async move {
                retry
                    .run(|| source.list_children(&block_id, &token, cursor.as_deref(), page_size))
                    .await
            })
        };

        Pager::new(fetch, None).into_stream()
    }

    /// The full block forest under `block_id`, children attached.
    pub fn fetch_block_tree<'a>(&'a self, block_id: &'a str, token: &'a str) -> TreeFuture<'a> {
        Box::pin(async move {
            debug!(block = %block_id, "fetching block tree");
            let children = self.fetch_children(block_id, token);
            pin!(children);

            let mut blocks = Vec::new();
            while let Some(block) = children.next().await {
                let mut block = block?;
                if block.has_children {
                    let nested = self.fetch_block_tree(&block.id, token).await?;
                    block.children = nested;
                }
                blocks.push(block);
            }
            Ok(blocks)
        })
    }
}

#[cfg(test)]
mod tests;
