use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use serde_json::{Value, json};

use super::client::{ContentSource, QueryRequest, ResultsPage};
use crate::error::RemoteError;
use crate::model::Block;

/// A request seen by [`MemorySource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedRequest {
    RetrieveDatabase {
        database_id: String,
    },
    QueryDatabase {
        database_id: String,
        page_size: usize,
        cursor: Option<String>,
    },
    ListChildren {
        block_id: String,
        page_size: usize,
        cursor: Option<String>,
    },
}

/// An in-process content source.
///
/// Serves canned databases and block children, records every request, and
/// can be told to fail upcoming requests. Cursors are stringified offsets.
#[derive(Debug, Default)]
pub struct MemorySource {
    databases: HashMap<String, Value>,
    rows: HashMap<String, Vec<Value>>,
    children: HashMap<String, Vec<Block>>,
    failures: Mutex<VecDeque<RemoteError>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database with its rows. Rows must carry an `id`.
    pub fn with_database(mut self, database_id: &str, data: Value, rows: Vec<Value>) -> Self {
        self.databases.insert(database_id.to_string(), data);
        self.rows.insert(database_id.to_string(), rows);
        self
    }

    /// Register `count` rows with ids `<prefix>-0..`.
    pub fn with_generated_rows(self, database_id: &str, prefix: &str, count: usize) -> Self {
        let rows = (0..count)
            .map(|i| {
                json!({
                    "object": "page",
                    "id": format!("{prefix}-{i}"),
                    "properties": {
                        "Name": { "type": "title", "title": [
                            { "type": "text", "plain_text": format!("Row {i}") }
                        ] }
                    }
                })
            })
            .collect();
        self.with_database(database_id, json!({ "object": "database", "id": database_id }), rows)
    }

    pub fn with_children(mut self, block_id: &str, children: Vec<Block>) -> Self {
        self.children.insert(block_id.to_string(), children);
        self
    }

    /// Fail the next request with `error`. Queued failures are used in order.
    pub fn fail_next(&self, error: RemoteError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn record(&self, request: RecordedRequest) -> Result<(), RemoteError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        match self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn page<T: Clone>(
        items: &[T],
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ResultsPage<T>, RemoteError> {
        let start = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| RemoteError::from_response(400, &format!("invalid cursor {c}")))?,
            None => 0,
        };
        let end = (start + page_size.max(1)).min(items.len());
        let start = start.min(end);
        let has_more = end < items.len();
        Ok(ResultsPage {
            results: items[start..end].to_vec(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        })
    }

    fn not_found(kind: &str, id: &str) -> RemoteError {
        RemoteError::Status {
            status: 404,
            code: Some("object_not_found".into()),
            message: format!("Could not find {kind} with ID: {id}."),
        }
    }
}

impl ContentSource for MemorySource {
    async fn retrieve_database(
        &self,
        database_id: &str,
        _token: &str,
    ) -> Result<Value, RemoteError> {
        self.record(RecordedRequest::RetrieveDatabase {
            database_id: database_id.to_string(),
        })?;
        self.databases
            .get(database_id)
            .cloned()
            .ok_or_else(|| Self::not_found("database", database_id))
    }

    async fn query_database(
        &self,
        database_id: &str,
        _token: &str,
        query: &QueryRequest,
    ) -> Result<ResultsPage<Value>, RemoteError> {
        self.record(RecordedRequest::QueryDatabase {
            database_id: database_id.to_string(),
            page_size: query.page_size,
            cursor: query.start_cursor.clone(),
        })?;
        let rows = self
            .rows
            .get(database_id)
            .ok_or_else(|| Self::not_found("database", database_id))?;
        Self::page(rows, query.start_cursor.as_deref(), query.page_size)
    }

    async fn list_children(
        &self,
        block_id: &str,
        _token: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ResultsPage<Block>, RemoteError> {
        self.record(RecordedRequest::ListChildren {
            block_id: block_id.to_string(),
            page_size,
            cursor: cursor.map(str::to_string),
        })?;
        // blocks without registered children are leaves
        let children = self.children.get(block_id).map(Vec::as_slice).unwrap_or_default();
        Self::page(children, cursor, page_size)
    }
}
