//! Access to the remote content source.
//!
//! [`ContentSource`] is the raw request seam; [`RemotePaginator`] layers
//! cursor paging, row caps and rate-limit retry on top of it.

mod client;
mod memory;
mod paginate;
mod retry;

pub use client::{ContentSource, HttpContentSource, QueryRequest, ResultsPage};
pub use memory::{MemorySource, RecordedRequest};
pub use paginate::{PAGE_SIZE_LIMIT, RemotePaginator, RowQuery};
pub use retry::RetryPolicy;
