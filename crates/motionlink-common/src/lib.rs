//! Shared types for motionlink.
//!
//! This crate owns the content model fetched from the remote content database
//! (rows, blocks, rich text), the client that talks to it, and the error types
//! used across the workspace.

pub mod config;
pub mod error;
pub mod model;
pub mod remote;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use config::{
    Association, CredentialResolver, Credentials, RemoteConfig, compile_associations,
    merge_associations,
};
pub use error::{ConfigError, MotionlinkError, RemoteError};
pub use model::{
    Annotations, Block, Database, DateMention, Equation, FileObject, FileSource, Mention,
    Reference, RichText, RichTextContent, Row, TextContent, UserMention,
};
pub use remote::{ContentSource, RemotePaginator, RetryPolicy, RowQuery};
