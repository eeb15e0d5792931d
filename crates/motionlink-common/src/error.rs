use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for motionlink operations
#[derive(Debug, Error, Diagnostic)]
pub enum MotionlinkError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Remote(#[from] RemoteError),

    #[error("failed to access {}", path.display())]
    #[diagnostic(code(motionlink::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render template {template}: {message}")]
    #[diagnostic(code(motionlink::template))]
    Template { template: String, message: String },
}

impl MotionlinkError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration errors. These are never retried.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("the database association \"{name}\" does not exist")]
    #[diagnostic(
        code(config::missing_association),
        help("add an association named \"{name}\" or fix the rule that references it")
    )]
    MissingAssociation { name: String },

    #[error("invalid value for {var}: {value}")]
    #[diagnostic(code(config::invalid_value))]
    InvalidValue { var: &'static str, value: String },

    #[error("invalid URL {url}: {message}")]
    #[diagnostic(code(config::url_parse))]
    UrlParse { url: String, message: String },

    #[error("failed to parse {}: {message}", path.display())]
    #[diagnostic(code(config::parse))]
    Parse { path: PathBuf, message: String },
}

/// Errors talking to the remote content source
#[derive(Debug, Error, Diagnostic)]
pub enum RemoteError {
    /// Transient; absorbed by [`crate::remote::RetryPolicy`].
    #[error("rate limited by the content source")]
    #[diagnostic(code(remote::rate_limited))]
    RateLimited,

    #[error("content source returned {status}: {message}")]
    #[diagnostic(code(remote::status))]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("request to content source failed")]
    #[diagnostic(code(remote::transport))]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode content source response")]
    #[diagnostic(code(remote::decode))]
    Decode(#[from] serde_json::Error),

    #[error("invalid request url")]
    #[diagnostic(code(remote::url))]
    Url(#[from] url::ParseError),

    #[error("malformed object from content source: {0}")]
    #[diagnostic(code(remote::malformed))]
    Malformed(String),
}

impl RemoteError {
    /// Status code the content source uses to signal rate limiting.
    pub const RATE_LIMITED_STATUS: u16 = 429;
    pub const RATE_LIMITED_CODE: &'static str = "rate_limited";

    /// Build an error from a non-success response.
    ///
    /// The body is expected to be the content source's JSON error object
    /// (`{"status": .., "code": .., "message": ..}`); anything else is kept
    /// verbatim as the message.
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            code: Option<String>,
            message: Option<String>,
        }

        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let code = parsed.as_ref().and_then(|b| b.code.clone());
        if status == Self::RATE_LIMITED_STATUS || code.as_deref() == Some(Self::RATE_LIMITED_CODE)
        {
            return Self::RateLimited;
        }

        let message = parsed
            .and_then(|b| b.message)
            .unwrap_or_else(|| body.to_string());
        Self::Status {
            status,
            code,
            message,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::Status { status, code, .. } => {
                *status == Self::RATE_LIMITED_STATUS
                    || code.as_deref() == Some(Self::RATE_LIMITED_CODE)
            }
            _ => false,
        }
    }
}
