//! Error types for edufs_core.

use crate::cid::ContentId;
use crate::publish::UploadResult;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using edufs_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a CAS node implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The node does not know the identifier (or has collected it).
    #[error("content not found: {cid}")]
    NotFound { cid: String },

    /// The node does not provide this operation.
    #[error("operation not supported by node: {operation}")]
    Unsupported { operation: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with an error status.
    #[error("node returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The node answered with something we could not understand.
    #[error("unexpected node response: {0}")]
    Decode(String),
}

/// Errors that can occur in the publishing and retrieval pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during local file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A local path does not exist.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// The filesystem walk hit an entry it cannot publish.
    #[error("Cannot walk {path}: {reason}")]
    Walk { path: PathBuf, reason: String },

    /// Invalid content identifier.
    #[error("Invalid content identifier: {reason}")]
    InvalidCid { reason: String },

    /// Invalid node endpoint.
    #[error("Invalid node endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Uploading a file to the node failed.
    #[error("Upload failed for {path}: {source}")]
    UploadFailed { path: String, source: NodeError },

    /// The content was uploaded but the node refused to pin it.
    #[error("Pin failed for {cid}: {source}")]
    PinFailed { cid: ContentId, source: NodeError },

    /// Binding a name to a content identifier failed.
    #[error("Name publish failed for {name}: {source}")]
    PublishFailed { name: String, source: NodeError },

    /// Resolving a name failed.
    #[error("Name resolution failed for {name}: {source}")]
    ResolveFailed { name: String, source: NodeError },

    /// The node does not have the requested content.
    #[error("Content not found: {cid}")]
    ContentNotFound { cid: ContentId },

    /// Fetching content from the node failed.
    #[error("Retrieval failed for {cid}: {source}")]
    RetrievalFailed { cid: ContentId, source: NodeError },

    /// Nothing under the publish root reached the node.
    #[error("No files published from {path}")]
    NoFilesPublished { path: PathBuf },

    /// The publish was cancelled; completed results are preserved.
    #[error("Publish cancelled after {} file(s)", .results.len())]
    Cancelled { results: Vec<UploadResult> },

    /// Any other node failure.
    #[error("Node error: {0}")]
    Node(#[from] NodeError),
}

impl Error {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Error::NotFound { path: path.into() }
    }

    /// Create a Walk error.
    pub fn walk(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Walk {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidCid error.
    pub fn invalid_cid(reason: impl Into<String>) -> Self {
        Error::InvalidCid {
            reason: reason.into(),
        }
    }

    /// Create an InvalidEndpoint error.
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create an UploadFailed error.
    pub fn upload_failed(path: impl Into<String>, source: NodeError) -> Self {
        Error::UploadFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a PinFailed error.
    pub fn pin_failed(cid: &ContentId, source: NodeError) -> Self {
        Error::PinFailed {
            cid: cid.clone(),
            source,
        }
    }

    /// Create a PublishFailed error.
    pub fn publish_failed(name: impl Into<String>, source: NodeError) -> Self {
        Error::PublishFailed {
            name: name.into(),
            source,
        }
    }

    /// Create a ResolveFailed error.
    pub fn resolve_failed(name: impl Into<String>, source: NodeError) -> Self {
        Error::ResolveFailed {
            name: name.into(),
            source,
        }
    }

    /// Map a node error from `cat` onto the retrieval error kinds.
    pub fn retrieval(cid: &ContentId, source: NodeError) -> Self {
        match source {
            NodeError::NotFound { .. } => Error::ContentNotFound { cid: cid.clone() },
            source => Error::RetrievalFailed {
                cid: cid.clone(),
                source,
            },
        }
    }

    /// Create a NoFilesPublished error.
    pub fn no_files_published(path: impl Into<PathBuf>) -> Self {
        Error::NoFilesPublished { path: path.into() }
    }

    /// Whether this error means the requested content or path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::ContentNotFound { .. })
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a path error
        match err.io_error() {
            Some(io_err) => Error::Io {
                source: std::io::Error::new(io_err.kind(), io_err.to_string()),
            },
            None => Error::Io {
                source: std::io::Error::other(err.to_string()),
            },
        }
    }
}
