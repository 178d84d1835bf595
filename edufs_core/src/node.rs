//! The CAS node seam.
//!
//! Everything the pipeline needs from a content-addressed storage node goes
//! through [`CasNode`]. The HTTP binding talks to a real node; the memory
//! binding stands in for one in tests.

use crate::cid::ContentId;
use crate::error::NodeError;
use crate::walk::FileEntry;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

/// Result type for node calls.
pub type NodeResult<T> = std::result::Result<T, NodeError>;

/// A byte stream handed to or returned by the node.
pub type ByteStream = Box<dyn Read + Send>;

/// Identity of the node answering on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub id: String,
    pub agent_version: String,
    pub protocol_version: String,
}

/// A naming record binding a name to a content path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameRecord {
    /// The record name (the key's identifier).
    pub name: String,
    /// The path the name resolves to, e.g. `/ipfs/<cid>`.
    pub value: String,
}

/// Operations a content-addressed storage node provides.
///
/// Calls are blocking. Implementations are not required to be safe for
/// concurrent use; the pipeline drives one call at a time.
pub trait CasNode {
    /// Probe node identity.
    fn id(&self) -> NodeResult<NodeInfo>;

    /// Store a byte stream without pinning it and return its identifier.
    ///
    /// `name` is a label for the upload (the file's relative path); it does
    /// not affect the identifier.
    fn add(&self, name: &str, content: ByteStream) -> NodeResult<ContentId>;

    /// Store the files `entries` of the directory `root` as one DAG, without
    /// pinning, and return the directory's identifier.
    ///
    /// Implementations read every file again, so after per-file uploads the
    /// caller pays for a second full transfer of the tree. No progress is
    /// reported for it.
    ///
    /// Nodes without this primitive report `NodeError::Unsupported`.
    fn add_directory(&self, root: &Path, entries: &[FileEntry]) -> NodeResult<ContentId> {
        let _ = (root, entries);
        Err(NodeError::Unsupported {
            operation: "add_directory".to_string(),
        })
    }

    /// Protect an identifier from garbage collection. Pinning twice is not an error.
    fn pin(&self, cid: &ContentId) -> NodeResult<()>;

    /// Fetch the bytes behind an identifier.
    fn cat(&self, cid: &ContentId) -> NodeResult<ByteStream>;

    /// Bind the name owned by `key` to `cid`.
    fn publish_name(&self, key: &str, cid: &ContentId) -> NodeResult<NameRecord>;

    /// Resolve a name to the identifier it currently points at.
    fn resolve_name(&self, name: &str) -> NodeResult<ContentId>;
}
