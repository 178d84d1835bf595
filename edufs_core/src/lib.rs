//! # eduFs Core
//!
//! Publishing pipeline for an IPFS-compatible content-addressed network.
//!
//! This library walks a file or directory, uploads each file to a CAS node,
//! pins what it uploaded, and picks a root identifier for the tree. Content
//! can be fetched back by identifier, and mutable names can be pointed at a
//! published root.
//!
//! ## Features
//!
//! - Deterministic walk order (lexicographic by relative path)
//! - Best-effort directory publish: per-file failures are recorded, not fatal
//! - Upload and pin failures reported separately
//! - Streaming uploads with optional progress reporting
//! - Cancellation and deadlines between files
//! - Kubo RPC binding over HTTP, plus an in-memory node for tests
//!
//! ## Example
//!
//! ```no_run
//! use edufs_core::{DirectoryPublisher, HttpNode, HttpNodeConfig, NamePublisher};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let node = HttpNode::new(HttpNodeConfig::from_endpoint("/ip4/127.0.0.1/tcp/5001")?)?;
//!
//! // Upload and pin every file under ./site
//! let result = DirectoryPublisher::new(&node).publish(Path::new("./site"))?;
//! println!("root {} ({} files)", result.root_cid, result.per_file.len());
//!
//! // Point a name at the new root
//! let record = NamePublisher::new(&node).publish_name("website", &result.root_cid)?;
//! println!("{} -> {}", record.name, record.value);
//! # Ok(())
//! # }
//! ```

mod cid;
mod error;
mod http;
mod memory;
mod name;
mod node;
mod pin;
mod publish;
mod retrieve;
mod upload;
mod walk;

pub use cid::ContentId;
pub use error::{Error, NodeError, Result};
pub use http::{DEFAULT_ENDPOINT, HttpNode, HttpNodeConfig, endpoint_url};
pub use memory::MemoryNode;
pub use name::NamePublisher;
pub use node::{ByteStream, CasNode, NameRecord, NodeInfo, NodeResult};
pub use pin::Pinner;
pub use publish::{
    CancelToken, DirectoryPublisher, PublishResult, RootSource, RootStrategy, UploadOutcome,
    UploadResult,
};
pub use retrieve::{Retrieval, Retriever};
pub use upload::{ProgressObserver, ProgressReader, Uploader};
pub use walk::{FileEntry, FileWalk, FileWalkIter, WalkOptions};
