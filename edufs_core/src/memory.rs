//! In-process CAS node.
//!
//! Identifiers are BLAKE3 digests of the content, so equal bytes always get
//! equal identifiers. Failures can be injected per upload name or per
//! identifier to exercise partial-failure handling.

use crate::cid::ContentId;
use crate::error::NodeError;
use crate::node::{ByteStream, CasNode, NameRecord, NodeInfo, NodeResult};
use crate::walk::FileEntry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    blobs: HashMap<ContentId, Vec<u8>>,
    pins: BTreeSet<ContentId>,
    names: BTreeMap<String, ContentId>,
    failing_adds: HashSet<String>,
    failing_pins: HashSet<ContentId>,
    uploads: Vec<String>,
}

/// A content-addressed node held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryNode {
    state: Mutex<State>,
    directories: bool,
}

impl MemoryNode {
    /// Create a node that only supports per-file uploads.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node that also supports whole-directory uploads.
    pub fn with_directory_support() -> Self {
        Self {
            directories: true,
            ..Self::default()
        }
    }

    /// The identifier this node assigns to `data`.
    pub fn cid_for(data: &[u8]) -> ContentId {
        ContentId::from_digest(blake3::hash(data).as_bytes())
    }

    /// Make every upload labelled `name` fail.
    pub fn fail_add(&self, name: impl Into<String>) {
        self.state().failing_adds.insert(name.into());
    }

    /// Make every pin of `cid` fail.
    pub fn fail_pin(&self, cid: &ContentId) {
        self.state().failing_pins.insert(cid.clone());
    }

    /// Store bytes directly, bypassing upload bookkeeping.
    pub fn insert(&self, data: &[u8]) -> ContentId {
        let cid = Self::cid_for(data);
        self.state().blobs.insert(cid.clone(), data.to_vec());
        cid
    }

    /// Whether the node holds content for `cid`.
    pub fn contains(&self, cid: &ContentId) -> bool {
        self.state().blobs.contains_key(cid)
    }

    /// Whether `cid` is pinned.
    pub fn is_pinned(&self, cid: &ContentId) -> bool {
        self.state().pins.contains(cid)
    }

    /// Number of distinct pinned identifiers.
    pub fn pin_count(&self) -> usize {
        self.state().pins.len()
    }

    /// Upload labels in the order the node received them.
    pub fn uploads(&self) -> Vec<String> {
        self.state().uploads.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic in another test thread must not hide this node's state
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn name_for_key(key: &str) -> String {
        let digest = blake3::hash(key.as_bytes());
        format!("k{}", hex::encode(&digest.as_bytes()[..16]))
    }
}

impl CasNode for MemoryNode {
    fn id(&self) -> NodeResult<NodeInfo> {
        Ok(NodeInfo {
            id: "memory".to_string(),
            agent_version: concat!("edufs-memory/", env!("CARGO_PKG_VERSION")).to_string(),
            protocol_version: "memory/1".to_string(),
        })
    }

    fn add(&self, name: &str, mut content: ByteStream) -> NodeResult<ContentId> {
        if self.state().failing_adds.contains(name) {
            return Err(NodeError::Api {
                status: 500,
                message: format!("injected add failure for {}", name),
            });
        }

        let mut data = Vec::new();
        content
            .read_to_end(&mut data)
            .map_err(|e| NodeError::Transport(e.to_string()))?;

        let cid = Self::cid_for(&data);
        let mut state = self.state();
        state.blobs.insert(cid.clone(), data);
        state.uploads.push(name.to_string());
        Ok(cid)
    }

    fn add_directory(&self, root: &Path, entries: &[FileEntry]) -> NodeResult<ContentId> {
        if !self.directories {
            return Err(NodeError::Unsupported {
                operation: "add_directory".to_string(),
            });
        }

        // The directory object is a listing of (cid, path) lines under the root name
        let mut listing = root
            .file_name()
            .map(|n| format!("{}\n", n.to_string_lossy()).into_bytes())
            .unwrap_or_default();
        for entry in entries {
            let data = std::fs::read(&entry.absolute_path)
                .map_err(|e| NodeError::Transport(e.to_string()))?;
            let cid = self.insert(&data);
            listing.extend_from_slice(format!("{} {}\n", cid, entry.relative_path).as_bytes());
        }

        Ok(self.insert(&listing))
    }

    fn pin(&self, cid: &ContentId) -> NodeResult<()> {
        let mut state = self.state();

        if state.failing_pins.contains(cid) {
            return Err(NodeError::Api {
                status: 500,
                message: format!("injected pin failure for {}", cid),
            });
        }

        if !state.blobs.contains_key(cid) {
            return Err(NodeError::NotFound {
                cid: cid.to_string(),
            });
        }

        state.pins.insert(cid.clone());
        Ok(())
    }

    fn cat(&self, cid: &ContentId) -> NodeResult<ByteStream> {
        match self.state().blobs.get(cid) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None => Err(NodeError::NotFound {
                cid: cid.to_string(),
            }),
        }
    }

    fn publish_name(&self, key: &str, cid: &ContentId) -> NodeResult<NameRecord> {
        if key.is_empty() {
            return Err(NodeError::Api {
                status: 500,
                message: "no key by the given name was found".to_string(),
            });
        }

        let name = Self::name_for_key(key);
        self.state().names.insert(name.clone(), cid.clone());
        Ok(NameRecord {
            name,
            value: cid.to_ipfs_path(),
        })
    }

    fn resolve_name(&self, name: &str) -> NodeResult<ContentId> {
        let name = name.strip_prefix("/ipns/").unwrap_or(name);
        self.state()
            .names
            .get(name)
            .cloned()
            .ok_or_else(|| NodeError::Api {
                status: 500,
                message: format!("could not resolve name {}", name),
            })
    }
}
