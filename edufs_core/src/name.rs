//! Binding mutable names to published content.

use crate::cid::ContentId;
use crate::error::{Error, Result};
use crate::node::{CasNode, NameRecord};
use tracing::info;

/// Publishes and resolves naming records through the node.
///
/// No retries happen here; callers decide whether to try again.
pub struct NamePublisher<'a, N: CasNode + ?Sized> {
    node: &'a N,
}

impl<'a, N: CasNode + ?Sized> NamePublisher<'a, N> {
    /// Create a name publisher for `node`.
    pub fn new(node: &'a N) -> Self {
        Self { node }
    }

    /// Point the name owned by `key` at `cid`.
    pub fn publish_name(&self, key: &str, cid: &ContentId) -> Result<NameRecord> {
        let record = self
            .node
            .publish_name(key, cid)
            .map_err(|e| Error::publish_failed(key, e))?;
        info!(key, name = %record.name, value = %record.value, "name published");
        Ok(record)
    }

    /// Resolve `name` to the identifier it points at.
    pub fn resolve(&self, name: &str) -> Result<ContentId> {
        self.node
            .resolve_name(name)
            .map_err(|e| Error::resolve_failed(name, e))
    }
}
