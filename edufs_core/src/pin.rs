//! Pinning uploaded content.

use crate::cid::ContentId;
use crate::error::{Error, Result};
use crate::node::CasNode;
use tracing::debug;

/// Asks the node to keep content out of garbage collection.
pub struct Pinner<'a, N: CasNode + ?Sized> {
    node: &'a N,
}

impl<'a, N: CasNode + ?Sized> Pinner<'a, N> {
    /// Create a pinner for `node`.
    pub fn new(node: &'a N) -> Self {
        Self { node }
    }

    /// Pin `cid`. Pinning an already-pinned identifier succeeds.
    pub fn pin(&self, cid: &ContentId) -> Result<()> {
        self.node
            .pin(cid)
            .map_err(|e| Error::pin_failed(cid, e))?;
        debug!(%cid, "pinned");
        Ok(())
    }
}
