//! Fetching content by identifier.

use crate::cid::ContentId;
use crate::error::{Error, NodeError, Result};
use crate::node::{ByteStream, CasNode};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::debug;

/// Fetches content from a node.
pub struct Retriever<'a, N: CasNode + ?Sized> {
    node: &'a N,
}

impl<'a, N: CasNode + ?Sized> Retriever<'a, N> {
    /// Create a retriever for `node`.
    pub fn new(node: &'a N) -> Self {
        Self { node }
    }

    /// Open the byte stream behind `cid`.
    ///
    /// Fails with `ContentNotFound` if the node does not know the identifier,
    /// `RetrievalFailed` for anything else.
    pub fn retrieve(&self, cid: &ContentId) -> Result<Retrieval> {
        let stream = self
            .node
            .cat(cid)
            .map_err(|e| Error::retrieval(cid, e))?;
        debug!(%cid, "retrieval opened");
        Ok(Retrieval {
            cid: cid.clone(),
            stream,
        })
    }
}

/// An open content stream.
///
/// Dropping it releases the underlying connection, whether or not it was
/// read to the end.
pub struct Retrieval {
    cid: ContentId,
    stream: ByteStream,
}

impl Retrieval {
    /// The identifier being read.
    pub fn cid(&self) -> &ContentId {
        &self.cid
    }

    /// Copy the whole stream into `writer`, returning the byte count.
    pub fn copy_to<W: Write + ?Sized>(mut self, writer: &mut W) -> Result<u64> {
        let cid = self.cid.clone();
        io::copy(&mut self, writer).map_err(|e| Error::retrieval(&cid, stream_error(e)))
    }

    /// Write the whole stream to `dest` atomically.
    ///
    /// Content goes to a temporary file next to `dest` that is renamed into
    /// place only once fully written; on failure nothing is left behind.
    pub fn save_to(self, dest: &Path) -> Result<u64> {
        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        let written = self.copy_to(temp_file.as_file_mut())?;
        temp_file.as_file_mut().flush()?;
        temp_file.persist(dest)?;

        Ok(written)
    }
}

impl Read for Retrieval {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

/// Describe a failed read from the node's stream.
fn stream_error(err: io::Error) -> NodeError {
    NodeError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryNode;
    use tempfile::TempDir;

    /// Yields some bytes, then fails.
    struct Broken {
        sent: bool,
    }

    impl Read for Broken {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            self.sent = true;
            buf[..4].copy_from_slice(b"part");
            Ok(4)
        }
    }

    #[test]
    fn test_retrieve_and_copy() {
        let node = MemoryNode::new();
        let cid = node.insert(b"hello world");

        let retrieval = Retriever::new(&node).retrieve(&cid).unwrap();
        assert_eq!(retrieval.cid(), &cid);

        let mut out = Vec::new();
        let n = retrieval.copy_to(&mut out).unwrap();
        assert_eq!(n, 11);
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn test_retrieve_unknown_is_not_found() {
        let node = MemoryNode::new();
        let cid = MemoryNode::cid_for(b"missing");
        let err = Retriever::new(&node).retrieve(&cid).err().unwrap();
        assert!(matches!(err, Error::ContentNotFound { .. }));
    }

    #[test]
    fn test_early_drop_is_fine() {
        let node = MemoryNode::new();
        let cid = node.insert(b"abcdef");

        let mut retrieval = Retriever::new(&node).retrieve(&cid).unwrap();
        let mut first = [0u8; 2];
        retrieval.read_exact(&mut first).unwrap();
        assert_eq!(&first, b"ab");
        drop(retrieval);

        // The node is still usable afterwards
        let again = Retriever::new(&node).retrieve(&cid).unwrap();
        let mut out = Vec::new();
        again.copy_to(&mut out).unwrap();
        assert_eq!(out, b"abcdef");
    }

    #[test]
    fn test_save_to_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let node = MemoryNode::new();
        let cid = node.insert(b"saved");

        let dest = temp_dir.path().join("nested").join("out.txt");
        let n = Retriever::new(&node)
            .retrieve(&cid)
            .unwrap()
            .save_to(&dest)
            .unwrap();

        assert_eq!(n, 5);
        assert_eq!(fs::read(&dest).unwrap(), b"saved");
    }

    #[test]
    fn test_failed_stream_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("out.txt");
        let retrieval = Retrieval {
            cid: ContentId::parse("b3broken").unwrap(),
            stream: Box::new(Broken { sent: false }),
        };

        let err = retrieval.save_to(&dest).unwrap_err();
        assert!(matches!(err, Error::RetrievalFailed { .. }));
        assert!(!dest.exists());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
