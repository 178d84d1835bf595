//! Single-file upload with progress reporting.

use crate::cid::ContentId;
use crate::error::{Error, Result};
use crate::node::{ByteStream, CasNode};
use crate::publish::UploadResult;
use crate::walk::FileEntry;
use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::debug;

/// Receives progress notifications during a publish.
///
/// Only `bytes_sent` is required; the per-file hooks default to no-ops.
pub trait ProgressObserver: Send + Sync {
    /// A file is about to be uploaded. `index` is zero-based.
    fn file_started(&self, index: usize, total: usize, entry: &FileEntry) {
        let _ = (index, total, entry);
    }

    /// Cumulative bytes read from the current source, and its expected size.
    fn bytes_sent(&self, transferred: u64, size_hint: u64);

    /// A file finished, successfully or not.
    fn file_finished(&self, index: usize, total: usize, result: &UploadResult) {
        let _ = (index, total, result);
    }
}

/// A pass-through reader that reports cumulative bytes to an observer.
///
/// Bytes are forwarded unchanged and in order.
pub struct ProgressReader<R> {
    inner: R,
    transferred: u64,
    size_hint: u64,
    observer: Arc<dyn ProgressObserver>,
}

impl<R: Read> ProgressReader<R> {
    /// Wrap `inner`, reporting progress against `size_hint`.
    pub fn new(inner: R, size_hint: u64, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            inner,
            transferred: 0,
            size_hint,
            observer,
        }
    }

    /// Bytes read through this wrapper so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Unwrap the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.transferred += n as u64;
            self.observer.bytes_sent(self.transferred, self.size_hint);
        }
        Ok(n)
    }
}

/// Uploads byte streams to a node.
pub struct Uploader<'a, N: CasNode + ?Sized> {
    node: &'a N,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl<'a, N: CasNode + ?Sized> Uploader<'a, N> {
    /// Create an uploader without progress reporting.
    pub fn new(node: &'a N) -> Self {
        Self {
            node,
            observer: None,
        }
    }

    /// Report progress of every upload to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Upload a stream, labelled `name`, and return its identifier.
    ///
    /// The stream is handed to the node as-is; it is never buffered whole here.
    pub fn upload_reader<R>(&self, name: &str, reader: R, size_hint: u64) -> Result<ContentId>
    where
        R: Read + Send + 'static,
    {
        let stream: ByteStream = match &self.observer {
            Some(observer) => Box::new(ProgressReader::new(reader, size_hint, observer.clone())),
            None => Box::new(reader),
        };

        let cid = self
            .node
            .add(name, stream)
            .map_err(|e| Error::upload_failed(name, e))?;

        debug!(path = name, %cid, size = size_hint, "uploaded");
        Ok(cid)
    }

    /// Upload one walked file.
    pub fn upload_file(&self, entry: &FileEntry) -> Result<ContentId> {
        let file = File::open(&entry.absolute_path)?;
        self.upload_reader(&entry.relative_path, file, entry.size_bytes)
    }
}
