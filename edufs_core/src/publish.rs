//! Directory publishing.
//!
//! Walks a root, uploads and pins every file in walk order, and picks a root
//! identifier for the tree. Per-file failures are recorded and the loop keeps
//! going; the publish only fails as a whole when no file reached the node.
//!
//! # Root identifier
//!
//! When the node can store a whole directory as one DAG, the root is that
//! directory's identifier. Otherwise the root is the identifier of the first
//! file in walk order that was uploaded, whether or not its pin succeeded. That identifier names a single
//! member file, not the tree; [`RootSource::FirstEntry`] marks results built
//! this way so callers can tell.

use crate::cid::ContentId;
use crate::error::{Error, NodeError, Result};
use crate::node::CasNode;
use crate::pin::Pinner;
use crate::upload::{ProgressObserver, Uploader};
use crate::walk::{FileEntry, FileWalk, WalkOptions};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// What happened to one walked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Uploaded and pinned.
    Pinned { cid: ContentId },
    /// Uploaded, but the node refused to pin it. Only the pin needs retrying.
    PinFailed { cid: ContentId, error: String },
    /// Never reached the node.
    UploadFailed { error: String },
}

/// The result for one walked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub entry: FileEntry,
    #[serde(flatten)]
    pub outcome: UploadOutcome,
}

impl UploadResult {
    /// The identifier, present iff the upload succeeded.
    pub fn cid(&self) -> Option<&ContentId> {
        match &self.outcome {
            UploadOutcome::Pinned { cid } | UploadOutcome::PinFailed { cid, .. } => Some(cid),
            UploadOutcome::UploadFailed { .. } => None,
        }
    }

    /// Uploaded and pinned.
    pub fn is_published(&self) -> bool {
        matches!(self.outcome, UploadOutcome::Pinned { .. })
    }

    /// The failure message, if any step failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            UploadOutcome::Pinned { .. } => None,
            UploadOutcome::PinFailed { error, .. } | UploadOutcome::UploadFailed { error } => {
                Some(error)
            }
        }
    }
}

/// How the root identifier of a publish was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootSource {
    /// The node stored the directory as one DAG.
    Directory,
    /// The publish root was a single file.
    SingleFile,
    /// First uploaded file in walk order. Does not represent the tree.
    FirstEntry,
}

/// Which root identifier policy to use for directory roots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RootStrategy {
    /// Ask the node for a whole-directory upload, falling back to the first
    /// uploaded file if the directory upload is unsupported or fails.
    #[default]
    Directory,
    /// Always use the first uploaded file.
    FirstEntry,
}

/// Outcome of publishing a file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub root_cid: ContentId,
    pub root_source: RootSource,
    /// One result per walked file, in walk order.
    pub per_file: Vec<UploadResult>,
    /// Why the directory root could not be pinned. The root itself is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_pin_error: Option<String>,
}

impl PublishResult {
    /// Files uploaded and pinned.
    pub fn published_count(&self) -> usize {
        self.per_file.iter().filter(|r| r.is_published()).count()
    }

    /// Files that never reached the node.
    pub fn upload_failures(&self) -> usize {
        self.per_file
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::UploadFailed { .. }))
            .count()
    }

    /// Files uploaded but left unpinned.
    pub fn pin_failures(&self) -> usize {
        self.per_file
            .iter()
            .filter(|r| matches!(r.outcome, UploadOutcome::PinFailed { .. }))
            .count()
    }

    /// Files that reached the node, pinned or not.
    pub fn uploaded_count(&self) -> usize {
        self.per_file.iter().filter(|r| r.cid().is_some()).count()
    }

    /// Every file was uploaded and pinned, and so was the root.
    pub fn is_complete(&self) -> bool {
        self.root_pin_error.is_none() && self.per_file.iter().all(UploadResult::is_published)
    }

    /// Whether `root_cid` stands for the whole published tree.
    pub fn root_represents_tree(&self) -> bool {
        self.root_source != RootSource::FirstEntry
    }
}

/// Cooperative cancellation for a publish, with an optional deadline.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only cancels when asked.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also cancels once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Some(deadline),
        }
    }

    /// A token that cancels `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Which step of a file's publish failed.
enum Failure {
    Upload(Error),
    Pin(ContentId, Error),
}

/// Publishes a file or directory tree to a node.
pub struct DirectoryPublisher<'a, N: CasNode + ?Sized> {
    node: &'a N,
    walk_options: WalkOptions,
    strategy: RootStrategy,
    observer: Option<Arc<dyn ProgressObserver>>,
    cancel: CancelToken,
}

impl<'a, N: CasNode + ?Sized> DirectoryPublisher<'a, N> {
    /// Create a publisher with default options.
    pub fn new(node: &'a N) -> Self {
        Self {
            node,
            walk_options: WalkOptions::default(),
            strategy: RootStrategy::default(),
            observer: None,
            cancel: CancelToken::new(),
        }
    }

    /// Set the walk options.
    pub fn with_walk_options(mut self, options: WalkOptions) -> Self {
        self.walk_options = options;
        self
    }

    /// Set the root identifier policy.
    pub fn with_strategy(mut self, strategy: RootStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Report progress to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Stop between files once `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Publish `root`.
    ///
    /// Errors:
    /// - `NotFound` / `Walk` if the root cannot be walked (before any upload)
    /// - `NoFilesPublished` if the walk is empty or every upload failed
    /// - `UploadFailed` / `PinFailed` when the root is a single file that failed
    /// - `Cancelled` with the completed results if the token fired
    pub fn publish(&self, root: &Path) -> Result<PublishResult> {
        let walk = FileWalk::with_options(root, self.walk_options)?;
        let entries = walk.entries()?;

        if entries.is_empty() {
            return Err(Error::no_files_published(root));
        }

        let mut uploader = Uploader::new(self.node);
        if let Some(observer) = &self.observer {
            uploader = uploader.with_observer(observer.clone());
        }
        let pinner = Pinner::new(self.node);

        let total = entries.len();
        let mut per_file = Vec::with_capacity(total);

        for (index, entry) in entries.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(completed = per_file.len(), total, "publish cancelled");
                return Err(Error::Cancelled { results: per_file });
            }

            if let Some(observer) = &self.observer {
                observer.file_started(index, total, &entry);
            }

            let (result, failure) = match Self::upload_and_pin(&uploader, &pinner, &entry) {
                Ok(cid) => {
                    info!(path = %entry.relative_path, %cid, "published");
                    let outcome = UploadOutcome::Pinned { cid };
                    (UploadResult { entry, outcome }, None)
                }
                Err(Failure::Upload(e)) => {
                    warn!(path = %entry.relative_path, error = %e, "upload failed");
                    let outcome = UploadOutcome::UploadFailed {
                        error: e.to_string(),
                    };
                    (UploadResult { entry, outcome }, Some(e))
                }
                Err(Failure::Pin(cid, e)) => {
                    warn!(path = %entry.relative_path, %cid, error = %e, "pin failed");
                    let outcome = UploadOutcome::PinFailed {
                        cid,
                        error: e.to_string(),
                    };
                    (UploadResult { entry, outcome }, Some(e))
                }
            };

            if let Some(observer) = &self.observer {
                observer.file_finished(index, total, &result);
            }

            // A single-file publish has no partial success to report
            if walk.is_single_file()
                && let Some(e) = failure
            {
                return Err(e);
            }

            per_file.push(result);
        }

        let (root_cid, root_source, root_pin_error) = if walk.is_single_file() {
            match per_file.first().and_then(UploadResult::cid) {
                Some(cid) => (cid.clone(), RootSource::SingleFile, None),
                None => return Err(Error::no_files_published(root)),
            }
        } else {
            self.select_root(root, &pinner, &per_file)?
        };

        info!(%root_cid, source = ?root_source, files = per_file.len(), "publish complete");

        Ok(PublishResult {
            root_cid,
            root_source,
            per_file,
            root_pin_error,
        })
    }

    /// Upload then pin one file.
    fn upload_and_pin(
        uploader: &Uploader<'_, N>,
        pinner: &Pinner<'_, N>,
        entry: &FileEntry,
    ) -> std::result::Result<ContentId, Failure> {
        let cid = uploader.upload_file(entry).map_err(Failure::Upload)?;
        pinner
            .pin(&cid)
            .map_err(|e| Failure::Pin(cid.clone(), e))?;
        Ok(cid)
    }

    /// Choose the root identifier once every file has been attempted.
    ///
    /// Any file that reached the node counts, pinned or not. A failed pin of
    /// the directory root is reported alongside the root instead of failing
    /// the publish.
    fn select_root(
        &self,
        root: &Path,
        pinner: &Pinner<'_, N>,
        per_file: &[UploadResult],
    ) -> Result<(ContentId, RootSource, Option<String>)> {
        let uploaded: Vec<FileEntry> = per_file
            .iter()
            .filter(|r| r.cid().is_some())
            .map(|r| r.entry.clone())
            .collect();

        if uploaded.is_empty() {
            return Err(Error::no_files_published(root));
        }

        if self.strategy == RootStrategy::Directory {
            match self.node.add_directory(root, &uploaded) {
                Ok(cid) => {
                    let pin_error = match pinner.pin(&cid) {
                        Ok(()) => None,
                        Err(e) => {
                            warn!(%cid, error = %e, "directory root left unpinned");
                            Some(e.to_string())
                        }
                    };
                    return Ok((cid, RootSource::Directory, pin_error));
                }
                Err(NodeError::Unsupported { .. }) => {
                    warn!("node cannot store whole directories; root is the first uploaded file");
                }
                Err(e) => {
                    warn!(
                        root = %root.display(),
                        error = %e,
                        "directory upload failed; root is the first uploaded file"
                    );
                }
            }
        }

        per_file
            .iter()
            .find_map(UploadResult::cid)
            .map(|cid| (cid.clone(), RootSource::FirstEntry, None))
            .ok_or_else(|| Error::no_files_published(root))
    }
}
