//! Filesystem walking.
//!
//! Produces the ordered list of regular files that a publish will upload.
//! Each directory's children are visited in byte order of their file names,
//! so paths compare component by component rather than as whole strings:
//! `a/x` comes before `a-b/x` even though `-` sorts before `/`. Walking an
//! unchanged tree twice always yields the same sequence.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// One regular file found under a publish root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Path relative to the publish root, always `/`-separated.
    pub relative_path: String,
    /// Absolute (or root-joined) path used to open the file.
    pub absolute_path: PathBuf,
    /// Size in bytes at walk time.
    pub size_bytes: u64,
}

/// Options controlling which entries the walk visits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Honour `.gitignore` and `.ignore` files. Off by default: every
    /// regular file under the root is published.
    pub respect_ignore_files: bool,
}

/// A restartable walk over a file or directory root.
#[derive(Debug, Clone)]
pub struct FileWalk {
    root: PathBuf,
    options: WalkOptions,
    root_is_file: bool,
}

impl FileWalk {
    /// Prepare a walk with default options.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(root, WalkOptions::default())
    }

    /// Prepare a walk of `root`.
    ///
    /// Fails with `NotFound` if the root does not exist. A root that is a
    /// regular file walks as a one-element sequence.
    pub fn with_options(root: impl Into<PathBuf>, options: WalkOptions) -> Result<Self> {
        let root = root.into();

        let metadata = match fs::metadata(&root) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(&root));
            }
            Err(e) => return Err(Error::walk(&root, e.to_string())),
        };

        let root_is_file = if metadata.is_file() {
            true
        } else if metadata.is_dir() {
            false
        } else {
            return Err(Error::walk(&root, "not a regular file or directory"));
        };

        Ok(Self {
            root,
            options,
            root_is_file,
        })
    }

    /// The root this walk was created for.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the root is a single file rather than a directory.
    pub fn is_single_file(&self) -> bool {
        self.root_is_file
    }

    /// Start a fresh pass over the filesystem.
    ///
    /// Each call re-reads the tree, so the sequence can be restarted.
    pub fn iter(&self) -> FileWalkIter<'_> {
        let inner = if self.root_is_file {
            Inner::Single { done: false }
        } else {
            let mut builder = ignore::WalkBuilder::new(&self.root);
            builder
                .standard_filters(false) // Every file, including hidden ones
                .follow_links(false)
                .sort_by_file_name(|a, b| a.cmp(b));

            if self.options.respect_ignore_files {
                builder.ignore(true).git_ignore(true).require_git(false);
            }

            Inner::Tree(builder.build())
        };

        FileWalkIter { walk: self, inner }
    }

    /// Collect the whole walk, stopping at the first error.
    pub fn entries(&self) -> Result<Vec<FileEntry>> {
        self.iter().collect()
    }

    /// Build the entry for the single-file root.
    fn single_entry(&self) -> Result<FileEntry> {
        let metadata = fs::metadata(&self.root).map_err(|e| Error::walk(&self.root, e.to_string()))?;
        let relative_path = self
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::walk(&self.root, "file name is not valid UTF-8"))?
            .to_string();

        Ok(FileEntry {
            relative_path,
            absolute_path: self.root.clone(),
            size_bytes: metadata.len(),
        })
    }

    /// Turn one walker entry into a `FileEntry`, or `None` for directories.
    fn visit(&self, entry: ignore::DirEntry) -> Result<Option<FileEntry>> {
        let path = entry.path();

        // The root directory itself
        if entry.depth() == 0 {
            return Ok(None);
        }

        let file_type = entry
            .file_type()
            .ok_or_else(|| Error::walk(path, "unknown file type"))?;

        if file_type.is_dir() {
            return Ok(None);
        }

        if file_type.is_symlink() {
            return Err(Error::walk(path, "symlinks are not published"));
        }

        if !file_type.is_file() {
            return Err(Error::walk(path, "not a regular file"));
        }

        let metadata = entry
            .metadata()
            .map_err(|e| Error::walk(path, e.to_string()))?;

        Ok(Some(FileEntry {
            relative_path: relative_path(&self.root, path)?,
            absolute_path: path.to_path_buf(),
            size_bytes: metadata.len(),
        }))
    }
}

impl<'a> IntoIterator for &'a FileWalk {
    type Item = Result<FileEntry>;
    type IntoIter = FileWalkIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

enum Inner {
    Single { done: bool },
    Tree(ignore::Walk),
}

/// Lazy iterator over the files of a `FileWalk`.
pub struct FileWalkIter<'a> {
    walk: &'a FileWalk,
    inner: Inner,
}

impl Iterator for FileWalkIter<'_> {
    type Item = Result<FileEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Single { done } => {
                if *done {
                    return None;
                }
                *done = true;
                Some(self.walk.single_entry())
            }
            Inner::Tree(walker) => loop {
                let entry = match walker.next()? {
                    Ok(entry) => entry,
                    Err(err) => return Some(Err(walk_error(&self.walk.root, err))),
                };

                match self.walk.visit(entry) {
                    Ok(Some(file)) => return Some(Ok(file)),
                    Ok(None) => continue,
                    Err(e) => return Some(Err(e)),
                }
            },
        }
    }
}

/// Render `path` relative to `root` with `/` separators.
fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::walk(path, "entry is outside the walk root"))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                let name = name
                    .to_str()
                    .ok_or_else(|| Error::walk(path, "file name is not valid UTF-8"))?;
                parts.push(name);
            }
            _ => return Err(Error::walk(path, "unexpected path component")),
        }
    }

    if parts.is_empty() {
        return Err(Error::walk(path, "empty relative path"));
    }

    Ok(parts.join("/"))
}

/// Attach the most specific path available to a walker error.
fn walk_error(root: &Path, err: ignore::Error) -> Error {
    match err {
        ignore::Error::WithPath { path, err } => Error::walk(path, err.to_string()),
        ignore::Error::WithDepth { err, .. } => walk_error(root, *err),
        ignore::Error::Loop { child, .. } => Error::walk(child, "filesystem loop"),
        other => Error::walk(root, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.relative_path.as_str()).collect()
    }

    #[test]
    fn test_walk_nonexistent_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileWalk::new(temp_dir.path().join("missing"));
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_walk_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("report.txt");
        fs::write(&file, b"hello").unwrap();

        let walk = FileWalk::new(&file).unwrap();
        assert!(walk.is_single_file());

        let entries = walk.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path, "report.txt");
        assert_eq!(entries[0].absolute_path, file);
        assert_eq!(entries[0].size_bytes, 5);
    }

    #[test]
    fn test_walk_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let walk = FileWalk::new(temp_dir.path()).unwrap();
        assert!(!walk.is_single_file());
        assert!(walk.entries().unwrap().is_empty());
    }

    #[test]
    fn test_walk_sorted_and_nested() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("b.txt"), b"b").unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("z.txt"), b"z").unwrap();
        fs::write(root.join("sub").join("c.txt"), b"c").unwrap();
        fs::create_dir(root.join("empty")).unwrap();

        let entries = FileWalk::new(root).unwrap().entries().unwrap();
        assert_eq!(names(&entries), vec!["a.txt", "b.txt", "sub/c.txt", "sub/z.txt"]);
    }

    #[test]
    fn test_walk_orders_by_component() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("a-b")).unwrap();
        fs::write(root.join("a-b").join("x"), b"1").unwrap();
        fs::create_dir(root.join("a")).unwrap();
        fs::write(root.join("a").join("x"), b"2").unwrap();

        let entries = FileWalk::new(root).unwrap().entries().unwrap();
        assert_eq!(names(&entries), vec!["a/x", "a-b/x"]);
    }

    #[test]
    fn test_walk_includes_hidden_and_ignored_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".hidden"), b"h").unwrap();
        fs::write(root.join(".gitignore"), b"skipped.log\n").unwrap();
        fs::write(root.join("skipped.log"), b"log").unwrap();

        let entries = FileWalk::new(root).unwrap().entries().unwrap();
        assert_eq!(names(&entries), vec![".gitignore", ".hidden", "skipped.log"]);
    }

    #[test]
    fn test_walk_respects_ignore_files_when_asked() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join(".gitignore"), b"skipped.log\n").unwrap();
        fs::write(root.join("kept.txt"), b"k").unwrap();
        fs::write(root.join("skipped.log"), b"log").unwrap();

        let options = WalkOptions {
            respect_ignore_files: true,
        };
        let entries = FileWalk::with_options(root, options)
            .unwrap()
            .entries()
            .unwrap();
        assert_eq!(names(&entries), vec![".gitignore", "kept.txt"]);
    }

    #[test]
    fn test_walk_is_restartable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("one"), b"1").unwrap();

        let walk = FileWalk::new(root).unwrap();
        assert_eq!(walk.iter().count(), 1);

        fs::write(root.join("two"), b"2").unwrap();
        let again: Vec<_> = walk.iter().collect::<Result<_>>().unwrap();
        assert_eq!(names(&again), vec!["one", "two"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_walk_surfaces_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("target.txt"), b"t").unwrap();
        std::os::unix::fs::symlink(root.join("target.txt"), root.join("link.txt")).unwrap();

        let walk = FileWalk::new(root).unwrap();
        let results: Vec<_> = walk.iter().collect();
        assert_eq!(results.len(), 2);

        match &results[0] {
            Err(Error::Walk { path, reason }) => {
                assert!(path.ends_with("link.txt"));
                assert!(reason.contains("symlink"));
            }
            other => panic!("expected walk error, got {:?}", other),
        }
        assert!(results[1].is_ok());
        assert!(walk.entries().is_err());
    }

    #[test]
    fn test_relative_path_uses_forward_slashes() {
        let root = Path::new("root");
        let path = root.join("a").join("b").join("c.txt");
        assert_eq!(relative_path(root, &path).unwrap(), "a/b/c.txt");
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            ..ProptestConfig::default()
        })]

        /// Walking the same tree twice yields identical, sorted sequences.
        #[test]
        fn prop_walk_deterministic(
            files in prop::collection::btree_set("[a-z]{1,6}(/[a-z]{1,6}){0,2}", 1..12)
        ) {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path();

            let mut written = Vec::new();
            for file in &files {
                // Skip names that collide with a directory created for another file
                let path = root.join(file);
                if path.is_dir() || path.ancestors().skip(1).any(|a| a.is_file()) {
                    continue;
                }
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).unwrap();
                }
                fs::write(&path, file.as_bytes()).unwrap();
                written.push(file.clone());
            }

            let walk = FileWalk::new(root).unwrap();
            let first = walk.entries().unwrap();
            let second = walk.entries().unwrap();
            prop_assert_eq!(&first, &second);

            let mut expected: Vec<_> = written
                .iter()
                .filter(|f| root.join(f).is_file())
                .cloned()
                .collect();
            expected.sort_by(|a, b| Path::new(a).cmp(Path::new(b)));
            let actual: Vec<String> = first.iter().map(|e| e.relative_path.clone()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
