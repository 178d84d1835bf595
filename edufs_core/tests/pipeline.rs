//! End-to-end publish and retrieval against the in-memory node.

use edufs_core::{
    DirectoryPublisher, Error, FileWalk, MemoryNode, NamePublisher, Pinner, Retriever,
    RootSource, RootStrategy,
};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn single_file_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("notes.md");
    let content = b"# Notes\n\nbytes survive the trip\n".repeat(1000);
    fs::write(&file, &content).unwrap();

    let node = MemoryNode::new();
    let result = DirectoryPublisher::new(&node).publish(&file).unwrap();
    assert_eq!(result.root_source, RootSource::SingleFile);

    let mut out = Vec::new();
    Retriever::new(&node)
        .retrieve(&result.root_cid)
        .unwrap()
        .copy_to(&mut out)
        .unwrap();
    assert_eq!(out, content);
}

#[test]
fn download_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("data.bin");
    fs::write(&file, [1u8, 2, 3, 4]).unwrap();

    let node = MemoryNode::new();
    let result = DirectoryPublisher::new(&node).publish(&file).unwrap();

    let dest = temp_dir.path().join("downloads").join("copy.bin");
    Retriever::new(&node)
        .retrieve(&result.root_cid)
        .unwrap()
        .save_to(&dest)
        .unwrap();
    assert_eq!(fs::read(&dest).unwrap(), vec![1u8, 2, 3, 4]);
}

#[test]
fn two_file_scenario_with_name() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("b.txt"), b"world").unwrap();
    fs::write(temp_dir.path().join("a.txt"), b"hello").unwrap();

    let node = MemoryNode::new();
    let result = DirectoryPublisher::new(&node)
        .with_strategy(RootStrategy::FirstEntry)
        .publish(temp_dir.path())
        .unwrap();

    // First-entry policy: the root is a.txt's identifier, not the directory's
    assert_eq!(result.root_cid, MemoryNode::cid_for(b"hello"));
    assert_eq!(result.root_source, RootSource::FirstEntry);
    let paths: Vec<_> = result
        .per_file
        .iter()
        .map(|r| r.entry.relative_path.as_str())
        .collect();
    assert_eq!(paths, vec!["a.txt", "b.txt"]);

    let names = NamePublisher::new(&node);
    let record = names.publish_name("website", &result.root_cid).unwrap();
    assert_eq!(names.resolve(&record.name).unwrap(), result.root_cid);
}

#[test]
fn directory_root_round_trips_members() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("css")).unwrap();
    fs::write(temp_dir.path().join("index.html"), b"<html/>").unwrap();
    fs::write(temp_dir.path().join("css").join("site.css"), b"body{}").unwrap();

    let node = MemoryNode::with_directory_support();
    let result = DirectoryPublisher::new(&node)
        .publish(temp_dir.path())
        .unwrap();

    assert_eq!(result.root_source, RootSource::Directory);
    assert!(node.is_pinned(&result.root_cid));
    for file in &result.per_file {
        let cid = file.cid().unwrap();
        assert!(node.is_pinned(cid));

        let mut out = Vec::new();
        Retriever::new(&node)
            .retrieve(cid)
            .unwrap()
            .copy_to(&mut out)
            .unwrap();
        assert_eq!(out, fs::read(&file.entry.absolute_path).unwrap());
    }
}

#[test]
fn retrieve_unknown_identifier() {
    let node = MemoryNode::new();
    let cid = MemoryNode::cid_for(b"nobody uploaded this");
    let err = Retriever::new(&node).retrieve(&cid).err().unwrap();
    assert!(matches!(err, Error::ContentNotFound { .. }));
}

#[test]
fn pinning_twice_is_fine() {
    let node = MemoryNode::new();
    let cid = node.insert(b"pinned content");
    let pinner = Pinner::new(&node);
    pinner.pin(&cid).unwrap();
    pinner.pin(&cid).unwrap();
}

#[test]
fn empty_directory_publishes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let node = MemoryNode::new();
    let err = DirectoryPublisher::new(&node)
        .publish(temp_dir.path())
        .unwrap_err();
    assert!(matches!(err, Error::NoFilesPublished { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 24,
        ..ProptestConfig::default()
    })]

    /// N files give N results in walk order; the publish fails only when
    /// every upload fails, and pin failures keep their identifiers.
    #[test]
    fn one_result_per_file(
        contents in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
        faults in prop::collection::vec(0u8..3, 8),
    ) {
        let temp_dir = TempDir::new().unwrap();
        let node = MemoryNode::new();

        let mut expected_uploaded = 0;
        let mut expected_pinned = 0;
        let mut first_uploaded = None;
        for (i, data) in contents.iter().enumerate() {
            let name = format!("file{:02}.bin", i);
            // Prefix with the index so no two files share an identifier
            let mut bytes = name.clone().into_bytes();
            bytes.extend_from_slice(data);
            fs::write(temp_dir.path().join(&name), &bytes).unwrap();

            match faults[i] {
                1 => node.fail_add(name),
                fault => {
                    let cid = MemoryNode::cid_for(&bytes);
                    if fault == 2 {
                        node.fail_pin(&cid);
                    } else {
                        expected_pinned += 1;
                    }
                    expected_uploaded += 1;
                    first_uploaded.get_or_insert(cid);
                }
            }
        }

        let walked = FileWalk::new(temp_dir.path()).unwrap().entries().unwrap();
        let outcome = DirectoryPublisher::new(&node).publish(temp_dir.path());

        match first_uploaded {
            None => {
                let is_no_files = matches!(outcome, Err(Error::NoFilesPublished { .. }));
                prop_assert!(is_no_files);
            }
            Some(first) => {
                let result = outcome.unwrap();
                prop_assert_eq!(result.per_file.len(), contents.len());
                prop_assert_eq!(result.uploaded_count(), expected_uploaded);
                prop_assert_eq!(result.published_count(), expected_pinned);
                prop_assert_eq!(&result.root_cid, &first);
                for (file, entry) in result.per_file.iter().zip(&walked) {
                    prop_assert_eq!(&file.entry, entry);
                }
            }
        }
    }
}
