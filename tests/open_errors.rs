//! Opening repositories that are not clean, current archives.

use std::sync::Arc;

use alembic_git::repo::GroupBuilder;
use alembic_git::{
    ArchiveReader, ArchiveWriter, Error, FsRepository, MetaData, OpenMode, Repository,
};
use tempfile::TempDir;

/// Commit a hand-built root group with the given format version and an
/// empty root object (no hash suffix).
fn commit_raw_archive(path: &std::path::Path, version: i32) {
    let repo: Arc<dyn Repository> = Arc::new(FsRepository::open(path, OpenMode::Write).unwrap());
    let mut root = GroupBuilder::root(Arc::clone(&repo));
    root.add_data(&version.to_le_bytes()).unwrap();
    root.add_data(&100i32.to_le_bytes()).unwrap();

    let mut object = root.child();
    let mut props = object.child();
    props.add_empty_data();
    object.add_group(props.finish().unwrap());
    object.add_empty_data();
    root.add_group(object.finish().unwrap());

    root.add_data(b"_ai_Application=raw").unwrap();
    root.add_empty_data();
    root.add_empty_data();
    let tree = root.finish().unwrap();
    repo.commit(tree, "test", "raw archive").unwrap();
}

#[test]
fn test_missing_path() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        ArchiveReader::open(dir.path().join("nothing")),
        Err(Error::RepositoryNotFound(_))
    ));
}

#[test]
fn test_foreign_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    assert!(matches!(
        ArchiveReader::open(dir.path()),
        Err(Error::InvalidRepository { .. })
    ));
}

#[test]
fn test_unclosed_writer_is_not_frozen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("crashed");
    let archive = ArchiveWriter::create(&path).unwrap();
    archive.top().create_child("a", MetaData::new()).unwrap();
    // Simulate a crash: no close, no drop.
    std::mem::forget(archive);

    match ArchiveReader::open(&path) {
        Err(Error::NotFrozen(p)) => assert_eq!(p, path),
        other => panic!("expected NotFrozen, got {other:?}"),
    }
}

#[test]
fn test_crash_after_a_commit_keeps_previous_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scene");
    let first = ArchiveWriter::create(&path).unwrap().close().unwrap();

    std::mem::forget(ArchiveWriter::create(&path).unwrap());
    assert!(matches!(ArchiveReader::open(&path), Err(Error::NotFrozen(_))));

    // The next clean writer takes over and commits on top of the first.
    let third = ArchiveWriter::create(&path).unwrap().close().unwrap();
    let archive = ArchiveReader::open(&path).unwrap();
    assert_eq!(archive.commit_id(), third);
    let history = archive.repository().history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].0, first);
}

#[test]
fn test_panicking_writer_is_not_frozen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("panicked");
    let result = std::panic::catch_unwind(|| {
        let archive = ArchiveWriter::create(&path).unwrap();
        archive.top().create_child("half", MetaData::new()).unwrap();
        panic!("writer crashed");
    });
    assert!(result.is_err());

    match ArchiveReader::open(&path) {
        Err(Error::NotFrozen(p)) => assert_eq!(p, path),
        other => panic!("expected NotFrozen, got {other:?}"),
    }
}

#[test]
fn test_dropped_writer_commits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dropped");
    {
        let archive = ArchiveWriter::create(&path).unwrap();
        archive.top().create_child("kept", MetaData::new()).unwrap();
    }
    let archive = ArchiveReader::open(&path).unwrap();
    assert!(archive.find_object("/kept").unwrap().is_some());
}

#[test]
fn test_unsupported_format_version() {
    let dir = TempDir::new().unwrap();
    for version in [0, 3, 99] {
        let path = dir.path().join(format!("v{version}"));
        commit_raw_archive(&path, version);
        match ArchiveReader::open(&path) {
            Err(Error::UnsupportedVersion { found, min, max }) => {
                assert_eq!((found, min, max), (version, 1, 2));
            }
            other => panic!("version {version}: expected UnsupportedVersion, got {other:?}"),
        }
    }
}

#[test]
fn test_version_one_archive_reads_without_hashes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("v1");
    commit_raw_archive(&path, 1);

    let archive = ArchiveReader::open(&path).unwrap();
    assert_eq!(archive.format_version(), 1);
    assert_eq!(archive.library_version(), 100);
    assert_eq!(archive.application(), Some("raw"));
    assert_eq!(archive.num_time_samplings(), 1);
    let top = archive.top().unwrap();
    assert_eq!(top.num_children(), 0);
    assert!(top.properties_hash().is_none());
    assert!(top.children_hash().is_none());
    assert_eq!(top.properties().unwrap().num_properties(), 0);
}

#[test]
fn test_truncated_root_group() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short");
    let repo: Arc<dyn Repository> = Arc::new(FsRepository::open(&path, OpenMode::Write).unwrap());
    let mut root = GroupBuilder::root(Arc::clone(&repo));
    root.add_data(&2i32.to_le_bytes()).unwrap();
    root.add_data(&1i32.to_le_bytes()).unwrap();
    let tree = root.finish().unwrap();
    repo.commit(tree, "test", "short").unwrap();

    assert!(matches!(ArchiveReader::open(&path), Err(Error::InvalidStructure(_))));
}
