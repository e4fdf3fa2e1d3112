//! Readdir Integration Tests
//!
//! Kernel-style enumeration through `DirectoryReader`.

use std::sync::Arc;

use xtfs_client::dir::{InMemoryVolume, LocalVolume};
use xtfs_client::{ClientMetrics, ClientOptions, DirectoryReader, UserCredentials};

fn options(chunk_size: usize) -> ClientOptions {
    ClientOptions {
        readdir_chunk_size: chunk_size,
        ..ClientOptions::default()
    }
}

fn volume(path: &str, count: usize) -> Arc<InMemoryVolume> {
    let volume = Arc::new(InMemoryVolume::new());
    volume.create_directory(path);
    for i in 0..count {
        volume.create_entry(path, &format!("file{:03}", i)).unwrap();
    }
    volume
}

#[tokio::test]
async fn test_chunk_boundaries_issue_expected_rpcs() {
    let volume = volume("/docs", 5);
    let reader = DirectoryReader::new(volume.clone(), options(3)).unwrap();
    let creds = UserCredentials::default();
    let handle = reader.opendir("/docs");

    let mut names = Vec::new();
    for offset in [0, 3, 5] {
        reader
            .readdir(handle, &creds, offset, |entry, _| {
                names.push(entry.name.clone());
                false
            })
            .await
            .unwrap();
    }

    assert_eq!(names.len(), 5);
    // The last call is answered by the cached final chunk.
    assert_eq!(volume.offsets_requested(), vec![0, 3]);
    reader.releasedir(handle).unwrap();
}

#[tokio::test]
async fn test_resume_inside_batch_uses_cache() {
    let volume = volume("/docs", 20);
    let metrics = ClientMetrics::new().unwrap();
    let reader = DirectoryReader::new(volume.clone(), options(16))
        .unwrap()
        .with_metrics(metrics.clone());
    let creds = UserCredentials::default();
    let handle = reader.opendir("/docs");

    let mut first = Vec::new();
    reader
        .readdir(handle, &creds, 0, |entry, _| {
            if first.len() == 4 {
                return true;
            }
            first.push(entry.name.clone());
            false
        })
        .await
        .unwrap();

    let mut second = Vec::new();
    let outcome = reader
        .readdir(handle, &creds, 4, |entry, _| {
            second.push(entry.name.clone());
            false
        })
        .await
        .unwrap();

    assert!(!outcome.rpc_issued);
    assert_eq!(second.first().map(String::as_str), Some("file004"));
    assert_eq!(second.len(), 12);
    assert_eq!(volume.read_dir_calls(), 1);
    assert_eq!(metrics.readdir_cache_hits.get(), 1);
}

#[tokio::test]
async fn test_handles_have_independent_caches() {
    let volume = volume("/docs", 8);
    let reader = Arc::new(DirectoryReader::new(volume.clone(), options(8)).unwrap());
    let creds = UserCredentials::default();
    let a = reader.opendir("/docs");
    let b = reader.opendir("/docs");

    let (left, right) = tokio::join!(
        reader.readdir(a, &creds, 0, |_, _| false),
        reader.readdir(b, &creds, 0, |_, _| false)
    );
    assert_eq!(left.unwrap().emitted, 8);
    assert_eq!(right.unwrap().emitted, 8);
    assert_eq!(volume.read_dir_calls(), 2);

    reader.releasedir(a).unwrap();
    assert!(reader.releasedir(a).is_err());
    reader.releasedir(b).unwrap();
}

#[tokio::test]
async fn test_mutation_between_calls_is_tolerated() {
    let volume = volume("/docs", 6);
    let reader = DirectoryReader::new(volume.clone(), options(3)).unwrap();
    let creds = UserCredentials::default();
    let handle = reader.opendir("/docs");

    let mut names = Vec::new();
    let mut offset = 0;
    loop {
        let mut next_offset = offset;
        let outcome = reader
            .readdir(handle, &creds, offset, |entry, next| {
                names.push(entry.name.clone());
                next_offset = next;
                false
            })
            .await
            .unwrap();
        if outcome.emitted == 0 {
            break;
        }
        if offset == 0 {
            // Shift every later entry down by one.
            assert!(volume.remove_entry("/docs", "file000"));
        }
        offset = next_offset;
    }

    // file003 moved into position 2, which was already read.
    assert_eq!(names, vec!["file000", "file001", "file002", "file004", "file005"]);
}

#[tokio::test]
async fn test_list_local_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    for name in ["b.txt", "a.txt", "c.txt"] {
        std::fs::write(dir.path().join("sub").join(name), b"x").unwrap();
    }

    let reader = DirectoryReader::new(Arc::new(LocalVolume::new(dir.path())), options(2)).unwrap();
    let entries = reader
        .list(&UserCredentials::default(), "/sub", 1)
        .await
        .unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
    assert!(reader.table().is_empty());
}
