use std::sync::Arc;

use serde_json::json;
use strata_message_store::{AppendOnlyStore, Error, FileStore, InMemoryStore, TimeRange};

async fn append_and_read<S: AppendOnlyStore>(store: &S) {
    let records = store
        .append("a", vec![json!({ "n": 1 }), json!({ "n": 2 })], 0)
        .await
        .unwrap();
    assert_eq!(
        records.iter().map(|r| (r.id, r.version)).collect::<Vec<_>>(),
        vec![(1, 1), (2, 2)]
    );

    store.append("b", vec![json!({ "n": 3 })], 0).await.unwrap();
    store.append("a", vec![json!({ "n": 4 })], 2).await.unwrap();

    let a = store.read_records("a", 0, None).await.unwrap();
    assert_eq!(
        a.iter().map(|r| r.version).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(a[2].data, json!({ "n": 4 }));
    assert!(a.iter().all(|r| r.stream_id == "a"));

    let after = store.read_records("a", 1, Some(1)).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].version, 2);

    assert!(store.read_records("missing", 0, None).await.unwrap().is_empty());

    let all = store.read_all_records(0, None).await.unwrap();
    assert_eq!(
        all.iter()
            .map(|r| (r.stream_id.as_str(), r.id))
            .collect::<Vec<_>>(),
        vec![("a", 1), ("a", 2), ("b", 3), ("a", 4)]
    );

    let page = store.read_all_records(1, Some(2)).await.unwrap();
    assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);
}

async fn rejects_wrong_version<S: AppendOnlyStore>(store: &S) {
    store.append("a", vec![json!(1)], 0).await.unwrap();

    let err = store.append("a", vec![json!(2)], 0).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Concurrency {
            ref stream_id,
            expected_version: 0,
            actual_version: 1,
        } if stream_id == "a"
    ));
    assert_eq!(
        err.to_string(),
        r#"expected stream "a" to be at version 0, got 1"#
    );

    // Empty appends still check the version.
    assert!(store.append("a", vec![], 5).await.is_err());
    assert!(store.append("a", vec![], 1).await.unwrap().is_empty());

    assert_eq!(store.read_all_records(0, None).await.unwrap().len(), 1);
}

async fn reads_time_range<S: AppendOnlyStore>(store: &S) {
    store.append("a", vec![json!(1)], 0).await.unwrap();
    let all = store.read_all_records(0, None).await.unwrap();
    let ts = all[0].timestamp;

    let inside = TimeRange::new(Some(ts - 1), Some(ts + 1));
    assert_eq!(store.read_all_records_in_range(inside).await.unwrap().len(), 1);

    let after = TimeRange::new(Some(ts), None);
    assert!(store.read_all_records_in_range(after).await.unwrap().is_empty());

    let before = TimeRange::new(None, Some(ts));
    assert!(store.read_all_records_in_range(before).await.unwrap().is_empty());
}

async fn one_writer_wins<S: AppendOnlyStore + 'static>(store: Arc<S>) {
    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.append("race", vec![json!(n)], 0).await })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;
    let written = results
        .into_iter()
        .map(|result| result.unwrap())
        .filter(|result| match result {
            Ok(_) => true,
            Err(err) => {
                assert!(err.is_concurrency());
                false
            }
        })
        .count();
    assert_eq!(written, 1);

    let stream = store.read_records("race", 0, None).await.unwrap();
    assert_eq!(stream.len(), 1);
    assert_eq!(stream[0].version, 1);
}

#[tokio::test]
async fn in_memory_append_and_read() {
    append_and_read(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn file_append_and_read() {
    let dir = tempfile::tempdir().unwrap();
    append_and_read(&FileStore::open(dir.path().join("events.log"), false).unwrap()).await;
}

#[tokio::test]
async fn in_memory_rejects_wrong_version() {
    rejects_wrong_version(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn file_rejects_wrong_version() {
    let dir = tempfile::tempdir().unwrap();
    rejects_wrong_version(&FileStore::open(dir.path().join("events.log"), false).unwrap()).await;
}

#[tokio::test]
async fn in_memory_reads_time_range() {
    reads_time_range(&InMemoryStore::new()).await;
}

#[tokio::test]
async fn file_reads_time_range() {
    let dir = tempfile::tempdir().unwrap();
    reads_time_range(&FileStore::open(dir.path().join("events.log"), false).unwrap()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_memory_one_writer_wins() {
    one_writer_wins(Arc::new(InMemoryStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_one_writer_wins() {
    let dir = tempfile::tempdir().unwrap();
    one_writer_wins(Arc::new(
        FileStore::open(dir.path().join("events.log"), false).unwrap(),
    ))
    .await;
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.log");

    {
        let store = FileStore::open(&path, false).unwrap();
        append_and_read(&store).await;
    }

    let store = FileStore::open(&path, false).unwrap();
    let all = store.read_all_records(0, None).await.unwrap();
    assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

    let records = store.append("b", vec![json!(5)], 1).await.unwrap();
    assert_eq!((records[0].id, records[0].version), (5, 2));
}
