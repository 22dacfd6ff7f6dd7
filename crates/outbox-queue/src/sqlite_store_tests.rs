use super::*;
use crate::operation::PayloadValue;
use tempfile::TempDir;

#[tokio::test]
async fn test_insert_and_list() {
    let store = SqliteOperationStore::in_memory().await.unwrap();

    let a = store.insert(10, None).await.unwrap();
    let b = store.insert(20, None).await.unwrap();

    let records = store.list_all_ordered().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].sequence, a);
    assert_eq!(records[0].opcode, 10);
    assert_eq!(records[1].sequence, b);
    assert_eq!(records[1].opcode, 20);
}

#[tokio::test]
async fn test_payload_round_trip() {
    let store = SqliteOperationStore::in_memory().await.unwrap();
    let mut payload = Payload::new();
    payload.insert("article".to_string(), PayloadValue::Integer(1234));
    payload.insert("title".to_string(), PayloadValue::Text("Offline".to_string()));
    payload.insert("read".to_string(), PayloadValue::Bool(true));

    store.insert(3, Some(&payload)).await.unwrap();
    store.insert(4, None).await.unwrap();

    let records = store.list_all_ordered().await.unwrap();
    assert_eq!(records[0].payload.as_ref(), Some(&payload));
    assert!(records[1].payload.is_none());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = SqliteOperationStore::in_memory().await.unwrap();
    let seq = store.insert(1, None).await.unwrap();

    store.delete(seq).await.unwrap();
    store.delete(seq).await.unwrap();

    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sequences_not_reused_after_delete() {
    let store = SqliteOperationStore::in_memory().await.unwrap();
    let first = store.insert(1, None).await.unwrap();
    store.delete(first).await.unwrap();

    let second = store.insert(1, None).await.unwrap();
    assert!(second > first);
}

#[tokio::test]
async fn test_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("queue.db");

    let (kept, dropped) = {
        let store = SqliteOperationStore::open(&path).await.unwrap();
        let kept = store.insert(7, None).await.unwrap();
        let dropped = store.insert(8, None).await.unwrap();
        store.insert(9, None).await.unwrap();
        store.delete(dropped).await.unwrap();
        (kept, dropped)
    };

    let store = SqliteOperationStore::open(&path).await.unwrap();
    let records = store.list_all_ordered().await.unwrap();
    let sequences: Vec<_> = records.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences.len(), 2);
    assert_eq!(sequences[0], kept);
    assert!(!sequences.contains(&dropped));
    assert_eq!(records[1].opcode, 9);
}

#[tokio::test]
async fn test_corrupt_payload_is_storage_error() {
    let store = SqliteOperationStore::in_memory().await.unwrap();
    store
        .conn
        .call(|conn| {
            conn.execute(
                "INSERT INTO operations (opcode, payload, created_at) VALUES (1, 'not json', '')",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let result = store.list_all_ordered().await;
    assert!(matches!(result, Err(QueueError::Storage(_))));
}

#[tokio::test]
async fn test_non_finite_float_is_not_stored() {
    let store = SqliteOperationStore::in_memory().await.unwrap();
    let mut payload = Payload::new();
    payload.insert("v".to_string(), PayloadValue::Float(f64::NAN));

    let result = store.insert(1, Some(&payload)).await;
    assert!(matches!(result, Err(QueueError::InvalidPayload(_))));
    assert_eq!(store.len().await.unwrap(), 0);
}
