
    use super::*;
    use crate::operation::PayloadValue;

    #[tokio::test]
    async fn test_memory_store_insert_assigns_increasing_sequences() {
        let store = MemoryOperationStore::new();

        let a = store.insert(1, None).await.unwrap();
        let b = store.insert(1, None).await.unwrap();
        let c = store.insert(2, None).await.unwrap();

        assert!(a < b && b < c);
        assert_eq!(store.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_memory_store_sequences_not_reused() {
        let store = MemoryOperationStore::new();

        let a = store.insert(1, None).await.unwrap();
        store.delete(a).await.unwrap();
        let b = store.insert(1, None).await.unwrap();

        assert!(b > a);
    }

    #[tokio::test]
    async fn test_memory_store_list_ordered() {
        let store = MemoryOperationStore::new();
        for opcode in [30, 10, 20] {
            store.insert(opcode, None).await.unwrap();
        }

        let records = store.list_all_ordered().await.unwrap();
        let opcodes: Vec<_> = records.iter().map(|r| r.opcode).collect();
        assert_eq!(opcodes, vec![30, 10, 20]);
        assert!(records.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[tokio::test]
    async fn test_memory_store_keeps_payload() {
        let store = MemoryOperationStore::new();
        let mut payload = Payload::new();
        payload.insert("item".to_string(), PayloadValue::Integer(99));

        store.insert(5, Some(&payload)).await.unwrap();

        let records = store.list_all_ordered().await.unwrap();
        assert_eq!(records[0].payload.as_ref(), Some(&payload));
    }

    #[tokio::test]
    async fn test_memory_store_delete_is_idempotent() {
        let store = MemoryOperationStore::new();
        let seq = store.insert(1, None).await.unwrap();

        store.delete(seq).await.unwrap();
        store.delete(seq).await.unwrap();
        store.delete(12345).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 0);
    }
