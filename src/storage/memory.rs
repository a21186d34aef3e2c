use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::{Result, Storage};
use crate::{error::StorageError, message::Message};

/// In-memory message store
///
/// Messages are kept in arrival order behind an `RwLock`. Nothing survives a
/// restart; this is the store for a capture server, not a spool.
///
/// An optional capacity bounds memory use. Once reached, [`Storage::store`]
/// fails with [`StorageError::CapacityExceeded`] until messages are deleted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    messages: Arc<RwLock<Vec<Message>>>,
    capacity: Option<usize>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Number of stored messages, recovering from a poisoned lock
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(&self, message: &Message) -> Result<String> {
        let mut messages = self.messages.write()?;

        if let Some(capacity) = self.capacity {
            if messages.len() >= capacity {
                return Err(StorageError::CapacityExceeded {
                    count: messages.len(),
                    capacity,
                });
            }
        }

        messages.push(message.clone());

        Ok(message.id.to_string())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.messages.read()?.len())
    }

    async fn list(&self, start: usize, limit: usize) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .read()?
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn load(&self, id: &str) -> Result<Message> {
        self.messages
            .read()?
            .iter()
            .find(|message| message.id.as_str() == id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn delete_one(&self, id: &str) -> Result<()> {
        let mut messages = self.messages.write()?;
        let position = messages
            .iter()
            .position(|message| message.id.as_str() == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;

        messages.remove(position);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.messages.write()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::message::{Message, SmtpMessage};

    use super::*;

    fn create_test_message(data: &str) -> Message {
        SmtpMessage {
            helo: "client.local".to_string(),
            from: "a@b.com".to_string(),
            to: vec!["c@d.com".to_string()],
            data: data.as_bytes().to_vec(),
        }
        .parse("test.local")
    }

    #[tokio::test]
    async fn test_basic_operations() {
        let store = MemoryStorage::new();
        let message = create_test_message("hello\r\n");

        let id = store.store(&message).await.expect("Failed to store");
        assert_eq!(id, message.id.as_str());
        assert_eq!(store.count().await.expect("Failed to count"), 1);

        let loaded = store.load(&id).await.expect("Failed to load");
        assert_eq!(loaded, message);

        store.delete_one(&id).await.expect("Failed to delete");
        assert!(store.is_empty());
        assert!(matches!(
            store.load(&id).await,
            Err(StorageError::NotFound(missing)) if missing == id
        ));
        assert!(store.delete_one(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let store = MemoryStorage::with_capacity(2);

        store
            .store(&create_test_message("one"))
            .await
            .expect("First store should succeed");
        store
            .store(&create_test_message("two"))
            .await
            .expect("Second store should succeed");

        let result = store.store(&create_test_message("three")).await;
        assert!(matches!(
            result,
            Err(StorageError::CapacityExceeded {
                count: 2,
                capacity: 2
            })
        ));

        store.delete_all().await.expect("Failed to delete all");
        assert!(store.store(&create_test_message("three")).await.is_ok());
        assert_eq!(store.capacity(), Some(2));
    }

    #[tokio::test]
    async fn test_list_preserves_order() {
        let store = MemoryStorage::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(
                store
                    .store(&create_test_message(&format!("message {i}")))
                    .await
                    .expect("Failed to store"),
            );
        }

        let page = store.list(1, 3).await.expect("Failed to list");
        assert_eq!(
            page.iter()
                .map(|message| message.id.to_string())
                .collect::<Vec<_>>(),
            ids[1..4].to_vec()
        );
        assert!(store.list(10, 3).await.expect("Failed to list").is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_stores() {
        let store = MemoryStorage::new();

        let mut handles = vec![];
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .store(&create_test_message(&format!("message {i}")))
                    .await
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            let id = handle.await.expect("Task panicked").expect("Store failed");
            assert!(ids.insert(id));
        }

        assert_eq!(store.len(), 50);
    }
}
