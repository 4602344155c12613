use std::collections::HashMap;
use std::sync::RwLock;

use campusdesk_core::ExpectedVersion;

use super::{Document, Filter, Repository, StoreError};

/// In-memory document collection.
///
/// Intended for tests/dev. Not optimized for performance.
pub struct InMemoryRepository<D: Document> {
    docs: RwLock<HashMap<D::Key, D>>,
}

impl<D: Document> InMemoryRepository<D> {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }
}

impl<D: Document> Default for InMemoryRepository<D> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl<D: Document> Repository<D> for InMemoryRepository<D> {
    async fn find_by_id(&self, key: &D::Key) -> Result<Option<D>, StoreError> {
        let docs = self.docs.read().map_err(|_| poisoned())?;
        Ok(docs.get(key).cloned())
    }

    async fn find(&self, filter: Filter<'_, D>) -> Result<Vec<D>, StoreError> {
        let docs = self.docs.read().map_err(|_| poisoned())?;
        Ok(docs.values().filter(|d| filter(d)).cloned().collect())
    }

    async fn create(&self, doc: D) -> Result<D, StoreError> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        let key = doc.key();
        if docs.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                collection: D::COLLECTION,
                key: key.to_string(),
            });
        }
        docs.insert(key, doc.clone());
        Ok(doc)
    }

    async fn save(&self, doc: D, expected: ExpectedVersion) -> Result<D, StoreError> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        let key = doc.key();
        match docs.get(&key) {
            Some(stored) if !expected.matches(stored.revision()) => {
                return Err(StoreError::Concurrency {
                    collection: D::COLLECTION,
                    key: key.to_string(),
                    expected,
                    actual: stored.revision(),
                });
            }
            None if expected != ExpectedVersion::Any => {
                return Err(StoreError::NotFound {
                    collection: D::COLLECTION,
                    key: key.to_string(),
                });
            }
            _ => {}
        }
        docs.insert(key, doc.clone());
        Ok(doc)
    }

    async fn delete(&self, key: &D::Key) -> Result<bool, StoreError> {
        let mut docs = self.docs.write().map_err(|_| poisoned())?;
        Ok(docs.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: u32,
        rev: u64,
        body: &'static str,
    }

    impl Document for Note {
        type Key = u32;
        const COLLECTION: &'static str = "notes";

        fn key(&self) -> u32 {
            self.id
        }

        fn revision(&self) -> u64 {
            self.rev
        }
    }

    fn note(rev: u64, body: &'static str) -> Note {
        Note { id: 1, rev, body }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_keys() {
        let repo = InMemoryRepository::<Note>::new();
        repo.create(note(0, "a")).await.unwrap();
        let err = repo.create(note(0, "b")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn save_checks_the_loaded_revision() {
        let repo = InMemoryRepository::<Note>::new();
        repo.create(note(3, "a")).await.unwrap();

        repo.save(note(4, "b"), ExpectedVersion::Exact(3)).await.unwrap();
        let err = repo
            .save(note(4, "stale"), ExpectedVersion::Exact(3))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency { actual: 4, .. }));
        assert_eq!(repo.find_by_id(&1).await.unwrap().unwrap().body, "b");
    }

    #[tokio::test]
    async fn save_with_any_upserts() {
        let repo = InMemoryRepository::<Note>::new();
        repo.save(note(0, "a"), ExpectedVersion::Any).await.unwrap();
        assert!(repo.find_by_id(&1).await.unwrap().is_some());
        assert!(matches!(
            repo.save(Note { id: 2, rev: 1, body: "x" }, ExpectedVersion::Exact(0)).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn find_applies_the_filter_and_delete_reports_removal() {
        let repo = InMemoryRepository::<Note>::new();
        repo.create(Note { id: 1, rev: 0, body: "keep" }).await.unwrap();
        repo.create(Note { id: 2, rev: 0, body: "drop" }).await.unwrap();

        let hits = repo.find(&|n: &Note| n.body == "keep").await.unwrap();
        assert_eq!(hits.len(), 1);

        assert!(repo.delete(&2).await.unwrap());
        assert!(!repo.delete(&2).await.unwrap());
    }
}
