//! Document persistence boundary.
//!
//! One [`Repository`] per document type. Writes of versioned documents
//! (orders, carts) carry an [`ExpectedVersion`] checked against the stored
//! revision, so two writers racing on the same document cannot both win.

pub mod documents;
pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use campusdesk_core::ExpectedVersion;
use campusdesk_orders::{
    Cart, Collector, Courier, News, Notification, Order, Parameter, PlacedCart, PlacedOrder,
    Service,
};

use crate::users::UserRecord;

pub use in_memory::InMemoryRepository;

/// A persisted document: a key plus, for versioned documents, a revision.
pub trait Document: Clone + Send + Sync + 'static {
    type Key: Clone + Eq + std::hash::Hash + std::fmt::Display + Send + Sync + 'static;

    /// Collection name, used in errors and logs.
    const COLLECTION: &'static str;

    fn key(&self) -> Self::Key;

    /// Unversioned documents stay at 0.
    fn revision(&self) -> u64 {
        0
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} {key} not found")]
    NotFound {
        collection: &'static str,
        key: String,
    },

    #[error("{collection} {key} already exists")]
    AlreadyExists {
        collection: &'static str,
        key: String,
    },

    #[error("stale write to {collection} {key}: expected {expected:?}, stored revision {actual}")]
    Concurrency {
        collection: &'static str,
        key: String,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Row predicate for [`Repository::find`].
pub type Filter<'a, D> = &'a (dyn Fn(&D) -> bool + Send + Sync);

#[async_trait::async_trait]
pub trait Repository<D: Document>: Send + Sync {
    async fn find_by_id(&self, key: &D::Key) -> Result<Option<D>, StoreError>;

    async fn find(&self, filter: Filter<'_, D>) -> Result<Vec<D>, StoreError>;

    /// Insert a new document. Fails if the key is taken.
    async fn create(&self, doc: D) -> Result<D, StoreError>;

    /// Replace a document. `expected` is the revision the caller loaded;
    /// with [`ExpectedVersion::Any`] a missing document is inserted.
    async fn save(&self, doc: D, expected: ExpectedVersion) -> Result<D, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, key: &D::Key) -> Result<bool, StoreError>;
}

/// Every collection the portal reads or writes.
#[derive(Clone)]
pub struct Persistence {
    pub users: Arc<dyn Repository<UserRecord>>,
    pub orders: Arc<dyn Repository<Order>>,
    pub carts: Arc<dyn Repository<Cart>>,
    pub services: Arc<dyn Repository<Service>>,
    pub parameters: Arc<dyn Repository<Parameter>>,
    pub notifications: Arc<dyn Repository<Notification>>,
    pub news: Arc<dyn Repository<News>>,
    pub placed_orders: Arc<dyn Repository<PlacedOrder>>,
    pub placed_carts: Arc<dyn Repository<PlacedCart>>,
    pub couriers: Arc<dyn Repository<Courier>>,
    pub collectors: Arc<dyn Repository<Collector>>,
}

impl Persistence {
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryRepository::new()),
            orders: Arc::new(InMemoryRepository::new()),
            carts: Arc::new(InMemoryRepository::new()),
            services: Arc::new(InMemoryRepository::new()),
            parameters: Arc::new(InMemoryRepository::new()),
            notifications: Arc::new(InMemoryRepository::new()),
            news: Arc::new(InMemoryRepository::new()),
            placed_orders: Arc::new(InMemoryRepository::new()),
            placed_carts: Arc::new(InMemoryRepository::new()),
            couriers: Arc::new(InMemoryRepository::new()),
            collectors: Arc::new(InMemoryRepository::new()),
        }
    }
}
