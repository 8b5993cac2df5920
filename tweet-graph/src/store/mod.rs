//! The document store contract and its clients.
//!
//! The store is an external collaborator: documents are schema-flexible JSON objects grouped
//! in named collections, addressable by id or by a single field-equality filter.
//! No multi-document transactions are used.

mod firestore;
mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
pub use firestore::FirestoreStore;
pub use memory::InMemoryStore;

use crate::configuration::StoreConfig;
use crate::error::ConfigurationError;
use crate::error::StoreError;
use crate::json_ext::Object;
use crate::json_ext::Value;

/// A raw, untyped document as returned by the store.
pub type Document = Object;

/// The collections used by the feed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Collection {
    /// `users`, keyed by user id.
    Users,
    /// `tweets`, keyed by tweet id. `userId` is queryable.
    Tweets,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Tweets => "tweets",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A networked key/document service.
///
/// Every call is a suspension point; implementations must not block the executor thread.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetches a document by id, `None` when it does not exist.
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Scans a whole collection.
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    /// Scans a collection with a single equality filter on `field`.
    ///
    /// Result order is store-defined.
    async fn query(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Merges `fields` into an existing document.
    ///
    /// Fails with [`StoreError::Rejected`] when the document does not exist.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError>;

    /// Adds `by` to a numeric field as a single store-side operation.
    ///
    /// Fails with [`StoreError::Rejected`] when the document does not exist.
    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), StoreError>;
}

/// Creates the process-wide store client described by the configuration.
///
/// The returned handle is shared by every component and must only be created once.
pub fn from_configuration(
    config: &StoreConfig,
) -> Result<Arc<dyn DocumentStore>, ConfigurationError> {
    match config {
        StoreConfig::Memory(memory) => {
            let store = match &memory.seed {
                Some(path) => InMemoryStore::from_seed_file(path)?,
                None => InMemoryStore::default(),
            };
            Ok(Arc::new(store))
        }
        StoreConfig::Firestore(firestore) => Ok(Arc::new(FirestoreStore::new(firestore)?)),
    }
}
