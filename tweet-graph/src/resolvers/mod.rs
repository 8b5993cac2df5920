//! Resolution of the feed entities against the document store.

mod entity;
mod mutation;
mod query;
mod relationship;

use std::sync::Arc;

pub use entity::Tweet;
pub use entity::User;
pub use mutation::LikeStrategy;
pub use mutation::MutationEngine;
pub use query::QueryDispatcher;
pub use query::UserLookup;
#[cfg(test)]
pub(crate) use relationship::MockRelationships;
pub use relationship::Relationships;
pub use relationship::StoreRelationships;

use crate::store::DocumentStore;

/// Every resolver the executor dispatches to, sharing one store handle.
#[derive(Clone)]
pub struct Resolvers {
    pub(crate) queries: QueryDispatcher,
    pub(crate) relationships: Arc<dyn Relationships>,
    pub(crate) mutations: MutationEngine,
}

impl Resolvers {
    /// Wires the store-backed resolvers.
    pub fn new(store: Arc<dyn DocumentStore>, like_strategy: LikeStrategy) -> Self {
        Self {
            queries: QueryDispatcher::new(store.clone()),
            relationships: Arc::new(StoreRelationships::new(store.clone())),
            mutations: MutationEngine::new(store, like_strategy),
        }
    }

    /// Replaces the relationship resolver.
    pub fn with_relationships(mut self, relationships: Arc<dyn Relationships>) -> Self {
        self.relationships = relationships;
        self
    }
}
