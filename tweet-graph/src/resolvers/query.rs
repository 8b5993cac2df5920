use std::sync::Arc;

use super::entity::Tweet;
use super::entity::User;
use crate::error::ResolveError;
use crate::store::Collection;
use crate::store::DocumentStore;

/// The outcome of a user lookup.
///
/// A missing user is an answer, not a failure: the API turns it into a `null` user with a
/// "User ID not found" error while store faults stay errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserLookup {
    Found(User),
    NotFound,
}

/// Answers the top-level read operations.
#[derive(Clone)]
pub struct QueryDispatcher {
    store: Arc<dyn DocumentStore>,
}

impl QueryDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Every tweet in the collection.
    pub async fn list_tweets(&self) -> Result<Vec<Tweet>, ResolveError> {
        let documents = self.store.list(Collection::Tweets).await?;
        tracing::debug!(count = documents.len(), "listed tweets");
        documents.iter().map(Tweet::from_document).collect()
    }

    pub async fn get_user(&self, id: &str) -> Result<UserLookup, ResolveError> {
        match self.store.get(Collection::Users, id).await? {
            Some(document) => User::from_document(&document).map(UserLookup::Found),
            None => {
                tracing::debug!(user = %id, "user not found");
                Ok(UserLookup::NotFound)
            }
        }
    }
}
