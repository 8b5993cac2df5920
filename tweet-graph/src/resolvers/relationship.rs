use std::sync::Arc;

use async_trait::async_trait;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;

use super::entity::Tweet;
use super::entity::User;
use crate::error::ResolveError;
use crate::store::Collection;
use crate::store::DocumentStore;

/// Follows the links between users and tweets.
///
/// Both directions are resolved on demand, only when the selection asks for the nested entity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Relationships: Send + Sync + 'static {
    /// The author of `tweet`.
    ///
    /// A `userId` pointing nowhere is a [`ResolveError::DanglingReference`].
    async fn author_of(&self, tweet: &Tweet) -> Result<User, ResolveError>;

    /// Every tweet whose `userId` is `user_id`, in store order. Empty when there are none.
    async fn tweets_of(&self, user_id: &str) -> Result<Vec<Tweet>, ResolveError>;
}

/// [`Relationships`] backed by document store lookups.
#[derive(Clone)]
pub struct StoreRelationships {
    store: Arc<dyn DocumentStore>,
}

impl StoreRelationships {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Relationships for StoreRelationships {
    async fn author_of(&self, tweet: &Tweet) -> Result<User, ResolveError> {
        tracing::debug!(tweet = %tweet.id, user = %tweet.user_id, "resolving tweet author");
        match self.store.get(Collection::Users, &tweet.user_id).await? {
            Some(document) => User::from_document(&document),
            None => {
                tracing::warn!(
                    tweet = %tweet.id,
                    user = %tweet.user_id,
                    "tweet references a missing user"
                );
                Err(ResolveError::DanglingReference {
                    entity: "User",
                    id: tweet.user_id.clone(),
                    referrer: format!("{}/{}", Collection::Tweets, tweet.id),
                })
            }
        }
    }

    async fn tweets_of(&self, user_id: &str) -> Result<Vec<Tweet>, ResolveError> {
        tracing::debug!(user = %user_id, "resolving user tweets");
        self.store
            .query(Collection::Tweets, "userId", &Value::String(ByteString::from(user_id)))
            .await?
            .iter()
            .map(Tweet::from_document)
            .collect()
    }
}
