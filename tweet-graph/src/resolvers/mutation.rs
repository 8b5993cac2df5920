use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;
use tracing::Instrument;

use super::entity::Tweet;
use crate::error::ResolveError;
use crate::error::StoreError;
use crate::store::Collection;
use crate::store::Document;
use crate::store::DocumentStore;

const LIKE_TWEET: &str = "likeTweet";

/// How the like counter is incremented.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LikeStrategy {
    /// Read the tweet, write back `likes + 1`.
    ///
    /// Two concurrent likes that both read before either writes lose one increment.
    #[default]
    ReadModifyWrite,

    /// Ask the store to add one to `likes` in a single operation. No update is lost.
    AtomicIncrement,
}

/// Performs the write operations.
#[derive(Clone)]
pub struct MutationEngine {
    store: Arc<dyn DocumentStore>,
    strategy: LikeStrategy,
}

impl MutationEngine {
    pub fn new(store: Arc<dyn DocumentStore>, strategy: LikeStrategy) -> Self {
        Self { store, strategy }
    }

    /// Adds one like to the tweet and returns it as re-read from the store.
    ///
    /// The counter is incremented without a transaction. A failure after the write step may
    /// leave the increment applied.
    pub async fn like_tweet(&self, id: &str) -> Result<Tweet, ResolveError> {
        let span = tracing::info_span!("like_tweet", id, strategy = ?self.strategy);
        async {
            let tweet = self
                .fetch(id)
                .await?
                .ok_or_else(|| ResolveError::NotFound {
                    entity: "Tweet",
                    id: id.to_string(),
                })?;

            match self.strategy {
                LikeStrategy::ReadModifyWrite => {
                    let likes = tweet
                        .likes
                        .checked_add(1)
                        .ok_or_else(|| self.failed(id, overflow(id)))?;
                    let mut fields = Document::new();
                    fields.insert(ByteString::from("likes"), Value::Number(likes.into()));
                    self.store
                        .update(Collection::Tweets, id, fields)
                        .await
                        .map_err(|source| self.failed(id, source))?;
                }
                LikeStrategy::AtomicIncrement => {
                    self.store
                        .increment(Collection::Tweets, id, "likes", 1)
                        .await
                        .map_err(|source| self.failed(id, source))?;
                }
            }

            // the write has been issued, a missing tweet is no longer a lookup miss
            let tweet = self
                .fetch(id)
                .await?
                .ok_or_else(|| self.failed(id, vanished(id)))?;
            tracing::info!(likes = tweet.likes, "tweet liked");
            Ok(tweet)
        }
        .instrument(span)
        .await
    }

    async fn fetch(&self, id: &str) -> Result<Option<Tweet>, ResolveError> {
        self.store
            .get(Collection::Tweets, id)
            .await
            .map_err(|source| self.failed(id, source))?
            .map(|document| Tweet::from_document(&document))
            .transpose()
    }

    fn failed(&self, id: &str, source: StoreError) -> ResolveError {
        tracing::error!(id, error = %source, "likeTweet failed");
        ResolveError::MutationFailed {
            operation: LIKE_TWEET,
            id: id.to_string(),
            source,
        }
    }
}

fn vanished(id: &str) -> StoreError {
    StoreError::Rejected {
        operation: "get",
        target: format!("{}/{id}", Collection::Tweets),
        reason: "the tweet no longer exists after the update".to_string(),
    }
}

fn overflow(id: &str) -> StoreError {
    StoreError::Rejected {
        operation: "update",
        target: format!("{}/{id}", Collection::Tweets),
        reason: "'likes' would overflow".to_string(),
    }
}
