use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;

use super::Collection;
use super::Document;
use super::DocumentStore;
use crate::error::ConfigurationError;
use crate::error::StoreError;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;

type Documents = BTreeMap<String, Document>;

/// A process-local document store.
///
/// Documents are kept ordered by id, which is the order `list` and `query` return them in.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<Collection, Documents>>,
}

/// The JSON fixture format: `{"users": {"<id>": {...}}, "tweets": {"<id>": {...}}}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Seed {
    users: Documents,
    tweets: Documents,
}

#[buildstructor::buildstructor]
impl InMemoryStore {
    /// Builds a store holding the given documents, keyed by id.
    #[builder(visibility = "pub")]
    fn new(users: Vec<(String, Document)>, tweets: Vec<(String, Document)>) -> Self {
        let mut collections = HashMap::new();
        collections.insert(Collection::Users, users.into_iter().collect());
        collections.insert(Collection::Tweets, tweets.into_iter().collect());
        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Loads documents from a JSON fixture file.
    pub fn from_seed_file(path: &Path) -> Result<Self, ConfigurationError> {
        let contents =
            std::fs::read_to_string(path).map_err(|error| ConfigurationError::CannotReadFile {
                path: path.display().to_string(),
                error,
            })?;
        Self::from_seed_str(&contents)
    }

    pub(crate) fn from_seed_str(contents: &str) -> Result<Self, ConfigurationError> {
        let seed: Seed =
            serde_json::from_str(contents).map_err(|error| ConfigurationError::InvalidSeed {
                error: error.to_string(),
            })?;
        tracing::debug!(
            users = seed.users.len(),
            tweets = seed.tweets.len(),
            "seeded in-memory document store"
        );
        let mut collections = HashMap::new();
        collections.insert(Collection::Users, seed.users);
        collections.insert(Collection::Tweets, seed.tweets);
        Ok(Self {
            collections: RwLock::new(collections),
        })
    }

    /// Inserts or replaces a whole document.
    pub fn insert(&self, collection: Collection, id: impl Into<String>, document: Document) {
        self.collections
            .write()
            .entry(collection)
            .or_default()
            .insert(id.into(), document);
    }

    fn rejected(operation: &'static str, collection: Collection, id: &str) -> StoreError {
        StoreError::Rejected {
            operation,
            target: format!("{collection}/{id}"),
            reason: "no document to update".to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn query(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|document| document.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write();
        let document = collections
            .get_mut(&collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| Self::rejected("update", collection, id))?;
        for (key, value) in fields {
            document.insert(key, value);
        }
        Ok(())
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write();
        let document = collections
            .get_mut(&collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| Self::rejected("increment", collection, id))?;
        // A missing or non-numeric field counts as zero, like a Firestore increment transform.
        let current = document
            .get(field)
            .and_then(ValueExt::as_integral)
            .unwrap_or_default();
        let next = current
            .checked_add(by)
            .ok_or_else(|| StoreError::Rejected {
                operation: "increment",
                target: format!("{collection}/{id}"),
                reason: format!("'{field}' would overflow"),
            })?;
        document.insert(field, Value::Number(next.into()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;

    fn document(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn store() -> InMemoryStore {
        InMemoryStore::builder()
            .user((
                "u1".to_string(),
                document(json!({"id": "u1", "name": "Ada", "screenName": "ada", "statusesCount": 2})),
            ))
            .tweet((
                "t2".to_string(),
                document(json!({"id": "t2", "text": "second", "userId": "u1", "likes": 0})),
            ))
            .tweet((
                "t1".to_string(),
                document(json!({"id": "t1", "text": "first", "userId": "u1", "likes": 5})),
            ))
            .tweet((
                "t3".to_string(),
                document(json!({"id": "t3", "text": "other", "userId": "u2", "likes": 1})),
            ))
            .build()
    }

    #[test(tokio::test)]
    async fn get_returns_none_for_missing_documents() {
        let store = store();
        assert!(store.get(Collection::Users, "u1").await.unwrap().is_some());
        assert!(store.get(Collection::Users, "nope").await.unwrap().is_none());
        assert!(store.get(Collection::Tweets, "u1").await.unwrap().is_none());
    }

    #[test(tokio::test)]
    async fn list_and_query_are_ordered_by_id() {
        let store = store();
        let ids = |documents: Vec<Document>| {
            documents
                .iter()
                .map(|d| d.get("id").and_then(Value::as_str).unwrap().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(
            ids(store.list(Collection::Tweets).await.unwrap()),
            vec!["t1", "t2", "t3"]
        );
        assert_eq!(
            ids(store
                .query(Collection::Tweets, "userId", &json!("u1"))
                .await
                .unwrap()),
            vec!["t1", "t2"]
        );
        assert!(
            store
                .query(Collection::Tweets, "userId", &json!("nobody"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[test(tokio::test)]
    async fn update_merges_fields_and_rejects_missing_documents() {
        let store = store();
        store
            .update(Collection::Tweets, "t1", document(json!({"likes": 6})))
            .await
            .unwrap();
        let tweet = store.get(Collection::Tweets, "t1").await.unwrap().unwrap();
        assert_eq!(tweet.get("likes"), Some(&json!(6)));
        assert_eq!(tweet.get("text"), Some(&json!("first")));

        let error = store
            .update(Collection::Tweets, "t404", document(json!({"likes": 1})))
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::Rejected { operation: "update", .. }));
    }

    #[test(tokio::test)]
    async fn increment_is_applied_in_place() {
        let store = store();
        store
            .increment(Collection::Tweets, "t1", "likes", 1)
            .await
            .unwrap();
        store
            .increment(Collection::Tweets, "t2", "missing", 3)
            .await
            .unwrap();
        let t1 = store.get(Collection::Tweets, "t1").await.unwrap().unwrap();
        let t2 = store.get(Collection::Tweets, "t2").await.unwrap().unwrap();
        assert_eq!(t1.get("likes"), Some(&json!(6)));
        assert_eq!(t2.get("missing"), Some(&json!(3)));
    }

    #[test]
    fn seed_fixture_is_parsed() {
        let store = InMemoryStore::from_seed_str(
            r#"{"users": {"u1": {"id": "u1"}}, "tweets": {"t1": {"id": "t1", "userId": "u1"}}}"#,
        )
        .unwrap();
        let collections = store.collections.read();
        assert_eq!(collections[&Collection::Users].len(), 1);
        assert_eq!(collections[&Collection::Tweets].len(), 1);
    }

    #[test]
    fn seed_fixture_rejects_unknown_collections() {
        let error = InMemoryStore::from_seed_str(r#"{"likes": {}}"#).unwrap_err();
        assert!(matches!(error, ConfigurationError::InvalidSeed { .. }));
    }
}
