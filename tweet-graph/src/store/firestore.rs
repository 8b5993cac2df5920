//! A Cloud Firestore client speaking the REST v1 API.
//!
//! Firestore wraps every value in a typed envelope (`{"stringValue": "..."}`); documents are
//! converted to and from plain JSON at this boundary so the rest of the crate never sees it.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json_bytes::ByteString;
use serde_json_bytes::json;
use tracing::Instrument;
use url::Url;

use super::Collection;
use super::Document;
use super::DocumentStore;
use crate::configuration::FirestoreConfig;
use crate::error::ConfigurationError;
use crate::error::StoreError;
use crate::json_ext::Object;
use crate::json_ext::Value;

const PAGE_SIZE: &str = "300";

/// Document store client for Cloud Firestore (or its emulator).
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    /// `{endpoint}/v1/projects/{project}/databases/{database}/documents`
    documents_url: Url,
    /// `projects/{project}/databases/{database}/documents`, used to name documents in writes.
    documents_name: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Object,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryResponse {
    document: Option<FirestoreDocument>,
}

impl FirestoreStore {
    pub fn new(config: &FirestoreConfig) -> Result<Self, ConfigurationError> {
        let access_token = std::env::var(&config.access_token_env)
            .ok()
            .filter(|token| !token.is_empty());
        if access_token.is_none() {
            tracing::warn!(
                variable = %config.access_token_env,
                "no Firestore access token found, requests will be unauthenticated"
            );
        }
        Self::with_access_token(config, access_token)
    }

    pub(crate) fn with_access_token(
        config: &FirestoreConfig,
        access_token: Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let documents_name = format!(
            "projects/{}/databases/{}/documents",
            config.project_id, config.database
        );
        let mut documents_url = Url::parse(&config.endpoint).map_err(|error| {
            ConfigurationError::InvalidConfiguration {
                message: "invalid firestore endpoint",
                error: format!("{}: {error}", config.endpoint),
            }
        })?;
        documents_url
            .path_segments_mut()
            .map_err(|_| ConfigurationError::InvalidConfiguration {
                message: "firestore endpoint cannot be used as a base url",
                error: config.endpoint.clone(),
            })?
            .pop_if_empty()
            .extend(["v1"])
            .extend(documents_name.split('/'));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| ConfigurationError::InvalidConfiguration {
                message: "could not create the firestore http client",
                error: error.to_string(),
            })?;

        Ok(Self {
            client,
            documents_url,
            documents_name,
            access_token,
        })
    }

    /// The url of a collection, or of a document when `id` is given.
    fn url(&self, collection: Collection, id: Option<&str>) -> Url {
        let mut url = self.documents_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(collection.name());
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    /// The url of a `documents:{verb}` RPC.
    fn rpc_url(&self, verb: &str) -> Url {
        let mut url = self.documents_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop().push(&format!("documents:{verb}"));
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(
        &self,
        operation: &'static str,
        target: String,
        request: RequestBuilder,
    ) -> Result<Option<reqwest::Response>, StoreError> {
        let response = request.send().await.map_err(|error| StoreError::Unavailable {
            reason: error.to_string(),
        })?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND && operation == "get" {
            return Ok(None);
        }
        if status.is_success() {
            return Ok(Some(response));
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::Unavailable {
                reason: format!("{operation} on '{target}' returned {status}: {body}"),
            });
        }
        Err(StoreError::Rejected {
            operation,
            target,
            reason: format!("{status}: {body}"),
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
        response
            .json::<T>()
            .await
            .map_err(|error| StoreError::MalformedResponse {
                reason: error.to_string(),
            })
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let target = format!("{collection}/{id}");
        let span = tracing::debug_span!("firestore.get", %collection, id);
        async {
            let request = self.request(Method::GET, self.url(collection, Some(id)));
            match self.send("get", target, request).await? {
                Some(response) => {
                    let document: FirestoreDocument = Self::decode(response).await?;
                    decode_fields(&document.fields).map(Some)
                }
                None => Ok(None),
            }
        }
        .instrument(span)
        .await
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let span = tracing::debug_span!("firestore.list", %collection);
        async {
            let mut documents = Vec::new();
            let mut page_token: Option<String> = None;
            loop {
                let mut url = self.url(collection, None);
                url.query_pairs_mut().append_pair("pageSize", PAGE_SIZE);
                if let Some(token) = &page_token {
                    url.query_pairs_mut().append_pair("pageToken", token);
                }
                let request = self.request(Method::GET, url);
                let response = self
                    .send("list", collection.to_string(), request)
                    .await?
                    .ok_or_else(|| StoreError::MalformedResponse {
                        reason: "missing list response".to_string(),
                    })?;
                let page: ListDocumentsResponse = Self::decode(response).await?;
                for document in &page.documents {
                    documents.push(decode_fields(&document.fields)?);
                }
                match page.next_page_token.filter(|token| !token.is_empty()) {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
            Ok(documents)
        }
        .instrument(span)
        .await
    }

    async fn query(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let span = tracing::debug_span!("firestore.query", %collection, field);
        async {
            let body = json!({
                "structuredQuery": {
                    "from": [{ "collectionId": collection.name() }],
                    "where": {
                        "fieldFilter": {
                            "field": { "fieldPath": field },
                            "op": "EQUAL",
                            "value": encode_value(value),
                        }
                    }
                }
            });
            let request = self.request(Method::POST, self.rpc_url("runQuery")).json(&body);
            let response = self
                .send("query", collection.to_string(), request)
                .await?
                .ok_or_else(|| StoreError::MalformedResponse {
                    reason: "missing query response".to_string(),
                })?;
            let results: Vec<RunQueryResponse> = Self::decode(response).await?;
            // Entries without a document only carry progress metadata.
            results
                .iter()
                .filter_map(|result| result.document.as_ref())
                .map(|document| decode_fields(&document.fields))
                .collect()
        }
        .instrument(span)
        .await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        let target = format!("{collection}/{id}");
        let span = tracing::debug_span!("firestore.update", %collection, id);
        async {
            let mut url = self.url(collection, Some(id));
            {
                let mut query = url.query_pairs_mut();
                for key in fields.keys() {
                    query.append_pair("updateMask.fieldPaths", key.as_str());
                }
                query.append_pair("currentDocument.exists", "true");
            }
            let body = json!({ "fields": encode_fields(&fields) });
            let request = self.request(Method::PATCH, url).json(&body);
            self.send("update", target, request).await.map(|_| ())
        }
        .instrument(span)
        .await
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), StoreError> {
        let target = format!("{collection}/{id}");
        let span = tracing::debug_span!("firestore.increment", %collection, id, field);
        async {
            let body = json!({
                "writes": [{
                    "transform": {
                        "document": format!("{}/{}", self.documents_name, target),
                        "fieldTransforms": [{
                            "fieldPath": field,
                            "increment": { "integerValue": by.to_string() },
                        }]
                    },
                    "currentDocument": { "exists": true },
                }]
            });
            let request = self.request(Method::POST, self.rpc_url("commit")).json(&body);
            self.send("increment", target, request).await.map(|_| ())
        }
        .instrument(span)
        .await
    }
}

/// Converts a Firestore `fields` map into a plain JSON document.
fn decode_fields(fields: &Object) -> Result<Document, StoreError> {
    fields
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
        .collect()
}

fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let malformed = |reason: String| StoreError::MalformedResponse { reason };
    let (kind, inner) = value
        .as_object()
        .and_then(|object| object.iter().next())
        .ok_or_else(|| malformed(format!("expected a typed firestore value, got {value}")))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "geoPointValue" => Ok(inner.clone()),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => match inner {
            Value::String(_) => Ok(inner.clone()),
            _ => Err(malformed(format!("{} must be a string", kind.as_str()))),
        },
        // int64 values are transported as decimal strings
        "integerValue" => match inner {
            Value::String(s) => s
                .as_str()
                .parse::<i64>()
                .map(|i| Value::Number(i.into()))
                .map_err(|error| malformed(format!("invalid integerValue: {error}"))),
            Value::Number(_) => Ok(inner.clone()),
            _ => Err(malformed("integerValue must be a string".to_string())),
        },
        "doubleValue" => match inner {
            Value::Number(_) => Ok(inner.clone()),
            _ => Err(malformed(format!("unsupported doubleValue {inner}"))),
        },
        "arrayValue" => match inner.as_object().and_then(|array| array.get("values")) {
            Some(Value::Array(values)) => values
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Ok(Value::Array(Vec::new())),
        },
        "mapValue" => match inner.as_object().and_then(|map| map.get("fields")) {
            Some(Value::Object(fields)) => decode_fields(fields).map(Value::Object),
            _ => Ok(Value::Object(Object::new())),
        },
        other => Err(malformed(format!("unsupported firestore value type '{other}'"))),
    }
}

fn encode_fields(fields: &Object) -> Object {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s.as_str() }),
        Value::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let mut envelope = Object::new();
            envelope.insert(
                ByteString::from("mapValue"),
                json!({ "fields": encode_fields(map) }),
            );
            Value::Object(envelope)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use test_log::test;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::body_partial_json;
    use wiremock::matchers::header;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::matchers::query_param;

    use super::*;

    const DOCUMENTS: &str = "/v1/projects/feed/databases/(default)/documents";

    fn store(server: &MockServer) -> FirestoreStore {
        let config = FirestoreConfig {
            project_id: "feed".to_string(),
            database: "(default)".to_string(),
            endpoint: server.uri(),
            access_token_env: "UNUSED".to_string(),
            timeout: Duration::from_secs(2),
        };
        FirestoreStore::with_access_token(&config, Some("secret".to_string())).unwrap()
    }

    fn tweet_document(id: &str, likes: i64) -> serde_json::Value {
        serde_json::json!({
            "name": format!("projects/feed/databases/(default)/documents/tweets/{id}"),
            "fields": {
                "id": { "stringValue": id },
                "text": { "stringValue": "hello" },
                "userId": { "stringValue": "u1" },
                "likes": { "integerValue": likes.to_string() },
            }
        })
    }

    #[test(tokio::test)]
    async fn get_decodes_typed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{DOCUMENTS}/tweets/t1")))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tweet_document("t1", 5)))
            .expect(1)
            .mount(&server)
            .await;

        let document = store(&server)
            .get(Collection::Tweets, "t1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            Value::Object(document),
            json!({ "id": "t1", "text": "hello", "userId": "u1", "likes": 5 })
        );
    }

    #[test(tokio::test)]
    async fn get_maps_not_found_to_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{DOCUMENTS}/users/ghost")))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": { "code": 404, "status": "NOT_FOUND" }
            })))
            .mount(&server)
            .await;

        assert_eq!(store(&server).get(Collection::Users, "ghost").await, Ok(None));
    }

    #[test(tokio::test)]
    async fn list_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{DOCUMENTS}/tweets")))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [tweet_document("t2", 0)]
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{DOCUMENTS}/tweets")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "documents": [tweet_document("t1", 1)],
                "nextPageToken": "next"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let documents = store(&server).list(Collection::Tweets).await.unwrap();
        let ids: Vec<_> = documents
            .iter()
            .map(|document| document.get("id").and_then(Value::as_str).unwrap())
            .collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[test(tokio::test)]
    async fn query_sends_an_equality_filter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS}:runQuery")))
            .and(body_partial_json(serde_json::json!({
                "structuredQuery": {
                    "from": [{ "collectionId": "tweets" }],
                    "where": { "fieldFilter": {
                        "field": { "fieldPath": "userId" },
                        "op": "EQUAL",
                        "value": { "stringValue": "u1" }
                    }}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "document": tweet_document("t1", 1), "readTime": "2024-01-01T00:00:00Z" },
                { "readTime": "2024-01-01T00:00:00Z" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let documents = store(&server)
            .query(Collection::Tweets, "userId", &json!("u1"))
            .await
            .unwrap();
        assert_eq!(documents.len(), 1);
    }

    #[test(tokio::test)]
    async fn update_uses_an_update_mask_and_requires_existence() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{DOCUMENTS}/tweets/t1")))
            .and(query_param("updateMask.fieldPaths", "likes"))
            .and(query_param("currentDocument.exists", "true"))
            .and(body_partial_json(serde_json::json!({
                "fields": { "likes": { "integerValue": "6" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(tweet_document("t1", 6)))
            .expect(1)
            .mount(&server)
            .await;

        let fields = json!({ "likes": 6 }).as_object().cloned().unwrap();
        store(&server)
            .update(Collection::Tweets, "t1", fields)
            .await
            .unwrap();
    }

    #[test(tokio::test)]
    async fn update_of_a_missing_document_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no entity to update"))
            .mount(&server)
            .await;

        let fields = json!({ "likes": 1 }).as_object().cloned().unwrap();
        let error = store(&server)
            .update(Collection::Tweets, "gone", fields)
            .await
            .unwrap_err();
        assert!(
            matches!(&error, StoreError::Rejected { operation: "update", target, .. } if target == "tweets/gone"),
            "{error}"
        );
    }

    #[test(tokio::test)]
    async fn increment_commits_a_field_transform() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCUMENTS}:commit")))
            .and(body_partial_json(serde_json::json!({
                "writes": [{
                    "transform": {
                        "document": "projects/feed/databases/(default)/documents/tweets/t1",
                        "fieldTransforms": [{
                            "fieldPath": "likes",
                            "increment": { "integerValue": "1" }
                        }]
                    },
                    "currentDocument": { "exists": true }
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "writeResults": [{}],
                "commitTime": "2024-01-01T00:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .increment(Collection::Tweets, "t1", "likes", 1)
            .await
            .unwrap();
    }

    #[test(tokio::test)]
    async fn server_errors_are_reported_as_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let error = store(&server).list(Collection::Users).await.unwrap_err();
        assert!(matches!(error, StoreError::Unavailable { .. }), "{error}");
    }

    #[test]
    fn nested_values_are_converted_both_ways() {
        let plain = json!({
            "tags": ["a", 1, 2.5, true, null],
            "author": { "name": "Ada" }
        });
        let encoded = encode_fields(plain.as_object().unwrap());
        assert_eq!(
            Value::Object(encoded.clone()),
            json!({
                "tags": { "arrayValue": { "values": [
                    { "stringValue": "a" },
                    { "integerValue": "1" },
                    { "doubleValue": 2.5 },
                    { "booleanValue": true },
                    { "nullValue": null }
                ]}},
                "author": { "mapValue": { "fields": { "name": { "stringValue": "Ada" } } } }
            })
        );
        assert_eq!(Value::Object(decode_fields(&encoded).unwrap()), plain);
    }

    #[test]
    fn unknown_value_types_are_malformed() {
        let error = decode_value(&json!({ "vectorValue": {} })).unwrap_err();
        assert!(matches!(error, StoreError::MalformedResponse { .. }));
    }

    #[test]
    fn string_typed_values_must_hold_strings() {
        let error = decode_value(&json!({ "timestampValue": 42 })).unwrap_err();
        assert_eq!(
            error,
            StoreError::MalformedResponse {
                reason: "timestampValue must be a string".to_string()
            }
        );
    }
}
