//! The GraphQL API surface.

use std::sync::Arc;

use tracing::Instrument;

use crate::error::ConfigurationError;
use crate::execution;
use crate::graphql::IntoGraphQLErrors;
use crate::graphql::Request;
use crate::graphql::Response;
use crate::resolvers::LikeStrategy;
use crate::resolvers::Resolvers;
use crate::spec::Query;
use crate::spec::Schema;
use crate::spec::SpecError;
use crate::store::DocumentStore;

/// Parses, validates and executes GraphQL requests against the feed.
///
/// Cloning is cheap: the schema and the store handle are shared.
#[derive(Clone)]
pub struct TweetGraph {
    schema: Schema,
    resolvers: Resolvers,
    introspection: bool,
}

#[buildstructor::buildstructor]
impl TweetGraph {
    /// Builds the API over a store handle.
    ///
    /// The like strategy defaults to [`LikeStrategy::ReadModifyWrite`] and introspection is
    /// enabled unless turned off.
    #[builder(visibility = "pub")]
    fn new(
        store: Arc<dyn DocumentStore>,
        like_strategy: Option<LikeStrategy>,
        introspection: Option<bool>,
    ) -> Result<Self, SpecError> {
        Ok(Self {
            schema: Schema::feed()?,
            resolvers: Resolvers::new(store, like_strategy.unwrap_or_default()),
            introspection: introspection.unwrap_or(true),
        })
    }

    /// Creates the configured store and builds the API over it.
    pub fn from_configuration(
        configuration: &crate::Configuration,
    ) -> Result<Self, ConfigurationError> {
        let store = crate::store::from_configuration(configuration.store())?;
        Self::builder()
            .store(store)
            .like_strategy(configuration.like_strategy())
            .introspection(configuration.server.introspection)
            .build()
            .map_err(|error| ConfigurationError::InvalidConfiguration {
                message: "the feed schema could not be loaded",
                error: error.to_string(),
            })
    }

    /// Parses and validates the request, selecting the operation to run.
    pub fn prepare(&self, request: &Request) -> Result<Query, SpecError> {
        let query = request.query.as_deref().ok_or(SpecError::MissingQuery)?;
        Query::parse(
            &self.schema,
            query,
            request.operation_name.as_deref(),
            &request.variables,
        )
    }

    /// Executes a prepared operation.
    pub async fn execute_query(&self, query: &Query) -> Response {
        let span = tracing::info_span!(
            "graphql.request",
            graphql.operation.name = query.operation_name().unwrap_or_default(),
            graphql.operation.kind = query.kind().as_str(),
        );
        async {
            let response =
                execution::execute(&self.schema, query, &self.resolvers, self.introspection).await;
            if !response.errors.is_empty() {
                tracing::debug!(errors = response.errors.len(), "request completed with errors");
            }
            response
        }
        .instrument(span)
        .await
    }

    /// Runs a request end to end.
    ///
    /// Request errors produce a response without `data`.
    pub async fn execute(&self, request: Request) -> Response {
        match self.prepare(&request) {
            Ok(query) => self.execute_query(&query).await,
            Err(error) => {
                tracing::debug!(%error, "invalid request");
                Response::from_errors(error.into_graphql_errors())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;
    use crate::store::InMemoryStore;

    fn graph() -> TweetGraph {
        let document = |value: crate::json_ext::Value| value.as_object().cloned().unwrap();
        let store = InMemoryStore::builder()
            .user((
                "u1".to_string(),
                document(json!({"id": "u1", "name": "Ada", "screenName": "ada", "statusesCount": 1})),
            ))
            .tweet((
                "t1".to_string(),
                document(json!({"id": "t1", "text": "hello", "userId": "u1", "likes": 5})),
            ))
            .build();
        TweetGraph::builder().store(Arc::new(store)).build().unwrap()
    }

    #[test(tokio::test)]
    async fn executes_a_request() {
        let request = Request::builder()
            .query("{ tweets { id likes user { screenName } } }")
            .build();
        let response = graph().execute(request).await;
        assert!(response.errors.is_empty());
        assert_eq!(
            response.data,
            Some(json!({"tweets": [{"id": "t1", "likes": 5, "user": {"screenName": "ada"}}]}))
        );
    }

    #[test(tokio::test)]
    async fn missing_query_is_a_request_error() {
        let response = graph().execute(Request::default()).await;
        assert_eq!(response.data, None);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].extension_code(), Some("MALFORMED_REQUEST"));
    }

    #[test(tokio::test)]
    async fn validation_errors_have_no_data() {
        let request = Request::builder().query("{ tweets { nope } }").build();
        let response = graph().execute(request).await;
        assert_eq!(response.data, None);
        assert_eq!(
            response.errors[0].extension_code(),
            Some("GRAPHQL_VALIDATION_FAILED")
        );
    }

    #[test]
    fn prepare_reports_the_operation_kind() {
        let request = Request::builder()
            .query("mutation { likeTweet(id: \"t1\") { likes } }")
            .build();
        let query = graph().prepare(&request).unwrap();
        assert_eq!(query.kind(), crate::spec::OperationKind::Mutation);
    }

    #[test(tokio::test)]
    async fn introspection_follows_the_builder_flag() {
        let request = || {
            Request::builder()
                .query("{ __type(name: \"Tweet\") { name } }")
                .build()
        };
        let response = graph().execute(request()).await;
        assert_eq!(response.data, Some(json!({"__type": {"name": "Tweet"}})));

        let document = |value: crate::json_ext::Value| value.as_object().cloned().unwrap();
        let store = InMemoryStore::builder()
            .tweet((
                "t1".to_string(),
                document(json!({"id": "t1", "text": "hello", "userId": "u1", "likes": 5})),
            ))
            .build();
        let graph = TweetGraph::builder()
            .store(Arc::new(store))
            .introspection(false)
            .build()
            .unwrap();
        let response = graph.execute(request()).await;
        assert_eq!(response.data, Some(json!({"__type": null})));
        assert_eq!(
            response.errors[0].extension_code(),
            Some("INTROSPECTION_DISABLED")
        );
    }
}
