//! HTTP transport for the API.

use std::future::Future;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use http::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::configuration::Configuration;
use crate::configuration::HEALTH_CHECK_PATH;
use crate::error::ConfigurationError;
use crate::error::ServerError;
use crate::graphql;
use crate::graphql::IntoGraphQLErrors;
use crate::service::TweetGraph;
use crate::spec::OperationKind;

/// Builds the router serving GraphQL on the configured path.
pub fn make_router(
    graph: TweetGraph,
    configuration: &Configuration,
) -> Result<Router, ConfigurationError> {
    let cors = configuration.cors.clone().into_layer().map_err(|error| {
        ConfigurationError::InvalidConfiguration {
            message: "CORS configuration error",
            error,
        }
    })?;

    let mut router = Router::new().route(
        &configuration.server.path,
        get(handle_get).post(handle_post),
    );
    if configuration.server.health_check {
        router = router.route(HEALTH_CHECK_PATH, get(health_check));
    }

    Ok(router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(graph))
}

/// Serves the API until `shutdown` completes.
pub async fn serve<F>(
    graph: TweetGraph,
    configuration: &Configuration,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = make_router(graph, configuration)?;
    let address = configuration.server.listen();
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| ServerError::Bind { address, source })?;
    tracing::info!(
        "GraphQL endpoint exposed at http://{}{}",
        address,
        configuration.server.path
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}

async fn handle_get(
    State(graph): State<TweetGraph>,
    RawQuery(query): RawQuery,
) -> axum::response::Response {
    let request = match graphql::Request::from_urlencoded_query(query.as_deref().unwrap_or_default())
    {
        Ok(request) => request,
        Err(reason) => return malformed_request(reason),
    };
    match graph.prepare(&request) {
        Ok(query) if query.kind() == OperationKind::Mutation => {
            let error = graphql::Error::builder()
                .message("Mutations can only be sent over HTTP POST")
                .extension_code("MUTATION_OVER_GET")
                .build();
            (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(graphql::Response::from_errors(vec![error])),
            )
                .into_response()
        }
        Ok(query) => Json(graph.execute_query(&query).await).into_response(),
        Err(error) => request_error(error.into_graphql_errors()),
    }
}

async fn handle_post(State(graph): State<TweetGraph>, body: Bytes) -> axum::response::Response {
    let request: graphql::Request = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(error) => return malformed_request(format!("invalid GraphQL request: {error}")),
    };
    match graph.prepare(&request) {
        Ok(query) => Json(graph.execute_query(&query).await).into_response(),
        Err(error) => request_error(error.into_graphql_errors()),
    }
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "UP" }))
}

fn malformed_request(reason: String) -> axum::response::Response {
    tracing::debug!(%reason, "malformed request");
    request_error(vec![
        graphql::Error::builder()
            .message(reason)
            .extension_code("MALFORMED_REQUEST")
            .build(),
    ])
}

fn request_error(errors: Vec<graphql::Error>) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(graphql::Response::from_errors(errors)),
    )
        .into_response()
}
