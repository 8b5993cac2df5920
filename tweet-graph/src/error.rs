//! Errors raised while resolving operations against the document store.

use displaydoc::Display;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;
use crate::graphql::Error;
use crate::graphql::ErrorExtension;
use crate::json_ext::Path;
use crate::store::Collection;

/// Faults reported by a [`DocumentStore`](crate::store::DocumentStore) client.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum StoreError {
    /// document store is unavailable: {reason}
    Unavailable {
        /// The transport level failure.
        reason: String,
    },

    /// document store rejected the {operation} on '{target}': {reason}
    Rejected {
        /// The rejected store operation.
        operation: &'static str,
        /// The targeted collection or `collection/id` document path.
        target: String,
        /// The reason given by the store.
        reason: String,
    },

    /// document store response was malformed: {reason}
    MalformedResponse {
        /// The reason the response could not be decoded.
        reason: String,
    },
}

/// Error types for resolution and mutation.
///
/// These are not returned to the client as is, they are converted to a GraphQL
/// [`struct@Error`] carrying the response path and an `extensions.code`.
#[derive(Error, Display, Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ResolveError {
    /// document '{collection}/{id}' is malformed: {reason}
    MalformedDocument {
        /// The collection holding the document.
        collection: Collection,
        /// The document id, or `<unknown>` when the id itself is missing.
        id: String,
        /// What is wrong with the document.
        reason: String,
    },

    /// {entity} '{id}' not found
    NotFound {
        /// The kind of entity that was looked up.
        entity: &'static str,
        /// The requested id.
        id: String,
    },

    /// {entity} '{id}' referenced by '{referrer}' does not exist
    DanglingReference {
        /// The kind of entity the reference points to.
        entity: &'static str,
        /// The dangling foreign key.
        id: String,
        /// The document holding the reference.
        referrer: String,
    },

    /// mutation '{operation}' failed for '{id}': {source}
    MutationFailed {
        /// The mutation name.
        operation: &'static str,
        /// The mutated document.
        id: String,
        /// The underlying store fault.
        source: StoreError,
    },

    /// {0}
    StoreUnavailable(#[from] StoreError),
}

impl ResolveError {
    /// Convert the resolve error to a GraphQL error located at `path`.
    pub(crate) fn to_graphql_error(&self, path: Option<Path>) -> Error {
        Error::builder()
            .message(self.to_string())
            .and_path(path)
            .extension_code(self.extension_code())
            .build()
    }
}

impl ErrorExtension for ResolveError {
    fn extension_code(&self) -> String {
        match self {
            ResolveError::MalformedDocument { .. } => "MALFORMED_DOCUMENT",
            ResolveError::NotFound { .. } => "NOT_FOUND",
            ResolveError::DanglingReference { .. } => "DANGLING_REFERENCE",
            ResolveError::MutationFailed { .. } => "MUTATION_FAILED",
            ResolveError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
        .to_string()
    }
}

/// Errors raised while starting or running the HTTP server.
#[derive(Error, Display, Debug)]
#[non_exhaustive]
pub enum ServerError {
    /// invalid configuration: {0}
    Configuration(#[from] ConfigurationError),

    /// could not listen on {address}: {source}
    Bind {
        address: std::net::SocketAddr,
        source: std::io::Error,
    },

    /// the HTTP server failed: {0}
    Serve(std::io::Error),
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn mutation_failed_wraps_the_store_fault() {
        let error = ResolveError::MutationFailed {
            operation: "likeTweet",
            id: "t1".to_string(),
            source: StoreError::Rejected {
                operation: "update",
                target: "tweets/t1".to_string(),
                reason: "NOT_FOUND".to_string(),
            },
        };
        assert_eq!(
            error.to_string(),
            "mutation 'likeTweet' failed for 't1': document store rejected the update on 'tweets/t1': NOT_FOUND"
        );
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn to_graphql_error_carries_code_and_path() {
        let error = ResolveError::DanglingReference {
            entity: "User",
            id: "ghost".to_string(),
            referrer: "tweets/t9".to_string(),
        };
        assert_eq!(
            serde_json_bytes::to_value(error.to_graphql_error(Some(Path::from("tweets/0/user"))))
                .unwrap(),
            json!({
                "message": "User 'ghost' referenced by 'tweets/t9' does not exist",
                "path": ["tweets", 0, "user"],
                "extensions": { "code": "DANGLING_REFERENCE" }
            })
        );
    }

    #[test]
    fn store_faults_convert_to_store_unavailable() {
        let error: ResolveError = StoreError::Unavailable {
            reason: "connection refused".to_string(),
        }
        .into();
        assert_eq!(error.extension_code(), "STORE_UNAVAILABLE");
        assert_eq!(
            error.to_string(),
            "document store is unavailable: connection refused"
        );
    }
}
