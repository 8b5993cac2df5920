//! GraphQL schema and operation handling.

mod query;
mod schema;

use displaydoc::Display;
pub use query::OperationKind;
pub use query::Query;
pub(crate) use query::TYPENAME;
pub(crate) use query::to_json;
pub use schema::SCHEMA_SDL;
pub use schema::Schema;
use thiserror::Error;

use crate::graphql::Error;
use crate::graphql::ErrorExtension;
use crate::graphql::IntoGraphQLErrors;

/// GraphQL request errors, raised before execution starts.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SpecError {
    /// invalid schema: {0}
    InvalidSchema(String),
    /// Must provide query string.
    MissingQuery,
    /// parsing error
    ParsingError(Vec<Error>),
    /// validation error
    ValidationError(Vec<Error>),
    /// Unknown operation named "{0}"
    UnknownOperation(String),
    /// Must provide operation name if query contains multiple operations.
    OperationNameRequired,
    /// invalid value for variable "${name}": {reason}
    InvalidVariable { name: String, reason: String },
}

impl ErrorExtension for SpecError {
    fn extension_code(&self) -> String {
        match self {
            SpecError::InvalidSchema(_) => "INVALID_SCHEMA",
            SpecError::MissingQuery => "MALFORMED_REQUEST",
            SpecError::ParsingError(_) => "GRAPHQL_PARSING_FAILED",
            SpecError::ValidationError(_) => "GRAPHQL_VALIDATION_FAILED",
            SpecError::UnknownOperation(_) | SpecError::OperationNameRequired => {
                "OPERATION_NOT_FOUND"
            }
            SpecError::InvalidVariable { .. } => "VALIDATION_INVALID_TYPE_VARIABLE",
        }
        .to_string()
    }
}

impl IntoGraphQLErrors for SpecError {
    fn into_graphql_errors(self) -> Vec<Error> {
        let code = self.extension_code();
        match self {
            SpecError::ParsingError(errors) | SpecError::ValidationError(errors) => errors
                .into_iter()
                .map(|mut error| {
                    error
                        .extensions
                        .entry("code")
                        .or_insert(code.clone().into());
                    error
                })
                .collect(),
            other => vec![
                Error::builder()
                    .message(other.to_string())
                    .extension_code(code)
                    .build(),
            ],
        }
    }
}
