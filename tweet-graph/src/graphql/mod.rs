//! Types related to GraphQL requests, responses, etc.

mod request;
mod response;

use heck::ToShoutySnakeCase;
pub use request::Request;
pub use response::Response;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;
use crate::json_ext::Path;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
/// The error location
pub struct Location {
    /// The line number
    pub line: u32,
    /// The column number
    pub column: u32,
}

/// A [GraphQL error](https://spec.graphql.org/October2021/#sec-Errors)
/// as may be found in the `errors` field of a GraphQL [`Response`].
///
/// Converted to (or from) JSON with serde.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Error {
    /// The error message.
    pub message: String,

    /// The locations of the error in the GraphQL document of the originating request.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// If this is a field error, the JSON path to that field in [`Response::data`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    /// The optional GraphQL extensions for this error.
    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Error {
    /// Returns a builder that builds a GraphQL [`Error`] from its components.
    ///
    /// Builder methods:
    ///
    /// * `.message(impl Into<`[`String`]`>)`
    ///   Required.
    ///
    /// * `.location(impl Into<`[`Location`]`>)`
    ///   Optional, may be called multiple times.
    ///
    /// * `.path(impl Into<`[`Path`]`>)`
    ///   Optional.
    ///
    /// * `.extension(impl Into<`[`ByteString`]`>, impl Into<`[`Value`]`>)`
    ///   Optional, may be called multiple times.
    ///
    /// * `.extension_code(impl Into<`[`String`]`>)`
    ///   Optional.
    ///   Sets the "code" in the extension map. Will be ignored if extension already has this key
    ///   set.
    #[builder(visibility = "pub")]
    fn new(
        message: String,
        locations: Vec<Location>,
        path: Option<Path>,
        extension_code: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor's map special-casing
        mut extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        if let Some(code) = extension_code {
            extensions
                .entry("code")
                .or_insert(Value::String(ByteString::from(code)));
        }
        Self {
            message,
            locations,
            path,
            extensions,
        }
    }

    /// The `extensions.code` of this error, if any.
    pub fn extension_code(&self) -> Option<&str> {
        self.extensions.get("code").and_then(Value::as_str)
    }
}

/// Trait used to get extension type from an error
pub(crate) trait ErrorExtension
where
    Self: Sized,
{
    fn extension_code(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or_default()
            .to_shouty_snake_case()
    }
}

/// Converts an error kind into one or more GraphQL errors.
pub(crate) trait IntoGraphQLErrors
where
    Self: Sized,
{
    fn into_graphql_errors(self) -> Vec<Error>;
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn error_builder_sets_code_once() {
        let error = Error::builder()
            .message("User ID not found")
            .extension("code", "ALREADY_SET")
            .extension_code("GRAPHQL_VALIDATION_FAILED")
            .build();
        assert_eq!(error.extension_code(), Some("ALREADY_SET"));
    }

    #[test]
    fn error_serialization_skips_empty_members() {
        let error = Error::builder()
            .message("boom")
            .path(Path::from("tweets/0/user"))
            .extension_code("DANGLING_REFERENCE")
            .build();
        assert_eq!(
            serde_json_bytes::to_value(&error).unwrap(),
            json!({
                "message": "boom",
                "path": ["tweets", 0, "user"],
                "extensions": { "code": "DANGLING_REFERENCE" }
            })
        );
    }

    #[test]
    fn default_extension_code_uses_type_name() {
        struct StoreUnavailable;
        impl ErrorExtension for StoreUnavailable {}
        assert_eq!(StoreUnavailable.extension_code(), "STORE_UNAVAILABLE");
    }
}
