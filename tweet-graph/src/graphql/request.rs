use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;

/// A GraphQL request as received over HTTP.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Request {
    /// The GraphQL document, containing one or more operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Selects the operation to run when the document contains several.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    /// Values for the `$variables` declared by the operation.
    #[serde(
        skip_serializing_if = "Object::is_empty",
        deserialize_with = "deserialize_null_default"
    )]
    pub variables: Object,

    /// Request extensions. Accepted and ignored.
    #[serde(
        skip_serializing_if = "Object::is_empty",
        deserialize_with = "deserialize_null_default"
    )]
    pub extensions: Object,
}

// `null` members are treated as absent.
fn deserialize_null_default<'de, D, T: Default + Deserialize<'de>>(
    deserializer: D,
) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
{
    <Option<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// The members of a GET request, where `variables` and `extensions` arrive JSON-encoded.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UrlEncodedRequest {
    query: Option<String>,
    operation_name: Option<String>,
    variables: Option<String>,
    extensions: Option<String>,
}

#[buildstructor::buildstructor]
impl Request {
    #[builder(visibility = "pub")]
    fn new(
        query: Option<String>,
        operation_name: Option<String>,
        // Skip the `Object` type alias in order to use buildstructor’s map special-casing
        variables: JsonMap<ByteString, Value>,
        extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables,
            extensions,
        }
    }

    /// Builds a request from the query string of a GET request.
    pub fn from_urlencoded_query(url_encoded_query: &str) -> Result<Request, String> {
        let encoded: UrlEncodedRequest = serde_urlencoded::from_str(url_encoded_query)
            .map_err(|error| format!("invalid query string: {error}"))?;

        let variables = decode_object("variables", encoded.variables.as_deref())?;
        let extensions = decode_object("extensions", encoded.extensions.as_deref())?;

        Ok(Request::builder()
            .and_query(encoded.query)
            .and_operation_name(encoded.operation_name)
            .variables(variables)
            .extensions(extensions)
            .build())
    }
}

fn decode_object(name: &str, encoded: Option<&str>) -> Result<Object, String> {
    match encoded {
        None => Ok(Object::new()),
        Some(encoded) => match serde_json::from_str::<Option<Object>>(encoded) {
            Ok(object) => Ok(object.unwrap_or_default()),
            Err(error) => Err(format!("`{name}` must be a JSON object: {error}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn post_body_with_null_members() {
        let request: Request = serde_json::from_str(
            r#"{"query": "{ tweets { id } }", "operationName": null, "variables": null}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::builder().query("{ tweets { id } }").build()
        );
    }

    #[test]
    fn urlencoded_query_with_variables() {
        let request = Request::from_urlencoded_query(
            "query=query+U%28%24id%3A+String%21%29+%7B+user%28id%3A+%24id%29+%7B+name+%7D+%7D&operationName=U&variables=%7B%22id%22%3A%22u1%22%7D",
        )
        .unwrap();
        assert_eq!(
            request.query.as_deref(),
            Some("query U($id: String!) { user(id: $id) { name } }")
        );
        assert_eq!(request.operation_name.as_deref(), Some("U"));
        assert_eq!(
            Value::Object(request.variables),
            json!({ "id": "u1" })
        );
    }

    #[test]
    fn urlencoded_query_with_invalid_variables() {
        let error = Request::from_urlencoded_query("query=%7B+tweets+%7B+id+%7D+%7D&variables=%5B1%5D")
            .unwrap_err();
        assert!(error.starts_with("`variables` must be a JSON object"), "{error}");
    }
}
