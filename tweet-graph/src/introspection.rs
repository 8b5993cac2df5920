//! Schema introspection, answered by the compiler's own executor.

use apollo_compiler::introspection;
use apollo_compiler::request::RequestError;
use apollo_compiler::request::coerce_variable_values;
use apollo_compiler::response::GraphQLError;
use apollo_compiler::response::ResponseDataPathSegment;

use crate::graphql::Error;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::spec::OperationKind;
use crate::spec::Query;
use crate::spec::Schema;

const META_FIELDS: [&str; 2] = ["__schema", "__type"];

/// Whether the operation selects `__schema` or `__type` on the query root.
pub(crate) fn is_requested(query: &Query) -> bool {
    query.kind() == OperationKind::Query
        && query
            .operation
            .root_fields(&query.document)
            .any(|field| META_FIELDS.contains(&field.name.as_str()))
}

/// Executes the introspection meta-fields of the operation.
///
/// The returned data only holds the meta-fields, keyed by response key, along with any field
/// errors. `Err` carries request errors: nothing else should be executed.
pub(crate) fn execute(schema: &Schema, query: &Query) -> Result<(Object, Vec<Error>), Vec<Error>> {
    let definitions = schema.definitions();
    introspection::check_max_depth(&query.document, &query.operation).map_err(request_error)?;
    let variables = coerce_variable_values(definitions, &query.operation, &query.variables)
        .map_err(request_error)?;
    let response = introspection::partial_execute(
        definitions,
        &definitions.implementers_map(),
        &query.document,
        &query.operation,
        &variables,
    )
    .map_err(request_error)?;

    let errors = response.errors.into_iter().map(field_error).collect();
    Ok((response.data.unwrap_or_default(), errors))
}

fn request_error(error: RequestError) -> Vec<Error> {
    vec![
        Error::builder()
            .message(error.message().to_string())
            .extension_code("GRAPHQL_VALIDATION_FAILED")
            .build(),
    ]
}

fn field_error(error: GraphQLError) -> Error {
    let path = error
        .path
        .into_iter()
        .map(|segment| match segment {
            ResponseDataPathSegment::Field(name) => PathElement::Key(name.to_string()),
            ResponseDataPathSegment::ListIndex(index) => PathElement::Index(index),
        })
        .collect();
    Error::builder()
        .message(error.message)
        .path(Path(path))
        .build()
}
