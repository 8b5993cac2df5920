//! Operation parsing, validation and variable coercion.

use std::sync::Arc;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::executable::Operation;
use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::Valid;
use serde_json_bytes::ByteString;

use super::Schema;
use super::SpecError;
use crate::graphql::Error;
use crate::graphql::Location;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;

pub(crate) const TYPENAME: &str = "__typename";

const SOURCE_NAME: &str = "query.graphql";

/// The kind of the selected operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
        }
    }
}

/// A validated operation, ready for execution.
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) document: Arc<Valid<ExecutableDocument>>,
    pub(crate) operation: Node<Operation>,
    kind: OperationKind,
    /// Variable values after coercion, defaults applied.
    pub(crate) variables: Object,
}

impl Query {
    /// Parses `query`, validates it against the schema and selects the operation to run.
    ///
    /// Syntax errors and validation errors are reported separately.
    pub fn parse(
        schema: &Schema,
        query: &str,
        operation_name: Option<&str>,
        variables: &Object,
    ) -> Result<Self, SpecError> {
        if query.trim().is_empty() {
            return Err(SpecError::MissingQuery);
        }
        let ast = ast::Document::parse(query, SOURCE_NAME)
            .map_err(|with_errors| {
                SpecError::ParsingError(to_graphql_errors(&with_errors.errors))
            })?;
        let document = ast
            .to_executable_validate(schema.definitions())
            .map_err(|with_errors| {
                SpecError::ValidationError(to_graphql_errors(&with_errors.errors))
            })?;

        let operation = document
            .operations
            .get(operation_name)
            .map_err(|_| match operation_name {
                Some(name) => SpecError::UnknownOperation(name.to_string()),
                None => SpecError::OperationNameRequired,
            })?
            .clone();
        let kind = match operation.operation_type {
            ast::OperationType::Query => OperationKind::Query,
            ast::OperationType::Mutation => OperationKind::Mutation,
            ast::OperationType::Subscription => {
                return Err(SpecError::ValidationError(vec![
                    Error::builder()
                        .message("subscriptions are not supported")
                        .build(),
                ]));
            }
        };
        let variables = coerce_variables(&operation, variables)?;

        Ok(Self {
            document: Arc::new(document),
            operation,
            kind,
            variables,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation.name.as_ref().map(|name| name.as_str())
    }
}

fn to_graphql_errors(diagnostics: &DiagnosticList) -> Vec<Error> {
    diagnostics
        .iter()
        .map(|diagnostic| {
            let locations: Vec<Location> = diagnostic
                .line_column_range()
                .map(|range| Location {
                    line: range.start.line as u32,
                    column: range.start.column as u32,
                })
                .into_iter()
                .collect();
            Error::builder()
                .message(diagnostic.to_string())
                .locations(locations)
                .build()
        })
        .collect()
}

/// Checks the provided variables against the operation's definitions and applies defaults.
fn coerce_variables(operation: &Operation, provided: &Object) -> Result<Object, SpecError> {
    let mut coerced = Object::new();
    for definition in &operation.variables {
        let name = definition.name.as_str();
        let ty: &ast::Type = &definition.ty;
        let invalid = |reason: String| SpecError::InvalidVariable {
            name: name.to_string(),
            reason,
        };
        match (provided.get(name), &definition.default_value) {
            (Some(value), _) => {
                let value = coerce_input(value, ty).map_err(invalid)?;
                coerced.insert(ByteString::from(name), value);
            }
            (None, Some(default)) => {
                coerced.insert(ByteString::from(name), to_json(default, &Object::new()));
            }
            (None, None) if ty.is_non_null() => {
                return Err(invalid(format!(
                    "required variable of type {ty} was not provided"
                )));
            }
            (None, None) => {}
        }
    }
    Ok(coerced)
}

fn coerce_input(value: &Value, ty: &ast::Type) -> Result<Value, String> {
    if value.is_null() {
        return if ty.is_non_null() {
            Err(format!("expected a non-null {ty}"))
        } else {
            Ok(Value::Null)
        };
    }
    let named = match ty {
        ast::Type::List(item) | ast::Type::NonNullList(item) => {
            return match value {
                Value::Array(values) => values
                    .iter()
                    .map(|value| coerce_input(value, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                // a single value is coerced to a list of one
                other => Ok(Value::Array(vec![coerce_input(other, item)?])),
            };
        }
        ast::Type::Named(named) | ast::Type::NonNullNamed(named) => named.as_str(),
    };
    match (named, value) {
        ("String" | "ID", Value::String(_)) | ("Boolean", Value::Bool(_)) => Ok(value.clone()),
        ("Float", Value::Number(_)) => Ok(value.clone()),
        ("ID", Value::Number(number)) if number.is_i64() || number.is_u64() => {
            Ok(Value::String(ByteString::from(number.to_string())))
        }
        ("Int", Value::Number(number))
            if number
                .as_i64()
                .is_some_and(|int| i32::try_from(int).is_ok()) =>
        {
            Ok(value.clone())
        }
        (named, other) => Err(format!("expected {named}, got {}", other.json_type_name())),
    }
}

/// Converts an argument or default value to JSON, substituting variables.
pub(crate) fn to_json(value: &ast::Value, variables: &Object) -> Value {
    match value {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => Value::String(ByteString::from(name.as_str())),
        ast::Value::Variable(name) => variables
            .get(name.as_str())
            .cloned()
            .unwrap_or(Value::Null),
        ast::Value::String(string) => Value::String(ByteString::from(string.as_str())),
        ast::Value::Boolean(boolean) => Value::Bool(*boolean),
        ast::Value::Int(int) => int
            .as_str()
            .parse::<i64>()
            .map(|int| Value::Number(int.into()))
            .unwrap_or(Value::Null),
        ast::Value::Float(float) => float
            .as_str()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ast::Value::List(values) => Value::Array(
            values
                .iter()
                .map(|value| to_json(value, variables))
                .collect(),
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (ByteString::from(name.as_str()), to_json(value, variables)))
                .collect(),
        ),
    }
}
