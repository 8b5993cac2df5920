//! Execution of a validated operation against the resolvers.
//!
//! Fields are resolved lazily: a relationship is only fetched when a selection asks for it.
//! Sibling fields, and query root fields, are resolved concurrently. Mutation root fields run
//! one after the other.

use std::collections::HashSet;

use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::executable::DirectiveList;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json_bytes::ByteString;

use crate::error::ResolveError;
use crate::graphql::Error;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::Value;
use crate::resolvers::Resolvers;
use crate::resolvers::Tweet;
use crate::resolvers::User;
use crate::resolvers::UserLookup;
use crate::spec::OperationKind;
use crate::spec::Query;
use crate::spec::Schema;
use crate::spec::TYPENAME;
use crate::spec::to_json;

pub(crate) const USER_NOT_FOUND: &str = "User ID not found";

/// The object a selection set is evaluated against.
#[derive(Clone, Debug)]
enum Source {
    Root,
    User(User),
    Tweet(Tweet),
}

/// A field value before its sub-selection is applied.
enum Resolved {
    Null,
    Leaf(Value),
    Object(Source),
    List(Vec<Resolved>),
}

impl Resolved {
    fn tweets(tweets: Vec<Tweet>) -> Self {
        Resolved::List(
            tweets
                .into_iter()
                .map(|tweet| Resolved::Object(Source::Tweet(tweet)))
                .collect(),
        )
    }

    fn string(value: &str) -> Self {
        Resolved::Leaf(Value::String(ByteString::from(value)))
    }

    fn int(value: i64) -> Self {
        Resolved::Leaf(Value::Number(value.into()))
    }
}

/// Executes the operation and assembles the response.
///
/// When `introspection` is off, `__schema` and `__type` are answered with a field error.
pub(crate) async fn execute(
    schema: &Schema,
    query: &Query,
    resolvers: &Resolvers,
    introspection: bool,
) -> Response {
    let mut errors = Vec::new();
    let introspection_data = if introspection && crate::introspection::is_requested(query) {
        match crate::introspection::execute(schema, query) {
            Ok((data, mut field_errors)) => {
                errors.append(&mut field_errors);
                Some(data)
            }
            Err(request_errors) => return Response::from_errors(request_errors),
        }
    } else {
        None
    };

    let executor = Executor {
        query,
        resolvers,
        root_type: query.operation.selection_set.ty.as_str(),
        introspection: introspection_data,
        errors: Mutex::new(errors),
    };
    let serial = query.kind() == OperationKind::Mutation;
    let data = executor
        .execute_selection_set(
            Source::Root,
            vec![&query.operation.selection_set],
            Path::empty(),
            serial,
        )
        .await;

    Response::builder()
        .data(data.map(Value::Object).unwrap_or(Value::Null))
        .errors(executor.errors.into_inner())
        .build()
}

struct Executor<'a> {
    query: &'a Query,
    resolvers: &'a Resolvers,
    root_type: &'a str,
    /// Introspection meta-fields already answered, keyed by response key.
    introspection: Option<Object>,
    errors: Mutex<Vec<Error>>,
}

impl<'a> Executor<'a> {
    fn type_name(&self, source: &Source) -> &'a str {
        match source {
            Source::Root => self.root_type,
            Source::User(_) => "User",
            Source::Tweet(_) => "Tweet",
        }
    }

    fn push_error(&self, error: Error) {
        self.errors.lock().push(error);
    }

    /// Returns `None` when a non-null field failed, the object itself then becomes null.
    fn execute_selection_set(
        &'a self,
        source: Source,
        selection_sets: Vec<&'a SelectionSet>,
        path: Path,
        serial: bool,
    ) -> BoxFuture<'a, Option<Object>> {
        async move {
            let type_name = self.type_name(&source);
            let fields = self.collect_fields(type_name, &selection_sets);

            let results = if serial {
                let mut results = Vec::with_capacity(fields.len());
                for (key, fields) in &fields {
                    let result = self.execute_field(&source, fields, path.join_key(*key));
                    results.push(result.await);
                }
                results
            } else {
                join_all(fields.iter().map(|(key, fields)| {
                    self.execute_field(&source, fields, path.join_key(*key))
                }))
                .await
            };

            let mut object = Object::new();
            for (key, result) in fields.keys().zip(results) {
                object.insert(ByteString::from(*key), result.ok()?);
            }
            Some(object)
        }
        .boxed()
    }

    /// Groups the selected fields by response key, following fragments and applying
    /// `@skip` and `@include`.
    fn collect_fields(
        &self,
        type_name: &str,
        selection_sets: &[&'a SelectionSet],
    ) -> IndexMap<&'a str, Vec<&'a Node<Field>>> {
        let mut fields = IndexMap::new();
        let mut visited_fragments = HashSet::new();
        for selection_set in selection_sets {
            self.collect_into(type_name, selection_set, &mut fields, &mut visited_fragments);
        }
        fields
    }

    fn collect_into(
        &self,
        type_name: &str,
        selection_set: &'a SelectionSet,
        fields: &mut IndexMap<&'a str, Vec<&'a Node<Field>>>,
        visited_fragments: &mut HashSet<&'a str>,
    ) {
        for selection in &selection_set.selections {
            match selection {
                Selection::Field(field) => {
                    if self.included(&field.directives) {
                        fields
                            .entry(field.response_key().as_str())
                            .or_default()
                            .push(field);
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.included(&spread.directives)
                        || !visited_fragments.insert(spread.fragment_name.as_str())
                    {
                        continue;
                    }
                    if let Some(fragment) = self.query.document.fragments.get(&spread.fragment_name)
                    {
                        if fragment.type_condition().as_str() == type_name {
                            self.collect_into(
                                type_name,
                                &fragment.selection_set,
                                fields,
                                visited_fragments,
                            );
                        }
                    }
                }
                Selection::InlineFragment(inline) => {
                    let applies = inline
                        .type_condition
                        .as_ref()
                        .is_none_or(|condition| condition.as_str() == type_name);
                    if applies && self.included(&inline.directives) {
                        self.collect_into(
                            type_name,
                            &inline.selection_set,
                            fields,
                            visited_fragments,
                        );
                    }
                }
            }
        }
    }

    fn included(&self, directives: &DirectiveList) -> bool {
        directives.iter().all(|directive| {
            let condition = directive
                .arguments
                .iter()
                .find(|argument| argument.name.as_str() == "if")
                .map(|argument| to_json(&argument.value, &self.query.variables));
            !matches!(
                (directive.name.as_str(), condition),
                ("skip", Some(Value::Bool(true))) | ("include", Some(Value::Bool(false)))
            )
        })
    }

    /// `Err(())` means the field is null in a non-null position and its parent must be
    /// nulled too. The error is already recorded.
    async fn execute_field(
        &'a self,
        source: &Source,
        fields: &[&'a Node<Field>],
        path: Path,
    ) -> Result<Value, ()> {
        let Some(field) = fields.first().copied() else {
            return Ok(Value::Null);
        };
        let parent_type = self.type_name(source);
        if field.name.as_str() == TYPENAME {
            return Ok(Value::String(ByteString::from(parent_type)));
        }

        let ty = &field.definition.ty;
        match self.resolve_field(source, field, &path).await {
            Ok(resolved) => {
                let sub_selections = fields
                    .iter()
                    .copied()
                    .map(|field: &'a Node<Field>| &field.selection_set)
                    .collect();
                self.complete_value(parent_type, field, ty, sub_selections, resolved, path)
                    .await
            }
            Err(error) => {
                self.push_error(error);
                if ty.is_non_null() {
                    Err(())
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }

    fn complete_value(
        &'a self,
        parent_type: &'a str,
        field: &'a Node<Field>,
        ty: &'a ast::Type,
        sub_selections: Vec<&'a SelectionSet>,
        resolved: Resolved,
        path: Path,
    ) -> BoxFuture<'a, Result<Value, ()>> {
        async move {
            let completed = match resolved {
                Resolved::Null => {
                    if ty.is_non_null() {
                        self.push_error(
                            Error::builder()
                                .message(format!(
                                    "Cannot return null for non-nullable field {parent_type}.{}",
                                    field.name
                                ))
                                .path(path.clone())
                                .build(),
                        );
                    }
                    None
                }
                Resolved::Leaf(value) => Some(value),
                Resolved::List(items) => {
                    let item_type = ty.item_type();
                    let completions = items.into_iter().enumerate().map(|(index, item)| {
                        self.complete_value(
                            parent_type,
                            field,
                            item_type,
                            sub_selections.clone(),
                            item,
                            path.join_index(index),
                        )
                    });
                    join_all(completions)
                        .await
                        .into_iter()
                        .collect::<Result<Vec<_>, ()>>()
                        .ok()
                        .map(Value::Array)
                }
                Resolved::Object(source) => self
                    .execute_selection_set(source, sub_selections, path.clone(), false)
                    .await
                    .map(Value::Object),
            };
            match completed {
                Some(value) => Ok(value),
                None if ty.is_non_null() => Err(()),
                None => Ok(Value::Null),
            }
        }
        .boxed()
    }

    async fn resolve_field(
        &self,
        source: &Source,
        field: &Field,
        path: &Path,
    ) -> Result<Resolved, Error> {
        let located = |error: ResolveError| error.to_graphql_error(Some(path.clone()));
        let resolvers = self.resolvers;

        match (source, field.name.as_str()) {
            (Source::Root, "tweets") => resolvers
                .queries
                .list_tweets()
                .await
                .map(Resolved::tweets)
                .map_err(located),
            (Source::Root, "user") => {
                let id = self.argument(field, "id", path)?;
                match resolvers.queries.get_user(&id).await.map_err(located)? {
                    UserLookup::Found(user) => Ok(Resolved::Object(Source::User(user))),
                    UserLookup::NotFound => {
                        self.push_error(
                            Error::builder()
                                .message(USER_NOT_FOUND)
                                .path(path.clone())
                                .extension_code("GRAPHQL_VALIDATION_FAILED")
                                .build(),
                        );
                        Ok(Resolved::Null)
                    }
                }
            }
            (Source::Root, "likeTweet") => {
                let id = self.argument(field, "id", path)?;
                resolvers
                    .mutations
                    .like_tweet(&id)
                    .await
                    .map(|tweet| Resolved::Object(Source::Tweet(tweet)))
                    .map_err(located)
            }
            (Source::Root, "__schema" | "__type") => match &self.introspection {
                Some(data) => Ok(data
                    .get(field.response_key().as_str())
                    .cloned()
                    .map_or(Resolved::Null, Resolved::Leaf)),
                None => Err(Error::builder()
                    .message("introspection has been disabled")
                    .path(path.clone())
                    .extension_code("INTROSPECTION_DISABLED")
                    .build()),
            },

            (Source::Tweet(tweet), "id") => Ok(Resolved::string(&tweet.id)),
            (Source::Tweet(tweet), "text") => Ok(Resolved::string(&tweet.text)),
            (Source::Tweet(tweet), "userId") => Ok(Resolved::string(&tweet.user_id)),
            (Source::Tweet(tweet), "likes") => Ok(Resolved::int(tweet.likes)),
            (Source::Tweet(tweet), "user") => resolvers
                .relationships
                .author_of(tweet)
                .await
                .map(|user| Resolved::Object(Source::User(user)))
                .map_err(located),

            (Source::User(user), "id") => Ok(Resolved::string(&user.id)),
            (Source::User(user), "name") => Ok(Resolved::string(&user.name)),
            (Source::User(user), "screenName") => Ok(Resolved::string(&user.screen_name)),
            (Source::User(user), "statusesCount") => Ok(Resolved::int(user.statuses_count)),
            (Source::User(user), "tweets") => resolvers
                .relationships
                .tweets_of(&user.id)
                .await
                .map(Resolved::tweets)
                .map_err(located),

            (source, name) => Err(Error::builder()
                .message(format!(
                    "Cannot query field \"{name}\" on type \"{}\".",
                    self.type_name(source)
                ))
                .path(path.clone())
                .extension_code("GRAPHQL_VALIDATION_FAILED")
                .build()),
        }
    }

    /// The value of a string (or ID) argument.
    fn argument(&self, field: &Field, name: &str, path: &Path) -> Result<String, Error> {
        let value = field
            .arguments
            .iter()
            .find(|argument| argument.name.as_str() == name)
            .map(|argument| to_json(&argument.value, &self.query.variables));
        match value {
            Some(Value::String(string)) => Ok(string.as_str().to_string()),
            Some(Value::Number(number)) => Ok(number.to_string()),
            _ => Err(Error::builder()
                .message(format!("missing argument \"{name}\""))
                .path(path.clone())
                .extension_code("GRAPHQL_VALIDATION_FAILED")
                .build()),
        }
    }
}
