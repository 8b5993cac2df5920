use std::sync::Arc;

use apollo_compiler::validation::Valid;

use super::SpecError;

/// The schema of the feed API.
pub const SCHEMA_SDL: &str = r#"
"A Twitter User"
type User {
  id: ID!
  name: String!
  screenName: String!
  statusesCount: Int!
  tweets: [Tweet]!
}

"A Tweet Object"
type Tweet {
  id: ID!
  text: String!
  userId: String!
  user: User!
  likes: Int!
}

type Query {
  tweets: [Tweet]
  user(id: String!): User
}

type Mutation {
  likeTweet(id: ID!): Tweet
}
"#;

/// A validated GraphQL schema.
#[derive(Debug, Clone)]
pub struct Schema {
    definitions: Arc<Valid<apollo_compiler::Schema>>,
}

impl Schema {
    /// Parses and validates an SDL document.
    pub fn parse(sdl: &str) -> Result<Self, SpecError> {
        let definitions = apollo_compiler::Schema::parse_and_validate(sdl, "schema.graphql")
            .map_err(|with_errors| {
                SpecError::InvalidSchema(
                    with_errors
                        .errors
                        .iter()
                        .map(|diagnostic| diagnostic.to_string())
                        .collect::<Vec<_>>()
                        .join("\n"),
                )
            })?;
        Ok(Self {
            definitions: Arc::new(definitions),
        })
    }

    /// The feed API schema.
    pub fn feed() -> Result<Self, SpecError> {
        Self::parse(SCHEMA_SDL)
    }

    pub(crate) fn definitions(&self) -> &Valid<apollo_compiler::Schema> {
        &self.definitions
    }
}
