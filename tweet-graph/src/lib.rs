//! A GraphQL API over a tweet feed held in a document store.

pub mod json_ext;

pub mod axum_factory;
pub mod configuration;
pub mod error;
mod executable;
mod execution;
pub mod graphql;
mod introspection;
pub mod resolvers;
mod service;
mod spec;
pub mod store;

pub use configuration::Configuration;
pub use executable::main;
pub use service::TweetGraph;
pub use spec::OperationKind;
pub use spec::Query;
pub use spec::SCHEMA_SDL;
pub use spec::Schema;
pub use spec::SpecError;
