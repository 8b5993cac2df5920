//! Typed entities mapped from raw store documents.

use serde::Serialize;

use crate::error::ResolveError;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::store::Collection;
use crate::store::Document;

/// A feed author.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub screen_name: String,
    /// Informational, not maintained by this service.
    pub statuses_count: i64,
}

/// A single post. `user_id` references [`User::id`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub likes: i64,
}

impl User {
    pub fn from_document(document: &Document) -> Result<Self, ResolveError> {
        let fields = Fields::new(Collection::Users, document)?;
        Ok(Self {
            id: fields.id.clone(),
            name: fields.string("name")?,
            screen_name: fields.string("screenName")?,
            statuses_count: fields.integer("statusesCount")?,
        })
    }
}

impl Tweet {
    pub fn from_document(document: &Document) -> Result<Self, ResolveError> {
        let fields = Fields::new(Collection::Tweets, document)?;
        let likes = fields.integer("likes")?;
        if likes < 0 {
            return Err(fields.malformed(format!("'likes' must not be negative, got {likes}")));
        }
        Ok(Self {
            id: fields.id.clone(),
            text: fields.string("text")?,
            user_id: fields.string("userId")?,
            likes,
        })
    }
}

/// Typed access to the fields of one document.
struct Fields<'a> {
    collection: Collection,
    id: String,
    document: &'a Document,
}

impl<'a> Fields<'a> {
    fn new(collection: Collection, document: &'a Document) -> Result<Self, ResolveError> {
        let mut fields = Self {
            collection,
            id: "<unknown>".to_string(),
            document,
        };
        fields.id = fields.string("id")?;
        Ok(fields)
    }

    fn malformed(&self, reason: String) -> ResolveError {
        tracing::warn!(collection = %self.collection, id = %self.id, %reason, "malformed document");
        ResolveError::MalformedDocument {
            collection: self.collection,
            id: self.id.clone(),
            reason,
        }
    }

    fn get(&self, field: &str) -> Result<&'a Value, ResolveError> {
        match self.document.get(field) {
            Some(Value::Null) | None => Err(self.malformed(format!("missing field '{field}'"))),
            Some(value) => Ok(value),
        }
    }

    fn string(&self, field: &str) -> Result<String, ResolveError> {
        let value = self.get(field)?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            self.malformed(format!(
                "field '{field}' must be a string, got {}",
                value.json_type_name()
            ))
        })
    }

    fn integer(&self, field: &str) -> Result<i64, ResolveError> {
        let value = self.get(field)?;
        value.as_integral().ok_or_else(|| {
            self.malformed(format!(
                "field '{field}' must be an integer, got {}",
                value.json_type_name()
            ))
        })
    }
}
