//! Schema collaborators: per-type primary key lookup and declared-field
//! enumeration.
//!
//! Both traits are pure and total over the types they know about; schemas are
//! immutable at runtime.

use crate::core::{OrmError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Resolves the primary-key field name for an entity type.
pub trait SchemaResolver: Send + Sync {
    fn primary_key_field(&self, type_name: &str) -> Result<String>;
}

/// Enumerates the field names an entity type declares.
///
/// Used only at construction time, to whitelist candidate field values.
pub trait FieldEnumerator: Send + Sync {
    fn declared_fields(&self, type_name: &str) -> Result<BTreeSet<String>>;
}

#[derive(Debug, Clone)]
struct TypeSchema {
    primary_key: String,
    fields: BTreeSet<String>,
}

/// A map-backed schema registry implementing both schema collaborators.
///
/// Each entity type is declared once with its field list and primary-key
/// field; the registry is then frozen behind an `Arc` and shared with a
/// [`Mapper`](crate::Mapper).
///
/// # Examples
///
/// ```
/// use minorm::StaticSchema;
///
/// let schema = StaticSchema::new()
///     .declare("User", "id", ["id", "name", "email"])
///     .declare("Post", "post_id", ["post_id", "title", "author_id"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    types: BTreeMap<String, TypeSchema>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity type with its primary-key field and declared fields.
    ///
    /// The primary key is added to the declared field set if the caller left
    /// it out.
    pub fn declare<I, S>(
        mut self,
        type_name: impl Into<String>,
        primary_key: impl Into<String>,
        fields: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let primary_key = primary_key.into();
        let mut fields: BTreeSet<String> = fields.into_iter().map(Into::into).collect();
        fields.insert(primary_key.clone());
        self.types.insert(
            type_name.into(),
            TypeSchema {
                primary_key,
                fields,
            },
        );
        self
    }

    fn lookup(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.get(type_name)
    }
}

impl SchemaResolver for StaticSchema {
    fn primary_key_field(&self, type_name: &str) -> Result<String> {
        self.lookup(type_name)
            .map(|schema| schema.primary_key.clone())
            .ok_or_else(|| {
                OrmError::SchemaResolution(
                    type_name.to_string(),
                    "type is not declared in the schema registry".to_string(),
                )
            })
    }
}

impl FieldEnumerator for StaticSchema {
    fn declared_fields(&self, type_name: &str) -> Result<BTreeSet<String>> {
        self.lookup(type_name)
            .map(|schema| schema.fields.clone())
            .ok_or_else(|| {
                OrmError::FieldEnumeration(
                    type_name.to_string(),
                    "type is not declared in the schema registry".to_string(),
                )
            })
    }
}
