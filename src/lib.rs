// ============================================================================
// minorm Library
// ============================================================================

//! Minimal Active-Record-style data mapper core.
//!
//! `minorm` provides the base entity abstraction every persisted domain
//! object uses: identity, lazily computed fields, change tracking against a
//! previous-state snapshot, and delegated persistence through a
//! query-handling [`Handler`] collaborator. It deliberately does **not**
//! generate SQL, manage connections, run migrations or resolve joins; those
//! live behind the [`Handler`] seam.
//!
//! The model is synchronous and single-owner: an entity instance belongs to
//! one logical caller at a time.
//!
//! # Examples
//!
//! ```
//! use minorm::{FieldMap, FieldValue, Mapper, MemoryStore, StaticSchema, Value};
//! use std::sync::Arc;
//!
//! # fn main() -> minorm::Result<()> {
//! // Declare the schema and wire the collaborators together.
//! let schema = Arc::new(
//!     StaticSchema::new().declare("User", "id", ["id", "name", "email"]),
//! );
//! let store = MemoryStore::new();
//! let mapper = Mapper::new(schema.clone(), schema, Arc::new(store.clone()));
//! store.attach(&mapper);
//!
//! // Insert: no primary key set yet, save() takes the create path.
//! let mut user = mapper.entity("User", FieldMap::new())?;
//! user.set("name", "Alice");
//! user.set("email", FieldValue::deferred(|| Value::Text("alice@example.com".into())));
//! let mut saved = user.save()?.expect("insert refetch");
//! assert_eq!(saved.get("id"), Value::Integer(1));
//!
//! // Update: primary key present, save() takes the update path.
//! saved.set("name", "Alice Smith");
//! let updated = saved.save()?.expect("updated row");
//! assert_eq!(updated.get("name").as_str(), Some("Alice Smith"));
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod entity;
pub mod handler;
pub mod memory;
pub mod schema;

// Re-export main types for convenience
pub use crate::core::{Compute, FieldMap, FieldValue, OrmError, Result, Value};
pub use entity::{Entity, Mapper};
pub use handler::{Handler, HandlerFactory};
pub use memory::{MemoryHandler, MemoryStore};
pub use schema::{FieldEnumerator, SchemaResolver, StaticSchema};
