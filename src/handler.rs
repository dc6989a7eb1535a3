//! The query/persistence collaborator contract.
//!
//! A [`Handler`] turns field-level operations into storage reads and writes.
//! The entity core stages work through the chainable methods and executes it
//! with [`Handler::one`] or [`Handler::all`]; it never interprets the staged
//! operations itself. SQL generation, connections and migrations all live
//! behind this seam.

use crate::core::{FieldMap, Result};
use crate::entity::Entity;

/// Query/persistence collaborator, constructed per entity type.
///
/// Chainable methods return a fresh boxed handler with the staged operation
/// applied; they may fail eagerly (`OrmError::Persistence`) and such failures
/// propagate to the caller unchanged.
pub trait Handler: Send + Sync {
    /// Narrow the query scope to rows matching all criteria by equality.
    fn filter(&self, criteria: &FieldMap) -> Result<Box<dyn Handler>>;

    /// Stage an insert of the given fields.
    fn create(&self, fields: &FieldMap) -> Result<Box<dyn Handler>>;

    /// Stage an update of rows in scope to the given fields.
    ///
    /// `previous` is the entity's last-synced snapshot; implementations may
    /// use it to compute a minimal diff or to validate against concurrent
    /// modification.
    fn update(&self, fields: &FieldMap, previous: &FieldMap) -> Result<Box<dyn Handler>>;

    /// Order results by a field expression of the form `"<field> [ASC|DESC]"`.
    fn order_by(&self, field_expr: &str) -> Result<Box<dyn Handler>>;

    /// Execute and return a single result, or `None` for an empty result.
    ///
    /// `force_reload` requests a fresh load, bypassing any caching the
    /// implementation may do.
    fn one(&self, force_reload: bool) -> Result<Option<Entity>>;

    /// Execute and return all matches.
    fn all(&self) -> Result<Vec<Entity>>;
}

/// Constructs a [`Handler`] scoped to one entity type.
pub trait HandlerFactory: Send + Sync {
    fn items(&self, type_name: &str) -> Result<Box<dyn Handler>>;
}
