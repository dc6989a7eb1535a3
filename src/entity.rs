//! The entity core: lifecycle, lazy field resolution, dirty tracking and
//! delegated persistence.

use crate::core::{FieldMap, FieldValue, OrmError, Result, Value};
use crate::handler::{Handler, HandlerFactory};
use crate::schema::{FieldEnumerator, SchemaResolver};
use std::fmt;
use std::sync::{Arc, Weak};

struct MapperInner {
    schema: Arc<dyn SchemaResolver>,
    fields: Arc<dyn FieldEnumerator>,
    handlers: Arc<dyn HandlerFactory>,
}

/// Bundles the three collaborators the entity core delegates to: schema
/// resolution, field enumeration and handler construction.
///
/// Cloning is cheap (one `Arc`); every entity carries a `Mapper` handle so
/// `save` and `reload` are self-contained calls.
///
/// # Examples
///
/// ```
/// use minorm::{Mapper, MemoryStore, StaticSchema, FieldMap};
/// use std::sync::Arc;
///
/// let schema = Arc::new(StaticSchema::new().declare("User", "id", ["name"]));
/// let store = MemoryStore::new();
/// let mapper = Mapper::new(schema.clone(), schema, Arc::new(store.clone()));
/// store.attach(&mapper);
///
/// let mut user = mapper.entity("User", FieldMap::new())?;
/// user.set("name", "Alice");
/// let saved = user.save()?.expect("insert refetch");
/// assert_eq!(saved.get("name").as_str(), Some("Alice"));
/// # Ok::<(), minorm::OrmError>(())
/// ```
#[derive(Clone)]
pub struct Mapper {
    inner: Arc<MapperInner>,
}

impl Mapper {
    pub fn new(
        schema: Arc<dyn SchemaResolver>,
        fields: Arc<dyn FieldEnumerator>,
        handlers: Arc<dyn HandlerFactory>,
    ) -> Self {
        Self {
            inner: Arc::new(MapperInner {
                schema,
                fields,
                handlers,
            }),
        }
    }

    /// Construct a transient entity from candidate field values.
    ///
    /// Only keys the [`FieldEnumerator`] reports as declared for the type are
    /// copied in; unknown keys are silently dropped, so untrusted row data
    /// cannot inject arbitrary fields. The new entity has an empty
    /// previous-state snapshot and no identity guarantee until its
    /// primary-key field is set.
    pub fn entity(&self, type_name: impl Into<String>, candidates: FieldMap) -> Result<Entity> {
        let type_name = type_name.into();
        let declared = self.inner.fields.declared_fields(&type_name)?;
        let fields = candidates
            .into_iter()
            .filter(|(name, _)| declared.contains(name))
            .collect();
        Ok(Entity {
            mapper: self.clone(),
            type_name,
            fields,
            previous_state: FieldMap::new(),
        })
    }

    /// A fresh [`Handler`] scoped to the given entity type.
    pub fn items(&self, type_name: &str) -> Result<Box<dyn Handler>> {
        self.inner.handlers.items(type_name)
    }

    /// The primary-key field name for a type, per the [`SchemaResolver`].
    pub fn primary_key(&self, type_name: &str) -> Result<String> {
        self.inner.schema.primary_key_field(type_name)
    }

    pub(crate) fn downgrade(&self) -> WeakMapper {
        WeakMapper(Arc::downgrade(&self.inner))
    }
}

/// Non-owning `Mapper` handle, used by handler implementations that are
/// themselves owned by the mapper's factory (avoids a reference cycle).
#[derive(Clone)]
pub(crate) struct WeakMapper(Weak<MapperInner>);

impl WeakMapper {
    pub(crate) fn upgrade(&self) -> Option<Mapper> {
        self.0.upgrade().map(|inner| Mapper { inner })
    }
}

/// An in-memory representation of one persisted record.
///
/// An entity holds an open-ended map of field name to [`FieldValue`] and a
/// per-instance previous-state snapshot: the field map as last known to
/// match storage. The snapshot is the basis for dirty detection in
/// [`reload`](Self::reload) and travels with updates in
/// [`save`](Self::save).
///
/// Each entity instance is owned by exactly one logical caller at a time;
/// the snapshot and the current fields must stay coherently paired, so
/// concurrent mutation requires copying or an external lock, not the core.
#[derive(Clone)]
pub struct Entity {
    mapper: Mapper,
    type_name: String,
    fields: FieldMap,
    previous_state: FieldMap,
}

impl Entity {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The current field map, deferred values included as-is.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// The previous-state snapshot: fields as last loaded or persisted.
    pub fn previous_state(&self) -> &FieldMap {
        &self.previous_state
    }

    /// Mark the entity as freshly loaded from storage: the snapshot becomes
    /// the current field map. Handler implementations call this after
    /// hydration, once any ad-hoc join columns have been set.
    pub fn mark_loaded(&mut self) {
        self.previous_state = self.fields.clone();
    }

    /// Raw tagged access to one field slot.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Direct read. Returns the concrete value, or `Value::Null` for unset,
    /// deferred and related fields. Never fails.
    pub fn get(&self, name: &str) -> Value {
        match self.fields.get(name) {
            Some(FieldValue::Concrete(value)) => value.clone(),
            _ => Value::Null,
        }
    }

    /// Method-style read. A deferred field is evaluated exactly once: the
    /// field is overwritten with the result and the snapshot entry for the
    /// name (if present) is overwritten with the same result, so resolution
    /// never registers as a mutation. Concrete fields are returned as-is;
    /// missing and related fields yield `Value::Null`. Never fails.
    pub fn resolve(&mut self, name: &str) -> Value {
        let compute = match self.fields.get(name) {
            Some(FieldValue::Deferred(compute)) => compute.clone(),
            Some(FieldValue::Concrete(value)) => return value.clone(),
            Some(FieldValue::Related(_)) | None => return Value::Null,
        };
        let value = compute();
        self.fields
            .insert(name.to_string(), FieldValue::Concrete(value.clone()));
        if let Some(entry) = self.previous_state.get_mut(name) {
            *entry = FieldValue::Concrete(value.clone());
        }
        value
    }

    /// Force a deferred field without caching the result or touching the
    /// snapshot. This is the serialization path; unlike
    /// [`resolve`](Self::resolve) the evaluation is discarded afterwards, so
    /// a later `resolve` runs the computation again. The asymmetry is
    /// intentional: callers of the two paths depend on it differently.
    pub fn peek(&self, name: &str) -> Value {
        match self.fields.get(name) {
            Some(FieldValue::Concrete(value)) => value.clone(),
            Some(FieldValue::Deferred(compute)) => compute(),
            Some(FieldValue::Related(_)) | None => Value::Null,
        }
    }

    /// Write a field. Always accepted, including names outside the declared
    /// schema; ad-hoc fields populated by join-style queries land here.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// The primary-key field name for this entity's type. Pure and
    /// idempotent; the schema is immutable at runtime.
    pub fn pk(&self) -> Result<String> {
        self.mapper.primary_key(&self.type_name)
    }

    /// Whether any snapshot entry differs from the current field value.
    ///
    /// An entity with an empty snapshot (never loaded) is never dirty.
    pub fn is_dirty(&self) -> bool {
        self.previous_state
            .iter()
            .any(|(name, value)| self.fields.get(name) != Some(value))
    }

    /// Persist the entity through its [`Handler`].
    ///
    /// If the primary-key field is present among the current fields this is
    /// an update: `filter({pk: value})`, then `update(fields, snapshot)`.
    /// Otherwise it is an insert: `create(fields)`, then a refetch ordered by
    /// `"<pk> DESC"` to pick up the auto-assigned identity. The refetch
    /// assumes the newest row sorts last by primary key, which holds for
    /// monotonic keys but not under concurrent inserts against non-monotonic
    /// ones.
    ///
    /// Deferred fields are persisted as-is, in their last-assigned state;
    /// they are not forced here.
    ///
    /// Returns the re-fetched entity, `Ok(None)` for an empty result, or a
    /// propagated handler error.
    pub fn save(&self) -> Result<Option<Entity>> {
        let pk = self.pk()?;
        let items = self.mapper.items(&self.type_name)?;
        if let Some(pk_value) = self.fields.get(&pk) {
            log::debug!("save: update path for {} ({} set)", self.type_name, pk);
            let mut criteria = FieldMap::new();
            criteria.insert(pk.clone(), pk_value.clone());
            items
                .filter(&criteria)?
                .update(&self.fields, &self.previous_state)?
                .one(false)
        } else {
            log::debug!("save: insert path for {}", self.type_name);
            let result = items
                .create(&self.fields)?
                .order_by(&format!("{pk} DESC"))?
                .one(false)?;
            if result.is_none() {
                log::warn!("save: insert refetch for {} returned no row", self.type_name);
            }
            Ok(result)
        }
    }

    /// Re-sync the entity from storage if it is dirty.
    ///
    /// A clean entity is returned unchanged. A dirty one is re-fetched by
    /// primary key with a forced fresh load; every fetched field is merged
    /// over the current fields (ad-hoc fields absent from the fetched row
    /// survive) and the snapshot becomes the fetched field map. A dirty
    /// entity whose refetch yields nothing is an
    /// [`OrmError::EntityNotFound`].
    pub fn reload(&mut self) -> Result<&mut Self> {
        if !self.is_dirty() {
            return Ok(self);
        }
        let pk = self.pk()?;
        log::debug!("reload: {} is dirty, refetching by {}", self.type_name, pk);
        let pk_value = self
            .fields
            .get(&pk)
            .cloned()
            .unwrap_or(FieldValue::Concrete(Value::Null));
        let mut criteria = FieldMap::new();
        criteria.insert(pk.clone(), pk_value);
        let fresh = self
            .mapper
            .items(&self.type_name)?
            .filter(&criteria)?
            .one(true)?
            .ok_or_else(|| {
                OrmError::EntityNotFound(self.type_name.clone(), pk.clone(), self.get(&pk).to_string())
            })?;
        for (name, value) in &fresh.fields {
            self.fields.insert(name.clone(), value.clone());
        }
        self.previous_state = fresh.fields;
        Ok(self)
    }

    /// Pretty-printed JSON snapshot of all current fields.
    ///
    /// Deferred fields are forced with [`peek`](Self::peek) semantics; the
    /// evaluation only reaches the output, never the stored fields. With
    /// `expand_lists`, a related-collection field is replaced by the fully
    /// materialized array of the related entities' field maps (related
    /// fields inside the expanded entities are not themselves expanded);
    /// without it, related fields serialize as JSON null.
    ///
    /// Serialization never partially succeeds: the first field that cannot
    /// be represented aborts the whole call.
    pub fn json(&self, expand_lists: bool) -> Result<String> {
        let map = self.json_map(expand_lists)?;
        serde_json::to_string_pretty(&serde_json::Value::Object(map))
            .map_err(|err| OrmError::Serialization(err.to_string()))
    }

    fn json_map(&self, expand_lists: bool) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut out = serde_json::Map::new();
        for (name, field) in &self.fields {
            let rendered = match field {
                FieldValue::Concrete(value) => value.to_json()?,
                FieldValue::Deferred(compute) => compute().to_json()?,
                FieldValue::Related(handler) => {
                    if expand_lists {
                        let mut seq = Vec::new();
                        for related in handler.all()? {
                            seq.push(serde_json::Value::Object(related.json_map(false)?));
                        }
                        serde_json::Value::Array(seq)
                    } else {
                        serde_json::Value::Null
                    }
                }
            };
            out.insert(name.clone(), rendered);
        }
        Ok(out)
    }
}

/// Renders as `TypeName(pkValue)`. An unset (or unresolvable) primary key
/// renders the neutral `NULL` inline.
impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pk_value = match self.pk() {
            Ok(pk) => self.get(&pk),
            Err(_) => Value::Null,
        };
        write!(f, "{}({})", self.type_name, pk_value)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .field("previous_state", &self.previous_state)
            .finish()
    }
}
