//! In-memory reference implementation of the [`Handler`] collaborator.
//!
//! `MemoryStore` keeps rows per entity type behind a mutex and hands out
//! [`MemoryHandler`]s that support equality filtering, single-field ordering,
//! inserts with auto-assigned integer primary keys, and in-place updates.
//! It exists so the crate's examples and integration tests can exercise the
//! full save/reload lifecycle without a database; it is not a query engine.
//!
//! Rows are stored as full field maps. Hydration goes through
//! [`Mapper::entity`], so columns outside the declared schema are stored but
//! not hydrated back.

use crate::core::{FieldMap, FieldValue, OrmError, Result, Value};
use crate::entity::{Entity, Mapper, WeakMapper};
use crate::handler::{Handler, HandlerFactory};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Default)]
struct StoreInner {
    rows: Mutex<HashMap<String, Vec<FieldMap>>>,
    next_ids: Mutex<HashMap<String, i64>>,
    mapper: RwLock<Option<WeakMapper>>,
}

/// Shared in-memory row store implementing [`HandlerFactory`].
///
/// Construct the store first, build the [`Mapper`] with a clone of it, then
/// [`attach`](Self::attach) the mapper so handlers can hydrate entities. The
/// store only keeps a weak mapper handle, so dropping the mapper drops the
/// whole graph.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the mapper used to hydrate fetched rows into entities.
    pub fn attach(&self, mapper: &Mapper) {
        let mut slot = self
            .inner
            .mapper
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(mapper.downgrade());
    }

    /// Number of stored rows for a type.
    pub fn row_count(&self, type_name: &str) -> Result<usize> {
        let rows = self.inner.rows.lock()?;
        Ok(rows.get(type_name).map_or(0, Vec::len))
    }

    fn mapper(&self) -> Result<Mapper> {
        self.inner
            .mapper
            .read()?
            .clone()
            .and_then(|weak| weak.upgrade())
            .ok_or_else(|| {
                OrmError::Persistence("memory store is not attached to a mapper".to_string())
            })
    }
}

impl HandlerFactory for MemoryStore {
    fn items(&self, type_name: &str) -> Result<Box<dyn Handler>> {
        Ok(Box::new(MemoryHandler {
            store: self.clone(),
            type_name: type_name.to_string(),
            criteria: FieldMap::new(),
            order: None,
            staged: None,
        }))
    }
}

#[derive(Clone)]
enum Staged {
    Create(FieldMap),
    Update(FieldMap),
}

/// One staged query against a [`MemoryStore`], scoped to a single type.
#[derive(Clone)]
pub struct MemoryHandler {
    store: MemoryStore,
    type_name: String,
    criteria: FieldMap,
    order: Option<(String, bool)>,
    staged: Option<Staged>,
}

impl MemoryHandler {
    fn matches(row: &FieldMap, criteria: &FieldMap) -> bool {
        criteria.iter().all(|(name, value)| row.get(name) == Some(value))
    }

    fn execute_staged(&self) -> Result<()> {
        match &self.staged {
            None => Ok(()),
            Some(Staged::Create(fields)) => {
                let pk = self.store.mapper()?.primary_key(&self.type_name)?;
                let mut row = fields.clone();
                if !row.contains_key(&pk) {
                    let mut ids = self.store.inner.next_ids.lock()?;
                    let next = ids.entry(self.type_name.clone()).or_insert(0);
                    *next += 1;
                    row.insert(pk, FieldValue::Concrete(Value::Integer(*next)));
                }
                let mut rows = self.store.inner.rows.lock()?;
                rows.entry(self.type_name.clone()).or_default().push(row);
                Ok(())
            }
            Some(Staged::Update(fields)) => {
                let mut rows = self.store.inner.rows.lock()?;
                if let Some(list) = rows.get_mut(&self.type_name) {
                    for row in list.iter_mut() {
                        if !Self::matches(row, &self.criteria) {
                            continue;
                        }
                        for (name, value) in fields {
                            row.insert(name.clone(), value.clone());
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn select(&self) -> Result<Vec<FieldMap>> {
        let rows = self.store.inner.rows.lock()?;
        let mut out: Vec<FieldMap> = rows
            .get(&self.type_name)
            .map(|list| {
                list.iter()
                    .filter(|row| Self::matches(row, &self.criteria))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(rows);

        if let Some((field, descending)) = &self.order {
            out.sort_by(|a, b| {
                let left = a.get(field).and_then(FieldValue::as_concrete);
                let right = b.get(field).and_then(FieldValue::as_concrete);
                match (left, right) {
                    (Some(l), Some(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
                    (None, None) => Ordering::Equal,
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                }
            });
            if *descending {
                out.reverse();
            }
        }
        Ok(out)
    }

    fn hydrate(&self, row: FieldMap) -> Result<Entity> {
        let mut entity = self.store.mapper()?.entity(self.type_name.clone(), row)?;
        entity.mark_loaded();
        Ok(entity)
    }
}

impl Handler for MemoryHandler {
    fn filter(&self, criteria: &FieldMap) -> Result<Box<dyn Handler>> {
        let mut next = self.clone();
        for (name, value) in criteria {
            next.criteria.insert(name.clone(), value.clone());
        }
        Ok(Box::new(next))
    }

    fn create(&self, fields: &FieldMap) -> Result<Box<dyn Handler>> {
        let mut next = self.clone();
        next.staged = Some(Staged::Create(fields.clone()));
        Ok(Box::new(next))
    }

    fn update(&self, fields: &FieldMap, previous: &FieldMap) -> Result<Box<dyn Handler>> {
        log::trace!(
            "update staged for {} against a {}-field snapshot",
            self.type_name,
            previous.len()
        );
        let mut next = self.clone();
        next.staged = Some(Staged::Update(fields.clone()));
        Ok(Box::new(next))
    }

    fn order_by(&self, field_expr: &str) -> Result<Box<dyn Handler>> {
        let mut parts = field_expr.split_whitespace();
        let field = parts.next().ok_or_else(|| {
            OrmError::Persistence("empty ORDER BY expression".to_string())
        })?;
        let descending = match parts.next() {
            None => false,
            Some(dir) if dir.eq_ignore_ascii_case("asc") => false,
            Some(dir) if dir.eq_ignore_ascii_case("desc") => true,
            Some(dir) => {
                return Err(OrmError::Persistence(format!(
                    "unsupported ORDER BY direction '{dir}'"
                )));
            }
        };
        if parts.next().is_some() {
            return Err(OrmError::Persistence(format!(
                "unsupported ORDER BY expression '{field_expr}'"
            )));
        }
        let mut next = self.clone();
        next.order = Some((field.to_string(), descending));
        Ok(Box::new(next))
    }

    fn one(&self, force_reload: bool) -> Result<Option<Entity>> {
        log::trace!(
            "one({force_reload}) for {} with {} criteria",
            self.type_name,
            self.criteria.len()
        );
        self.execute_staged()?;
        match self.select()?.into_iter().next() {
            Some(row) => Ok(Some(self.hydrate(row)?)),
            None => Ok(None),
        }
    }

    fn all(&self) -> Result<Vec<Entity>> {
        self.execute_staged()?;
        self.select()?
            .into_iter()
            .map(|row| self.hydrate(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StaticSchema;

    fn fixture() -> (Mapper, MemoryStore) {
        let schema = Arc::new(
            StaticSchema::new().declare("User", "id", ["id", "name", "age"]),
        );
        let store = MemoryStore::new();
        let mapper = Mapper::new(schema.clone(), schema, Arc::new(store.clone()));
        store.attach(&mapper);
        (mapper, store)
    }

    fn insert(mapper: &Mapper, name: &str, age: i64) -> Entity {
        let mut fields = FieldMap::new();
        fields.insert("name".to_string(), name.into());
        fields.insert("age".to_string(), age.into());
        mapper
            .items("User")
            .unwrap()
            .create(&fields)
            .unwrap()
            .order_by("id DESC")
            .unwrap()
            .one(false)
            .unwrap()
            .expect("insert refetch")
    }

    #[test]
    fn test_create_assigns_monotonic_ids() {
        let (mapper, store) = fixture();
        let a = insert(&mapper, "Alice", 30);
        let b = insert(&mapper, "Bob", 25);
        assert_eq!(a.get("id"), Value::Integer(1));
        assert_eq!(b.get("id"), Value::Integer(2));
        assert_eq!(store.row_count("User").unwrap(), 2);
    }

    #[test]
    fn test_filter_by_equality() {
        let (mapper, _store) = fixture();
        insert(&mapper, "Alice", 30);
        insert(&mapper, "Bob", 25);

        let mut criteria = FieldMap::new();
        criteria.insert("name".to_string(), "Bob".into());
        let found = mapper
            .items("User")
            .unwrap()
            .filter(&criteria)
            .unwrap()
            .one(false)
            .unwrap()
            .expect("row");
        assert_eq!(found.get("age"), Value::Integer(25));
    }

    #[test]
    fn test_one_returns_none_on_empty() {
        let (mapper, _store) = fixture();
        let mut criteria = FieldMap::new();
        criteria.insert("name".to_string(), "Nobody".into());
        let found = mapper
            .items("User")
            .unwrap()
            .filter(&criteria)
            .unwrap()
            .one(false)
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_order_by_parsing() {
        let (mapper, _store) = fixture();
        let items = mapper.items("User").unwrap();
        assert!(items.order_by("age").is_ok());
        assert!(items.order_by("age ASC").is_ok());
        assert!(items.order_by("age desc").is_ok());
        assert!(items.order_by("").is_err());
        assert!(items.order_by("age sideways").is_err());
    }

    #[test]
    fn test_update_in_place() {
        let (mapper, store) = fixture();
        let alice = insert(&mapper, "Alice", 30);

        let mut criteria = FieldMap::new();
        criteria.insert("id".to_string(), alice.fields().get("id").unwrap().clone());
        let mut fields = alice.fields().clone();
        fields.insert("age".to_string(), 31i64.into());

        let updated = mapper
            .items("User")
            .unwrap()
            .filter(&criteria)
            .unwrap()
            .update(&fields, alice.previous_state())
            .unwrap()
            .one(false)
            .unwrap()
            .expect("updated row");
        assert_eq!(updated.get("age"), Value::Integer(31));
        assert_eq!(store.row_count("User").unwrap(), 1);
    }

    #[test]
    fn test_hydrated_entities_are_synced() {
        let (mapper, _store) = fixture();
        let alice = insert(&mapper, "Alice", 30);
        assert!(!alice.is_dirty());
        assert_eq!(alice.previous_state(), alice.fields());
    }

    #[test]
    fn test_detached_store_fails() {
        let schema = Arc::new(StaticSchema::new().declare("User", "id", ["name"]));
        let store = MemoryStore::new();
        let mapper = Mapper::new(schema.clone(), schema, Arc::new(store.clone()));
        // no attach
        let mut fields = FieldMap::new();
        fields.insert("name".to_string(), "Alice".into());
        let result = mapper
            .items("User")
            .unwrap()
            .create(&fields)
            .unwrap()
            .one(false);
        assert!(matches!(result, Err(OrmError::Persistence(_))));
        drop(mapper);
    }
}
