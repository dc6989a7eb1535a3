#![allow(dead_code)]

use minorm::{
    Entity, FieldMap, Handler, HandlerFactory, Mapper, MemoryStore, Result, StaticSchema,
};
use std::sync::{Arc, Mutex};

/// Mapper + memory store fixture with `User` and `Post` declared.
pub fn memory_fixture() -> (Mapper, MemoryStore) {
    let schema = Arc::new(
        StaticSchema::new()
            .declare("User", "id", ["id", "name", "email", "posts"])
            .declare("Post", "post_id", ["post_id", "title", "author_id"]),
    );
    let store = MemoryStore::new();
    let mapper = Mapper::new(schema.clone(), schema, Arc::new(store.clone()));
    store.attach(&mapper);
    (mapper, store)
}

/// One recorded handler call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Filter(FieldMap),
    Create(FieldMap),
    Update(FieldMap, FieldMap),
    OrderBy(String),
    One(bool),
    All,
}

/// A handler that records every call and answers `one()`/`all()` with a
/// canned response, for asserting exact call sequences.
#[derive(Clone)]
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<Call>>>,
    response: Option<Entity>,
}

impl Handler for RecordingHandler {
    fn filter(&self, criteria: &FieldMap) -> Result<Box<dyn Handler>> {
        self.calls.lock().unwrap().push(Call::Filter(criteria.clone()));
        Ok(Box::new(self.clone()))
    }

    fn create(&self, fields: &FieldMap) -> Result<Box<dyn Handler>> {
        self.calls.lock().unwrap().push(Call::Create(fields.clone()));
        Ok(Box::new(self.clone()))
    }

    fn update(&self, fields: &FieldMap, previous: &FieldMap) -> Result<Box<dyn Handler>> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Update(fields.clone(), previous.clone()));
        Ok(Box::new(self.clone()))
    }

    fn order_by(&self, field_expr: &str) -> Result<Box<dyn Handler>> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::OrderBy(field_expr.to_string()));
        Ok(Box::new(self.clone()))
    }

    fn one(&self, force_reload: bool) -> Result<Option<Entity>> {
        self.calls.lock().unwrap().push(Call::One(force_reload));
        Ok(self.response.clone())
    }

    fn all(&self) -> Result<Vec<Entity>> {
        self.calls.lock().unwrap().push(Call::All);
        Ok(self.response.clone().into_iter().collect())
    }
}

pub struct RecordingFactory {
    calls: Arc<Mutex<Vec<Call>>>,
    response: Mutex<Option<Entity>>,
}

impl RecordingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            response: Mutex::new(None),
        })
    }

    pub fn respond_with(&self, entity: Entity) {
        *self.response.lock().unwrap() = Some(entity);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl HandlerFactory for RecordingFactory {
    fn items(&self, _type_name: &str) -> Result<Box<dyn Handler>> {
        Ok(Box::new(RecordingHandler {
            calls: self.calls.clone(),
            response: self.response.lock().unwrap().clone(),
        }))
    }
}

/// Mapper wired to a recording factory, with `User` declared.
pub fn recording_fixture() -> (Mapper, Arc<RecordingFactory>) {
    let schema = Arc::new(
        StaticSchema::new().declare("User", "id", ["id", "name", "email"]),
    );
    let factory = RecordingFactory::new();
    let mapper = Mapper::new(schema.clone(), schema, factory.clone());
    (mapper, factory)
}
