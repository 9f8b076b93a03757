//! Id-indexed entity collections and the database that persists them.
//!
//! Every mutation of a collection notifies its subscribers synchronously once
//! the change is committed. [`Database`] subscribes to its own collections and
//! writes the changed collection to the key-value store under a fixed key, so
//! no mutation is ever left unpersisted.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::io::kv::{KeyValueStore, StoreError};
use crate::model::{Entity, EntityId, IgnoredNote, Location, Note, Project};

pub const PROJECTS_KEY: &str = "projects";
pub const NOTES_KEY: &str = "notes";
pub const IGNORED_NOTES_KEY: &str = "ignored_notes";

/// Called with the collection after each committed mutation.
pub type Subscriber<E> = Box<dyn FnMut(&EntityCollection<E>) + Send>;

/// A keyed collection of one entity kind.
pub struct EntityCollection<E: Entity> {
    items: IndexMap<EntityId, E>,
    subscribers: Vec<Subscriber<E>>,
}

impl<E: Entity> Default for EntityCollection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityCollection<E> {
    pub fn new() -> Self {
        EntityCollection {
            items: IndexMap::new(),
            subscribers: Vec::new(),
        }
    }

    /// Every live entity, in insertion order.
    pub fn get_all(&self) -> impl Iterator<Item = &E> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get_by_id(&self, id: EntityId) -> Option<&E> {
        self.items.get(&id)
    }

    pub fn find(&self, mut predicate: impl FnMut(&E) -> bool) -> Option<&E> {
        self.items.values().find(|e| predicate(e))
    }

    /// Smallest id greater than every id present; 1 when empty.
    pub fn next_id(&self) -> EntityId {
        self.items.keys().max().map_or(1, |max| max + 1)
    }

    /// Insert `entity`, or fully replace the entity with the same id.
    pub fn add_or_update(&mut self, entity: E) {
        self.items.insert(entity.id(), entity);
        self.notify();
    }

    /// Like [`add_or_update`](Self::add_or_update) for many entities, with a
    /// single notification for the whole batch.
    pub fn add_or_update_all(&mut self, entities: impl IntoIterator<Item = E>) {
        for entity in entities {
            self.items.insert(entity.id(), entity);
        }
        self.notify();
    }

    /// Remove the entity with the same id as `entity`.
    pub fn remove(&mut self, entity: &E) -> Option<E> {
        self.remove_by_id(entity.id())
    }

    /// Returns the removed entity. Nothing is notified when the id is absent.
    pub fn remove_by_id(&mut self, id: EntityId) -> Option<E> {
        let removed = self.items.shift_remove(&id);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.notify();
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&EntityCollection<E>) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Replace the contents without notifying (used when loading).
    pub(crate) fn replace_silently(&mut self, entities: Vec<E>) {
        self.items = entities.into_iter().map(|e| (e.id(), e)).collect();
    }

    fn notify(&mut self) {
        let mut subscribers = std::mem::take(&mut self.subscribers);
        for subscriber in subscribers.iter_mut() {
            subscriber(self);
        }
        self.subscribers = subscribers;
    }
}

impl<E: Entity + std::fmt::Debug> std::fmt::Debug for EntityCollection<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCollection")
            .field("items", &self.items)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// The three persisted collections.
///
/// One `Database` is created per process and handed to whatever needs it.
pub struct Database {
    pub projects: EntityCollection<Project>,
    pub notes: EntityCollection<Note>,
    pub ignored_notes: EntityCollection<IgnoredNote>,
    store: Arc<dyn KeyValueStore>,
}

impl Database {
    /// An empty database that writes through to `store`. Call
    /// [`load`](Self::load) to pick up existing state.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let mut projects = EntityCollection::new();
        projects.subscribe(persist_on_change(store.clone(), PROJECTS_KEY));
        let mut notes = EntityCollection::new();
        notes.subscribe(persist_on_change(store.clone(), NOTES_KEY));
        let mut ignored_notes = EntityCollection::new();
        ignored_notes.subscribe(persist_on_change(store.clone(), IGNORED_NOTES_KEY));

        Database {
            projects,
            notes,
            ignored_notes,
            store,
        }
    }

    /// Create and load in one step.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let mut db = Database::new(store);
        db.load();
        db
    }

    /// Replace all in-memory state with what the store holds. Missing or
    /// malformed collections load as empty.
    pub fn load(&mut self) {
        self.projects
            .replace_silently(read_collection(self.store.as_ref(), PROJECTS_KEY));
        self.notes
            .replace_silently(read_collection(self.store.as_ref(), NOTES_KEY));
        self.ignored_notes
            .replace_silently(read_collection(self.store.as_ref(), IGNORED_NOTES_KEY));
    }

    /// Write all three collections.
    pub fn persist(&self) -> Result<(), StoreError> {
        write_collection(self.store.as_ref(), PROJECTS_KEY, &self.projects)?;
        write_collection(self.store.as_ref(), NOTES_KEY, &self.notes)?;
        write_collection(self.store.as_ref(), IGNORED_NOTES_KEY, &self.ignored_notes)?;
        Ok(())
    }

    /// Empty every collection.
    pub fn clear(&mut self) {
        self.notes.clear();
        self.projects.clear();
        self.ignored_notes.clear();
    }

    pub fn project_by_location(&self, location: &Location) -> Option<&Project> {
        self.projects.find(|p| &p.location == location)
    }

    pub fn note_by_location(&self, location: &Location) -> Option<&Note> {
        self.notes.find(|n| &n.location == location)
    }

    /// The note's project, if its `project_id` resolves.
    pub fn project_of(&self, note: &Note) -> Option<&Project> {
        note.project_id.and_then(|id| self.projects.get_by_id(id))
    }
}

fn persist_on_change<E>(
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
) -> impl FnMut(&EntityCollection<E>) + Send + 'static
where
    E: Entity + Serialize + 'static,
{
    move |collection: &EntityCollection<E>| {
        if let Err(e) = write_collection(store.as_ref(), key, collection) {
            tracing::warn!(key, error = %e, "could not persist collection");
        }
    }
}

fn write_collection<E>(
    store: &dyn KeyValueStore,
    key: &str,
    collection: &EntityCollection<E>,
) -> Result<(), StoreError>
where
    E: Entity + Serialize,
{
    let records: Vec<&E> = collection.get_all().collect();
    let value = serde_json::to_value(records)?;
    store.set(key, value)
}

fn read_collection<E: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Vec<E> {
    let value = match store.get(key) {
        Ok(Some(value)) => value,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(key, error = %e, "could not read collection, starting empty");
            return Vec::new();
        }
    };
    match serde_json::from_value(value) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(key, error = %e, "malformed collection, starting empty");
            Vec::new()
        }
    }
}
