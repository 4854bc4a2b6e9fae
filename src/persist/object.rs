use crate::core::value::format_timestamp;
use crate::core::{DbError, Result};
use crate::persist::registry::{ObjectType, PersistentType};
use crate::storage::schema::{ID_PATH, TYPE_TAG_PATH};
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Document fields managed by the envelope; applications cannot assign them.
pub const RESERVED_ATTRIBUTES: [&str; 4] = [ID_PATH, TYPE_TAG_PATH, CREATED_AT, UPDATED_AT];

/// Generates a new globally unique object id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// One attribute slot of a persistent object.
#[derive(Debug, Clone)]
pub enum Attribute {
    Value(JsonValue),
    /// Live handle to another persistent object; stored as its id.
    Reference(Object),
}

struct ObjectState {
    id: String,
    object_type: ObjectType,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    attributes: BTreeMap<String, Attribute>,
    dirty: bool,
    saving: bool,
}

/// Point-in-time copy of an object's envelope and attributes, taken so that
/// referenced objects can be inspected without holding this object's lock.
pub(crate) struct Snapshot {
    pub id: String,
    pub object_type: ObjectType,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub attributes: BTreeMap<String, Attribute>,
}

/// Shared handle to a live persistent object.
///
/// Clones are cheap and refer to the same object, so a reference attribute
/// and the variable it was assigned from observe the same state.
///
/// # Mutation contract
///
/// Every mutator (`set`, `set_value`, `set_timestamp`, `set_ref`, `unset`)
/// marks the object dirty. Attributes are only changed through these methods;
/// there is no other way to reach the attribute map.
///
/// # Reference cycles
///
/// Reference attributes hold strong handles. Objects that reference each
/// other (directly or through a chain, including an object referencing
/// itself) are never freed while the cycle stands, even after every outside
/// handle is dropped. Call [`Object::detach_references`] on one member to
/// break the cycle once the graph is no longer needed.
#[derive(Clone)]
pub struct Object {
    inner: Arc<Mutex<ObjectState>>,
}

impl Object {
    /// Creates a new, dirty object of the given type with a fresh id.
    pub fn new(object_type: ObjectType) -> Self {
        Self::from_state(ObjectState {
            id: new_id(),
            object_type,
            created_at: None,
            updated_at: None,
            attributes: BTreeMap::new(),
            dirty: true,
            saving: false,
        })
    }

    /// Creates a new object of a declared type.
    pub fn of<T: PersistentType>() -> Self {
        T::create()
    }

    /// Rebuilds an object from a decoded document. References are still ids;
    /// the object stays dirty until it is resolved and marked clean.
    pub(crate) fn restore(
        id: String,
        object_type: ObjectType,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
        attributes: BTreeMap<String, JsonValue>,
    ) -> Self {
        Self::from_state(ObjectState {
            id,
            object_type,
            created_at,
            updated_at,
            attributes: attributes
                .into_iter()
                .map(|(key, value)| (key, Attribute::Value(value)))
                .collect(),
            dirty: true,
            saving: false,
        })
    }

    fn from_state(state: ObjectState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ObjectState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.state().id.clone()
    }

    pub fn object_type(&self) -> ObjectType {
        self.state().object_type
    }

    pub fn type_tag(&self) -> &'static str {
        self.state().object_type.tag()
    }

    /// Returns `true` when the object was created as (or loaded as) type `T`.
    pub fn is<T: PersistentType>(&self) -> bool {
        self.type_tag() == T::TYPE_TAG
    }

    /// `true` until the first successful save.
    pub fn is_new(&self) -> bool {
        self.state().created_at.is_none()
    }

    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    pub fn mark_dirty(&self) {
        self.state().dirty = true;
    }

    pub fn mark_clean(&self) {
        self.state().dirty = false;
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.state().created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state().updated_at
    }

    /// Returns `true` when both handles refer to the same live object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Serializes `value` and assigns it to `key`.
    pub fn set<V: Serialize>(&self, key: &str, value: V) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set_value(key, value)
    }

    /// Assigns a JSON value to `key`.
    ///
    /// Reference attributes only accept `null` here; use [`Object::set_ref`]
    /// to point them at another object.
    pub fn set_value(&self, key: &str, value: JsonValue) -> Result<()> {
        check_assignable(key)?;
        let mut state = self.state();
        if state.object_type.is_reference(key) && !value.is_null() {
            return Err(DbError::InvalidArgument(format!(
                "'{}' is a reference attribute of {}; assign it with set_ref",
                key,
                state.object_type.tag()
            )));
        }
        state.attributes.insert(key.to_string(), Attribute::Value(value));
        state.dirty = true;
        Ok(())
    }

    /// Assigns a timestamp as fixed-width ISO-8601 text, so date predicates
    /// compare correctly.
    pub fn set_timestamp(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.set_value(key, JsonValue::String(format_timestamp(&at)))
    }

    /// Points the declared reference attribute `key` at `target`.
    pub fn set_ref(&self, key: &str, target: &Object) -> Result<()> {
        check_assignable(key)?;
        let mut state = self.state();
        if !state.object_type.is_reference(key) {
            return Err(DbError::InvalidArgument(format!(
                "'{}' is not a declared reference of {}",
                key,
                state.object_type.tag()
            )));
        }
        state
            .attributes
            .insert(key.to_string(), Attribute::Reference(target.clone()));
        state.dirty = true;
        Ok(())
    }

    /// Removes an attribute. Returns `true` if it was present.
    pub fn unset(&self, key: &str) -> bool {
        let mut state = self.state();
        let removed = state.attributes.remove(key).is_some();
        if removed {
            state.dirty = true;
        }
        removed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().attributes.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.state().attributes.keys().cloned().collect()
    }

    pub fn attribute(&self, key: &str) -> Option<Attribute> {
        self.state().attributes.get(key).cloned()
    }

    pub fn attributes(&self) -> BTreeMap<String, Attribute> {
        self.state().attributes.clone()
    }

    /// JSON value of an attribute. A reference reads as the target's id.
    pub fn value(&self, key: &str) -> Option<JsonValue> {
        match self.attribute(key)? {
            Attribute::Value(value) => Some(value),
            Attribute::Reference(target) => Some(JsonValue::String(target.id())),
        }
    }

    /// Deserializes an attribute. `Ok(None)` when the attribute is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.value(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(DbError::from)
    }

    /// The live object held by a reference attribute.
    pub fn reference(&self, key: &str) -> Option<Object> {
        match self.attribute(key)? {
            Attribute::Reference(target) => Some(target),
            Attribute::Value(_) => None,
        }
    }

    /// Value at a dotted key path, walking nested maps and arrays and
    /// descending through reference attributes.
    ///
    /// Envelope fields (`id`, the type tag, `created_at`, `updated_at`) are
    /// addressable too. A path ending on a reference yields `None`.
    pub fn value_at_path(&self, path: &str) -> Option<JsonValue> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        let attribute = match head {
            ID_PATH => Attribute::Value(JsonValue::String(self.id())),
            TYPE_TAG_PATH => Attribute::Value(JsonValue::String(self.type_tag().to_string())),
            CREATED_AT => Attribute::Value(JsonValue::String(format_timestamp(&self.created_at()?))),
            UPDATED_AT => Attribute::Value(JsonValue::String(format_timestamp(&self.updated_at()?))),
            _ => self.attribute(head)?,
        };

        match (attribute, rest) {
            (Attribute::Value(value), None) => Some(value),
            (Attribute::Value(value), Some(rest)) => json_at_path(&value, rest).cloned(),
            (Attribute::Reference(target), Some(rest)) => target.value_at_path(rest),
            (Attribute::Reference(_), None) => None,
        }
    }

    /// Replaces every live reference with the target's id, the form it is
    /// stored in, and returns how many were replaced.
    ///
    /// The stored document is unchanged by this, so the object keeps its
    /// dirty state. [`Object::reference`] yields `None` for detached slots
    /// until they are reassigned or the object is loaded again.
    pub fn detach_references(&self) -> usize {
        let mut state = self.state();
        let own_id = state.id.clone();
        let mut detached = 0;
        for attribute in state.attributes.values_mut() {
            if let Attribute::Reference(target) = attribute {
                // A self-reference must not lock the state held here.
                let id = if Arc::ptr_eq(&target.inner, &self.inner) {
                    own_id.clone()
                } else {
                    target.id()
                };
                *attribute = Attribute::Value(JsonValue::String(id));
                detached += 1;
            }
        }
        detached
    }

    /// Saves inside its own transaction (or the caller's, if one is active).
    pub fn save(&self, store: &Store) -> Result<&Self> {
        self.save_with(store, true)
    }

    /// Saves; with `use_transaction == false` the write relies on a
    /// transaction managed by the caller.
    pub fn save_with(&self, store: &Store, use_transaction: bool) -> Result<&Self> {
        store.save(self, use_transaction)?;
        Ok(self)
    }

    pub fn delete(&self, store: &Store) -> Result<()> {
        self.delete_with(store, true)
    }

    pub fn delete_with(&self, store: &Store, use_transaction: bool) -> Result<()> {
        store.delete(self, use_transaction)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let state = self.state();
        Snapshot {
            id: state.id.clone(),
            object_type: state.object_type,
            created_at: state.created_at,
            updated_at: state.updated_at,
            attributes: state.attributes.clone(),
        }
    }

    /// Live objects held by declared reference attributes, in declaration order.
    pub(crate) fn referenced_objects(&self) -> Vec<Object> {
        let state = self.state();
        state
            .object_type
            .references()
            .iter()
            .filter_map(|name| match state.attributes.get(*name) {
                Some(Attribute::Reference(target)) => Some(target.clone()),
                _ => None,
            })
            .collect()
    }

    /// Declared reference attributes that still hold an id string.
    pub(crate) fn unresolved_references(&self) -> Vec<(&'static str, String)> {
        let state = self.state();
        state
            .object_type
            .references()
            .iter()
            .filter_map(|name| match state.attributes.get(*name) {
                Some(Attribute::Value(JsonValue::String(id))) => Some((*name, id.clone())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn resolve_reference(&self, key: &str, target: Object) {
        self.state()
            .attributes
            .insert(key.to_string(), Attribute::Reference(target));
    }

    /// Marks the start of a save. Returns `false` if a save of this object
    /// is already in progress further up a cascade.
    pub(crate) fn begin_save(&self) -> bool {
        let mut state = self.state();
        if state.saving {
            return false;
        }
        state.saving = true;
        true
    }

    pub(crate) fn end_save(&self) {
        self.state().saving = false;
    }

    pub(crate) fn is_saving(&self) -> bool {
        self.state().saving
    }

    /// Undoes an insert that was rolled back: the object is new and dirty again.
    pub(crate) fn mark_unsaved(&self) {
        let mut state = self.state();
        state.created_at = None;
        state.updated_at = None;
        state.dirty = true;
    }

    /// Records a successful write: stamps the envelope and marks clean.
    pub(crate) fn stamp_saved(&self, inserted: bool, at: DateTime<Utc>) {
        let mut state = self.state();
        if inserted {
            state.created_at = Some(at);
        } else {
            state.updated_at = Some(at);
        }
        state.dirty = false;
    }
}

fn check_assignable(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(DbError::InvalidArgument("attribute name cannot be empty".to_string()));
    }
    if RESERVED_ATTRIBUTES.contains(&key) {
        return Err(DbError::InvalidArgument(format!(
            "'{}' is managed by the object envelope",
            key
        )));
    }
    Ok(())
}

/// Walks a dotted path through nested JSON maps and arrays.
pub fn json_at_path<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(value, |current, segment| match current {
        JsonValue::Object(map) => map.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Object")
            .field("id", &state.id)
            .field("type_tag", &state.object_type.tag())
            .field("dirty", &state.dirty)
            .field("new", &state.created_at.is_none())
            .finish()
    }
}

/// An object serializes as its id, the same way it is stored when referenced.
impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id())
    }
}

impl From<&Object> for JsonValue {
    fn from(object: &Object) -> Self {
        JsonValue::String(object.id())
    }
}

impl From<Object> for JsonValue {
    fn from(object: Object) -> Self {
        JsonValue::from(&object)
    }
}
