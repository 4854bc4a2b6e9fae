use crate::core::{DbError, Result};
use crate::persist::object::Object;
use std::collections::HashMap;

/// Static description of a persisted type: its tag and the attributes that
/// hold references to other objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectType {
    tag: &'static str,
    references: &'static [&'static str],
}

impl ObjectType {
    pub const fn new(tag: &'static str, references: &'static [&'static str]) -> Self {
        Self { tag, references }
    }

    /// Type tag stored with every document, `<namespace>.<TypeName>`.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Reference attribute names, in declaration order.
    pub fn references(&self) -> &'static [&'static str] {
        self.references
    }

    pub fn has_references(&self) -> bool {
        !self.references.is_empty()
    }

    pub fn is_reference(&self, attribute: &str) -> bool {
        self.references.contains(&attribute)
    }
}

/// A persisted application type.
///
/// Implementors are usually zero-sized markers declared with
/// [`persistent_type!`](crate::persistent_type); the objects themselves are
/// [`Object`] handles tagged with `TYPE_TAG`.
pub trait PersistentType {
    /// Fully qualified tag, e.g. `"billing.Invoice"`.
    const TYPE_TAG: &'static str;

    /// Attributes that hold another persistent object (or nothing).
    const REFERENCES: &'static [&'static str] = &[];

    fn object_type() -> ObjectType {
        ObjectType::new(Self::TYPE_TAG, Self::REFERENCES)
    }

    /// Constructs a new, dirty object of this type with a fresh id.
    fn create() -> Object {
        Object::new(Self::object_type())
    }
}

/// Maps type tags to their declarations so stored documents can be rebuilt
/// as the right type.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: HashMap<&'static str, ObjectType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type, replacing any previous declaration with the same tag.
    /// Returns `true` when the tag was not known before.
    pub fn register(&mut self, object_type: ObjectType) -> bool {
        self.types.insert(object_type.tag(), object_type).is_none()
    }

    pub fn register_type<T: PersistentType>(&mut self) -> bool {
        self.register(T::object_type())
    }

    pub fn lookup(&self, tag: &str) -> Option<ObjectType> {
        self.types.get(tag).copied()
    }

    pub fn resolve(&self, tag: &str) -> Result<ObjectType> {
        self.lookup(tag)
            .ok_or_else(|| DbError::UnknownType(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.types.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}
