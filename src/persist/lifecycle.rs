//! Save, delete and load for persistent objects.
//!
//! Saving flattens reference attributes to ids (cascading into referenced
//! objects that were never saved), then inserts or updates the document.
//! Loading decodes the document and resolves reference ids back into live
//! objects through the object cache.

use crate::core::value::now;
use crate::core::{DbError, Result};
use crate::persist::codec;
use crate::persist::object::Object;
use crate::storage::Store;
use std::collections::HashMap;
use tracing::debug;

/// Objects decoded during one load, by id, so cyclic references resolve to
/// the instance already being built.
pub(crate) type Pending = HashMap<String, Object>;

impl Store {
    /// Writes a dirty object; a clean one is left untouched.
    ///
    /// Referenced objects that were never saved are saved first, inside the
    /// same transaction. On failure the object stays dirty so the save can be
    /// retried; when the transaction was opened here, every object inserted
    /// by the cascade is returned to new and dirty as well.
    pub fn save(&self, object: &Object, use_transaction: bool) -> Result<()> {
        if !object.is_dirty() {
            return Ok(());
        }

        let owns_transaction = use_transaction && !self.in_transaction();
        let mut inserted = Vec::new();
        let result = self.run_write(use_transaction, || self.save_graph(object, &mut inserted));
        if result.is_err() {
            object.mark_dirty();
            if owns_transaction {
                for saved in &inserted {
                    saved.mark_unsaved();
                }
            }
        }
        result
    }

    fn save_graph(&self, object: &Object, inserted: &mut Vec<Object>) -> Result<()> {
        if !object.is_dirty() {
            return Ok(());
        }
        if !object.begin_save() {
            // Saved further up a reference cycle; that save writes it.
            return Ok(());
        }

        let result = self.write_object(object, inserted);
        object.end_save();
        if result.is_err() {
            object.mark_dirty();
        }
        result
    }

    fn write_object(&self, object: &Object, inserted: &mut Vec<Object>) -> Result<()> {
        self.register_type(object.object_type());

        for target in object.referenced_objects() {
            if target.ptr_eq(object) || target.is_saving() {
                continue;
            }
            if target.is_new() {
                self.save_graph(&target, inserted)?;
            }
        }

        let snapshot = object.snapshot();
        let stamped_at = now();
        let is_insert = snapshot.created_at.is_none();
        let document = if is_insert {
            codec::encode(&snapshot, Some(stamped_at), snapshot.updated_at)
        } else {
            codec::encode(&snapshot, snapshot.created_at, Some(stamped_at))
        }
        .to_string();

        if is_insert {
            self.insert_document(&document)?;
        } else {
            self.update_document(&snapshot.id, &document)?;
        }

        object.stamp_saved(is_insert, stamped_at);
        if is_insert {
            inserted.push(object.clone());
        }
        debug!(
            "Saved object: id='{}' type='{}' {}",
            snapshot.id,
            snapshot.object_type.tag(),
            if is_insert { "inserted" } else { "updated" }
        );
        Ok(())
    }

    /// Removes the object's document and evicts it from the cache. Deleting
    /// an object that is not stored is not an error. The in-memory object
    /// keeps its attributes.
    pub fn delete(&self, object: &Object, use_transaction: bool) -> Result<()> {
        let id = object.id();
        let removed = self.run_write(use_transaction, || self.delete_document(&id))?;
        self.cache().evict(&id);
        debug!("Deleted object: id='{}' rows={}", id, removed);
        Ok(())
    }

    /// Loads an object by id, bypassing the cache for the object itself.
    /// References are resolved through the cache.
    pub fn get(&self, id: &str) -> Result<Object> {
        let mut pending = Pending::new();
        self.load(id, &mut pending)
    }

    fn load(&self, id: &str, pending: &mut Pending) -> Result<Object> {
        let document = self
            .fetch_document(id)?
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;
        self.hydrate(&document, pending)
    }

    /// Decodes a stored document into a clean, fully resolved object.
    pub(crate) fn hydrate(&self, document: &str, pending: &mut Pending) -> Result<Object> {
        let object = codec::decode(document, &self.registry())?;
        pending.insert(object.id(), object.clone());

        for (name, target_id) in object.unresolved_references() {
            let known = pending.get(&target_id).cloned();
            let target = match known {
                Some(target) => target,
                None => self
                    .cache()
                    .get_or_load(&target_id, || self.load(&target_id, pending))?,
            };
            object.resolve_reference(name, target);
        }

        object.mark_clean();
        debug!("Loaded object: id='{}' type='{}'", object.id(), object.type_tag());
        Ok(object)
    }
}
