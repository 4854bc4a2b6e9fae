//! Stored document codec.
//!
//! An object is written as one flat JSON document: the envelope fields, then
//! every attribute verbatim, with reference attributes replaced by the target
//! id. Decoding reverses this; references come back as id strings and are
//! resolved by the loader.

use crate::core::value::{format_timestamp, parse_timestamp};
use crate::core::{DbError, Result};
use crate::persist::object::{Attribute, CREATED_AT, Object, Snapshot, UPDATED_AT};
use crate::persist::registry::TypeRegistry;
use crate::storage::schema::{ID_PATH, TYPE_TAG_PATH};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Builds the flattened document for a snapshot with the given envelope stamps.
pub(crate) fn encode(
    snapshot: &Snapshot,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
) -> JsonValue {
    let mut document = Map::new();
    document.insert(ID_PATH.to_string(), JsonValue::String(snapshot.id.clone()));
    document.insert(
        TYPE_TAG_PATH.to_string(),
        JsonValue::String(snapshot.object_type.tag().to_string()),
    );
    if let Some(at) = created_at {
        document.insert(CREATED_AT.to_string(), JsonValue::String(format_timestamp(&at)));
    }
    if let Some(at) = updated_at {
        document.insert(UPDATED_AT.to_string(), JsonValue::String(format_timestamp(&at)));
    }

    for (key, attribute) in &snapshot.attributes {
        let value = match attribute {
            Attribute::Value(value) => value.clone(),
            Attribute::Reference(target) => JsonValue::String(target.id()),
        };
        document.insert(key.clone(), value);
    }

    JsonValue::Object(document)
}

/// Rebuilds an object from document text. The type tag must be registered.
pub(crate) fn decode(text: &str, registry: &TypeRegistry) -> Result<Object> {
    let mut document = match serde_json::from_str::<JsonValue>(text)? {
        JsonValue::Object(map) => map,
        other => {
            return Err(DbError::Serialization(format!(
                "stored document is not a JSON object: {}",
                other
            )));
        }
    };

    let id = take_string(&mut document, ID_PATH)?;
    let tag = take_string(&mut document, TYPE_TAG_PATH)?;
    let object_type = registry.resolve(&tag)?;
    let created_at = take_timestamp(&mut document, CREATED_AT);
    let updated_at = take_timestamp(&mut document, UPDATED_AT);

    let attributes: BTreeMap<String, JsonValue> = document.into_iter().collect();
    Ok(Object::restore(id, object_type, created_at, updated_at, attributes))
}

fn take_string(document: &mut Map<String, JsonValue>, key: &str) -> Result<String> {
    match document.remove(key) {
        Some(JsonValue::String(value)) => Ok(value),
        _ => Err(DbError::Serialization(format!(
            "stored document has no '{}' string field",
            key
        ))),
    }
}

fn take_timestamp(document: &mut Map<String, JsonValue>, key: &str) -> Option<DateTime<Utc>> {
    match document.remove(key) {
        Some(JsonValue::String(text)) => parse_timestamp(&text),
        _ => None,
    }
}
