//! JSON scene codec.
//!
//! ```json
//! {
//!   "entities": {
//!     "12": { "Transform": { ... }, "Light": { ... } },
//!     "40": { "prefabPath": "Prefabs/lamp.json", "diff": [ ... ], "Transform": { ... } }
//!   },
//!   "settings": { "skyboxPath": "Skies/day.hdr", "skyboxBoost": 1.0 }
//! }
//! ```
//!
//! Older documents are a bare entity map without the `entities` wrapper.
//! Problems with a single entity entry are logged and that entry is
//! skipped; only a document that is not an object at all is an error.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use worlds_ecs::components::Transform;
use worlds_ecs::Component;

use crate::document::{ComponentBag, DiffRecord, EntityRecord, SceneDocument, SettingsJson};
use crate::error::{SceneError, SchemaError};
use crate::format::SceneFormat;
use crate::patch;
use crate::remap::StoredEntityId;

pub const ENTITIES_KEY: &str = "entities";
pub const SETTINGS_KEY: &str = "settings";
pub const PREFAB_PATH_KEY: &str = "prefabPath";
pub const DIFF_KEY: &str = "diff";

/// Builds a document from a parsed JSON (or unpacked MessagePack) tree.
pub fn parse_document(value: Value, format: SceneFormat) -> Result<SceneDocument, SceneError> {
    let mut root = match value {
        Value::Object(root) => root,
        other => {
            return Err(SchemaError::Document(format!(
                "scene root must be an object, found {}",
                patch::kind(&other)
            ))
            .into())
        }
    };

    let mut document = SceneDocument::new(format);
    let entities = match root.remove(ENTITIES_KEY) {
        Some(Value::Object(entities)) => {
            document.settings = root.remove(SETTINGS_KEY).and_then(|s| parse_settings(s, format));
            entities
        }
        Some(other) => {
            return Err(SchemaError::Document(format!(
                "'{ENTITIES_KEY}' must be an object, found {}",
                patch::kind(&other)
            ))
            .into())
        }
        None => root,
    };

    log::debug!("{format}: document has {} entities", entities.len());
    for (key, value) in entities {
        let Ok(raw) = key.parse::<u32>() else {
            log::warn!("{format}: skipping entity with non-numeric key '{key}'");
            continue;
        };
        let stored = StoredEntityId(raw);
        match parse_entity(value) {
            Ok(record) => {
                document.entities.insert(stored, record);
            }
            Err(reason) => log::warn!("{format}: skipping entity {stored}: {reason}"),
        }
    }
    Ok(document)
}

fn parse_settings(value: Value, format: SceneFormat) -> Option<SettingsJson> {
    match serde_json::from_value(value) {
        Ok(settings) => Some(settings),
        Err(err) => {
            log::warn!("{format}: ignoring malformed scene settings: {err}");
            None
        }
    }
}

fn parse_entity(value: Value) -> Result<EntityRecord, String> {
    let mut map = match value {
        Value::Object(map) => map,
        other => return Err(format!("expected a component object, found {}", patch::kind(&other))),
    };
    let Some(path) = map.remove(PREFAB_PATH_KEY) else {
        return Ok(EntityRecord::Full(ComponentBag::from_json_map(map)));
    };

    let Value::String(prefab_path) = path else {
        return Err(format!("'{PREFAB_PATH_KEY}' must be a string"));
    };
    let diff = map.remove(DIFF_KEY).unwrap_or_else(|| Value::Array(Vec::new()));
    let transform = map.remove(Transform::NAME);
    if !map.is_empty() {
        let extra: Vec<_> = map.keys().map(String::as_str).collect();
        log::debug!("prefab instance of '{prefab_path}' ignores keys {extra:?}");
    }
    Ok(EntityRecord::PrefabInstance(DiffRecord {
        prefab_path,
        diff,
        transform,
    }))
}

fn record_to_value(record: &EntityRecord) -> Value {
    match record {
        EntityRecord::Full(bag) => Value::Object(bag.to_json_map()),
        EntityRecord::PrefabInstance(record) => {
            let mut map = Map::new();
            map.insert(PREFAB_PATH_KEY.to_owned(), Value::String(record.prefab_path.clone()));
            map.insert(DIFF_KEY.to_owned(), record.diff.clone());
            if let Some(transform) = &record.transform {
                map.insert(Transform::NAME.to_owned(), transform.clone());
            }
            Value::Object(map)
        }
    }
}

/// The JSON tree of a document whose bags hold JSON payloads.
pub fn document_to_value(document: &SceneDocument) -> Value {
    let entities: Map<String, Value> = document
        .entities
        .iter()
        .map(|(stored, record)| (stored.0.to_string(), record_to_value(record)))
        .collect();

    let mut root = Map::new();
    root.insert(ENTITIES_KEY.to_owned(), Value::Object(entities));
    if let Some(settings) = &document.settings {
        match serde_json::to_value(settings) {
            Ok(settings) => {
                root.insert(SETTINGS_KEY.to_owned(), settings);
            }
            Err(err) => log::error!("json: scene settings did not serialize: {err}"),
        }
    }
    Value::Object(root)
}

pub fn decode(bytes: &[u8]) -> Result<SceneDocument, SceneError> {
    parse_document(serde_json::from_slice(bytes)?, SceneFormat::Json)
}

pub fn encode(document: &SceneDocument, pretty: bool) -> Result<Vec<u8>, SceneError> {
    let value = document_to_value(document);
    Ok(if pretty {
        serde_json::to_vec_pretty(&value)?
    } else {
        serde_json::to_vec(&value)?
    })
}

/// Entity map of a clipboard payload: the bare map form, keyed by stored id.
pub fn entities_from_value(
    value: Value,
) -> Result<BTreeMap<StoredEntityId, EntityRecord>, SceneError> {
    Ok(parse_document(value, SceneFormat::Json)?.entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ComponentPayload;
    use serde_json::json;

    #[test]
    fn wrapped_document_with_settings() {
        let doc = parse_document(
            json!({
                "entities": {
                    "7": {"Transform": {}, "Name": {"name": "door"}},
                    "40": {"prefabPath": "Prefabs/lamp.json", "diff": [], "Transform": {"scale": [2, 2, 2]}}
                },
                "settings": {"skyboxPath": "Skies/day.hdr"}
            }),
            SceneFormat::Json,
        )
        .unwrap();

        assert_eq!(doc.len(), 2);
        let Some(EntityRecord::Full(bag)) = doc.entities.get(&StoredEntityId(7)) else {
            panic!("expected a full bag");
        };
        assert!(matches!(bag.get("Name"), Some(ComponentPayload::Json(_))));
        let Some(EntityRecord::PrefabInstance(record)) = doc.entities.get(&StoredEntityId(40)) else {
            panic!("expected a prefab instance");
        };
        assert_eq!(record.prefab_path, "Prefabs/lamp.json");
        assert_eq!(record.transform, Some(json!({"scale": [2, 2, 2]})));
        assert_eq!(doc.settings.unwrap().skybox_path.as_deref(), Some("Skies/day.hdr"));
    }

    #[test]
    fn bare_entity_map_is_accepted() {
        let doc = parse_document(json!({"1": {"Transform": {}}, "2": {}}), SceneFormat::Json).unwrap();
        assert_eq!(doc.len(), 2);
        assert!(doc.settings.is_none());
    }

    #[test]
    fn bad_entries_are_skipped() {
        let doc = parse_document(
            json!({
                "entities": {
                    "abc": {"Transform": {}},
                    "1": [1, 2],
                    "2": {"prefabPath": 5},
                    "3": {"Transform": {}}
                },
                "settings": {"skyboxBoost": "bright"}
            }),
            SceneFormat::Json,
        )
        .unwrap();
        assert_eq!(doc.entities.keys().copied().collect::<Vec<_>>(), vec![StoredEntityId(3)]);
        assert!(doc.settings.is_none());
    }

    #[test]
    fn non_object_root_is_an_error() {
        assert!(matches!(
            parse_document(json!([1]), SceneFormat::Json),
            Err(SceneError::Schema(SchemaError::Document(_)))
        ));
        assert!(decode(b"{ not json").is_err());
    }

    #[test]
    fn prefab_instance_without_diff_defaults_to_empty() {
        let doc = parse_document(json!({"5": {"prefabPath": "Prefabs/a.json"}}), SceneFormat::Json).unwrap();
        let Some(EntityRecord::PrefabInstance(record)) = doc.entities.get(&StoredEntityId(5)) else {
            panic!("expected a prefab instance");
        };
        assert_eq!(record.diff, json!([]));
        assert!(record.transform.is_none());
    }

    #[test]
    fn document_value_shape() {
        let mut doc = SceneDocument::new(SceneFormat::Json);
        let Value::Object(bag) = json!({"Name": {"name": "a"}}) else { unreachable!() };
        doc.entities
            .insert(StoredEntityId(1), EntityRecord::Full(ComponentBag::from_json_map(bag)));
        doc.entities.insert(
            StoredEntityId(2),
            EntityRecord::PrefabInstance(DiffRecord {
                prefab_path: "Prefabs/b.json".into(),
                diff: json!([]),
                transform: Some(json!({"position": [0, 0, 0]})),
            }),
        );
        doc.settings = Some(SettingsJson::default());

        assert_eq!(
            document_to_value(&doc),
            json!({
                "entities": {
                    "1": {"Name": {"name": "a"}},
                    "2": {"prefabPath": "Prefabs/b.json", "diff": [], "Transform": {"position": [0, 0, 0]}}
                },
                "settings": {"skyboxBoost": 1.0}
            })
        );
    }
}
