//! In-memory scene document shared by all codecs.
//!
//! Every codec parses into a [`SceneDocument`] (one [`EntityRecord`] per
//! stored id) and the reconstructor only ever consumes this shape, so
//! format-specific code just has to produce bags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use worlds_ecs::{Component, ComponentNotRegistered, Entity, World};
use worlds_vfs::AssetId;

use crate::format::SceneFormat;
use crate::remap::StoredEntityId;

// ---------------------------------------------------------------------------
// Type-erased component values
// ---------------------------------------------------------------------------

/// A decoded component that has not been inserted into a world yet.
pub trait ErasedComponent: Send + Sync {
    fn name(&self) -> &'static str;

    /// Moves the value onto `entity`.
    fn insert_into(
        self: Box<Self>,
        world: &mut World,
        entity: Entity,
    ) -> Result<(), ComponentNotRegistered>;
}

struct Typed<T>(T);

impl<T: Component> ErasedComponent for Typed<T> {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn insert_into(
        self: Box<Self>,
        world: &mut World,
        entity: Entity,
    ) -> Result<(), ComponentNotRegistered> {
        world.insert(entity, self.0)
    }
}

/// Boxes a concrete component.
pub fn erase<T: Component>(component: T) -> Box<dyn ErasedComponent> {
    Box::new(Typed(component))
}

// ---------------------------------------------------------------------------
// Bags
// ---------------------------------------------------------------------------

/// One component's persisted value, in whatever form the codec produced.
pub enum ComponentPayload {
    Json(Value),
    /// A validated WSCN payload, decoded again once references resolve.
    Binary { data: Vec<u8>, version: u8 },
    /// Already decoded (legacy ESCN carries no entity references).
    Native(Box<dyn ErasedComponent>),
}

impl std::fmt::Debug for ComponentPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentPayload::Json(value) => f.debug_tuple("Json").field(value).finish(),
            ComponentPayload::Binary { data, version } => f
                .debug_struct("Binary")
                .field("len", &data.len())
                .field("version", version)
                .finish(),
            ComponentPayload::Native(component) => {
                f.debug_tuple("Native").field(&component.name()).finish()
            }
        }
    }
}

/// Component name to payload for one entity.
#[derive(Debug, Default)]
pub struct ComponentBag {
    components: BTreeMap<String, ComponentPayload>,
}

impl ComponentBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, payload: ComponentPayload) {
        self.components.insert(name.into(), payload);
    }

    pub fn remove(&mut self, name: &str) -> Option<ComponentPayload> {
        self.components.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&ComponentPayload> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Builds a bag from a JSON object of `name -> value`.
    pub fn from_json_map(map: serde_json::Map<String, Value>) -> Self {
        Self {
            components: map
                .into_iter()
                .map(|(name, value)| (name, ComponentPayload::Json(value)))
                .collect(),
        }
    }

    /// The JSON view of the bag. Non-JSON payloads are skipped.
    pub fn to_json_map(&self) -> serde_json::Map<String, Value> {
        self.components
            .iter()
            .filter_map(|(name, payload)| match payload {
                ComponentPayload::Json(value) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (String, ComponentPayload)> + '_ {
        std::mem::take(&mut self.components).into_iter()
    }
}

/// A prefab instance persisted as a patch against its template.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRecord {
    pub prefab_path: String,
    /// JSON Patch document applied to the template bag.
    pub diff: Value,
    /// Stored verbatim; never part of the diff.
    pub transform: Option<Value>,
}

#[derive(Debug)]
pub enum EntityRecord {
    Full(ComponentBag),
    PrefabInstance(DiffRecord),
}

// ---------------------------------------------------------------------------
// Settings and document
// ---------------------------------------------------------------------------

/// Scene-wide settings, kept as a world resource while the scene is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSettings {
    pub skybox: AssetId,
    pub skybox_boost: f32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            skybox: AssetId::INVALID,
            skybox_boost: 1.0,
        }
    }
}

fn default_boost() -> f32 {
    1.0
}

/// JSON shape of [`SceneSettings`]; assets are paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skybox_path: Option<String>,
    #[serde(default = "default_boost")]
    pub skybox_boost: f32,
}

impl Default for SettingsJson {
    fn default() -> Self {
        Self {
            skybox_path: None,
            skybox_boost: default_boost(),
        }
    }
}

/// A parsed scene, independent of the encoding it came from.
#[derive(Debug)]
pub struct SceneDocument {
    pub format: SceneFormat,
    pub entities: BTreeMap<StoredEntityId, EntityRecord>,
    pub settings: Option<SettingsJson>,
}

impl SceneDocument {
    pub fn new(format: SceneFormat) -> Self {
        Self {
            format,
            entities: BTreeMap::new(),
            settings: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use worlds_ecs::components::Name;

    #[test]
    fn erased_component_inserts() {
        let mut world = World::new();
        world.register_component::<Name>();
        let e = world.spawn();

        let boxed = erase(Name::new("door"));
        assert_eq!(boxed.name(), "Name");
        boxed.insert_into(&mut world, e).unwrap();
        assert_eq!(world.get::<Name>(e).map(Name::as_str), Some("door"));
    }

    #[test]
    fn bag_json_view() {
        let map = json!({"Transform": {"position": [0, 0, 0]}, "Light": {"type": 0}});
        let Value::Object(map) = map else { unreachable!() };
        let mut bag = ComponentBag::from_json_map(map.clone());
        bag.insert("Name", ComponentPayload::Native(erase(Name::new("x"))));

        assert_eq!(bag.len(), 3);
        assert_eq!(bag.to_json_map(), map);
        assert_eq!(bag.names().collect::<Vec<_>>(), vec!["Light", "Name", "Transform"]);
    }

    #[test]
    fn settings_boost_defaults_to_one() {
        let parsed: SettingsJson = serde_json::from_value(json!({"skyboxPath": "Sky/day.hdr"})).unwrap();
        assert_eq!(parsed.skybox_boost, 1.0);
        assert_eq!(parsed.skybox_path.as_deref(), Some("Sky/day.hdr"));

        let empty: SettingsJson = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.skybox_boost, 1.0);
    }
}
