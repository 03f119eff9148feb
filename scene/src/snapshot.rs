//! World to document: the save side of every codec.
//!
//! An entity is saved when it has a Transform and is not marked
//! [`DontSerialize`]. Its stored id is its slot index, so ids are unique
//! within one save and a load that restores identities gets the same
//! slots back.

use std::collections::HashMap;

use serde_json::{Map, Value};
use worlds_ecs::components::Transform;
use worlds_ecs::{Component, Entity, World};
use worlds_vfs::{path, AssetStore};

use crate::binary;
use crate::components::{DontSerialize, PrefabInstance};
use crate::context::SaveContext;
use crate::document::{
    ComponentBag, DiffRecord, EntityRecord, SceneDocument, SceneSettings, SettingsJson,
};
use crate::format::SceneFormat;
use crate::managed::ManagedComponentHook;
use crate::patch;
use crate::prefab::PrefabCache;
use crate::registry::ComponentRegistry;
use crate::remap::StoredEntityId;

/// Entities a scene save writes, in ascending slot index.
pub fn saved_entities(world: &World) -> Vec<(Entity, StoredEntityId)> {
    let mut entities: Vec<_> = world
        .entities_with::<Transform>()
        .filter(|&entity| !world.has::<DontSerialize>(entity))
        .map(|entity| (entity, StoredEntityId(entity.index())))
        .collect();
    entities.sort_by_key(|(_, stored)| *stored);
    entities
}

/// Builds documents and binary streams from a world.
pub struct SceneWriter<'a> {
    registry: &'a ComponentRegistry,
    assets: &'a dyn AssetStore,
    managed: &'a dyn ManagedComponentHook,
    prefabs: &'a mut PrefabCache,
    prefab_root: &'a str,
}

impl<'a> SceneWriter<'a> {
    pub fn new(
        registry: &'a ComponentRegistry,
        assets: &'a dyn AssetStore,
        managed: &'a dyn ManagedComponentHook,
        prefabs: &'a mut PrefabCache,
    ) -> Self {
        Self {
            registry,
            assets,
            managed,
            prefabs,
            prefab_root: "",
        }
    }

    /// Directory stripped from prefab paths written into diff records.
    pub fn prefab_root(mut self, root: &'a str) -> Self {
        self.prefab_root = root;
        self
    }

    /// Full JSON bag of one entity: native components in registry order,
    /// then whatever the managed runtime reports.
    pub fn entity_bag(&self, world: &World, entity: Entity, ctx: &mut SaveContext) -> Map<String, Value> {
        let mut bag = Map::new();
        for (descriptor, callbacks) in self.registry.native() {
            ctx.set_component(descriptor.name);
            match (callbacks.to_json)(world, entity, ctx) {
                Some(Ok(value)) => {
                    bag.insert(descriptor.name.to_owned(), value);
                }
                Some(Err(err)) => {
                    log::error!("save: {entity}: '{}' did not serialize: {err}", descriptor.name);
                }
                None => {}
            }
        }
        for (name, value) in self.managed.serialize(world, entity) {
            if bag.contains_key(&name) {
                log::warn!("save: {entity}: managed '{name}' shadows a native component, skipped");
                continue;
            }
            bag.insert(name, value);
        }
        bag
    }

    /// JSON-shaped document of `entities`, with prefab instances as diffs.
    pub fn document(
        &mut self,
        world: &World,
        entities: &[(Entity, StoredEntityId)],
        format: SceneFormat,
    ) -> SceneDocument {
        let ids: HashMap<Entity, StoredEntityId> = entities.iter().copied().collect();
        let mut ctx = SaveContext::new(&ids, self.assets);
        let mut document = SceneDocument::new(format);

        for &(entity, stored) in entities {
            let bag = self.entity_bag(world, entity, &mut ctx);
            let record = match world.get::<PrefabInstance>(entity) {
                Some(instance) => self.instance_record(instance, bag),
                None => EntityRecord::Full(ComponentBag::from_json_map(bag)),
            };
            document.entities.insert(stored, record);
        }

        document.settings = Some(self.settings(world));
        if ctx.dangling() > 0 {
            log::warn!(
                "save: {} references to unsaved entities were written as null",
                ctx.dangling()
            );
        }
        document
    }

    /// Current-version WSCN stream of `entities`.
    pub fn binary(&self, world: &World, entities: &[(Entity, StoredEntityId)]) -> Vec<u8> {
        let ids: HashMap<Entity, StoredEntityId> = entities.iter().copied().collect();
        let mut ctx = SaveContext::new(&ids, self.assets);
        let bytes = binary::encode(world, self.registry, entities, &mut ctx);
        if ctx.dangling() > 0 {
            log::warn!(
                "save: {} references to unsaved entities were written as null",
                ctx.dangling()
            );
        }
        bytes
    }

    /// Diff record for a prefab instance, or the full bag when its template
    /// is unavailable.
    fn instance_record(&mut self, instance: &PrefabInstance, mut bag: Map<String, Value>) -> EntityRecord {
        let template = match self.prefabs.get(instance.prefab, self.registry, self.assets) {
            Ok(template) => template,
            Err(err) => {
                log::warn!(
                    "save: template {} unavailable, writing the instance in full: {err}",
                    instance.prefab
                );
                return EntityRecord::Full(ComponentBag::from_json_map(bag));
            }
        };

        // The live Transform is stored verbatim; the diff never sees it
        let transform = bag.remove(Transform::NAME);
        if let Some(base) = template.transform() {
            bag.insert(Transform::NAME.to_owned(), base.clone());
        }
        let diff = patch::diff(&template.to_value(), &Value::Object(bag));

        EntityRecord::PrefabInstance(DiffRecord {
            prefab_path: path::strip_root(&template.path, self.prefab_root).to_owned(),
            diff: diff.to_value(),
            transform,
        })
    }

    fn settings(&self, world: &World) -> SettingsJson {
        let settings = world.resource::<SceneSettings>().copied().unwrap_or_default();
        let skybox_path = if settings.skybox.is_valid() {
            let path = self.assets.id_to_path(settings.skybox);
            if path.is_none() {
                log::warn!("save: skybox {} has no path", settings.skybox);
            }
            path
        } else {
            None
        };
        SettingsJson {
            skybox_path,
            skybox_boost: settings.skybox_boost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Light;
    use crate::managed::NoManagedComponents;
    use serde_json::json;
    use worlds_ecs::components::Name;
    use worlds_vfs::{AssetDb, Vfs};

    fn world_with(registry: &ComponentRegistry) -> World {
        let mut world = World::new();
        registry.register_storages(&mut world);
        world
    }

    #[test]
    fn only_transform_entities_without_marker_are_saved() {
        let registry = ComponentRegistry::with_builtin();
        let mut world = world_with(&registry);
        let a = world.spawn();
        let b = world.spawn();
        let c = world.spawn();
        world.insert(a, Transform::IDENTITY).unwrap();
        world.insert(b, Light::default()).unwrap();
        world.insert(c, Transform::IDENTITY).unwrap();
        world.insert(c, DontSerialize).unwrap();

        assert_eq!(saved_entities(&world), vec![(a, StoredEntityId(a.index()))]);
    }

    #[test]
    fn full_bag_in_registry_order_with_settings() {
        let registry = ComponentRegistry::with_builtin();
        let assets = AssetDb::new(Vfs::new());
        let mut prefabs = PrefabCache::new();
        let mut world = world_with(&registry);
        let e = world.spawn();
        world.insert(e, Transform::from_xyz(1.0, 0.0, 0.0)).unwrap();
        world.insert(e, Name::new("door")).unwrap();
        let sky = assets.path_to_id("Skies/dusk.hdr").unwrap();
        world.insert_resource(SceneSettings {
            skybox: sky,
            skybox_boost: 2.0,
        });

        let entities = saved_entities(&world);
        let doc = SceneWriter::new(&registry, &assets, &NoManagedComponents, &mut prefabs)
            .document(&world, &entities, SceneFormat::Json);

        let Some(EntityRecord::Full(bag)) = doc.entities.get(&StoredEntityId(e.index())) else {
            panic!("expected a full bag");
        };
        assert_eq!(bag.names().collect::<Vec<_>>(), vec!["Name", "Transform"]);
        assert_eq!(bag.to_json_map()["Name"], json!({"name": "door"}));
        let settings = doc.settings.unwrap();
        assert_eq!(settings.skybox_path.as_deref(), Some("Skies/dusk.hdr"));
        assert_eq!(settings.skybox_boost, 2.0);
    }

    #[test]
    fn instance_with_missing_template_is_saved_in_full() {
        let registry = ComponentRegistry::with_builtin();
        let assets = AssetDb::new(Vfs::new());
        let mut prefabs = PrefabCache::new();
        let mut world = world_with(&registry);
        let e = world.spawn();
        world.insert(e, Transform::IDENTITY).unwrap();
        let prefab = assets.path_to_id("Prefabs/gone.json").unwrap();
        world.insert(e, PrefabInstance { prefab }).unwrap();

        let entities = saved_entities(&world);
        let doc = SceneWriter::new(&registry, &assets, &NoManagedComponents, &mut prefabs)
            .document(&world, &entities, SceneFormat::Json);
        assert!(matches!(doc.entities.values().next(), Some(EntityRecord::Full(_))));
    }
}
