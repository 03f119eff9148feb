//! Scene loading and saving entry points.
//!
//! [`SceneSerializer`] ties format detection, the codecs and the
//! reconstructor together. Every public call is one batch: the prefab cache
//! is cleared first and a fresh remap table is built for each load.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::{Map, Value};
use worlds_ecs::components::Transform;
use worlds_ecs::{Entity, World};
use worlds_vfs::{AssetId, AssetStore};

use crate::binary;
use crate::components::KeepOnSceneLoad;
use crate::config::SceneOptions;
use crate::context::SaveContext;
use crate::document::{SceneDocument, SceneSettings};
use crate::error::{SceneError, SchemaError};
use crate::format::{self, BinaryFamily, SceneFormat};
use crate::json;
use crate::managed::ManagedComponentHook;
use crate::msgpack;
use crate::prefab::PrefabCache;
use crate::reconstruct::{EntityReconstructor, LoadReport};
use crate::registry::ComponentRegistry;
use crate::remap::StoredEntityId;
use crate::snapshot::{saved_entities, SceneWriter};

/// Loads and saves scenes, clipboard payloads and prefabs.
pub struct SceneSerializer<'a> {
    registry: &'a ComponentRegistry,
    assets: &'a dyn AssetStore,
    managed: &'a dyn ManagedComponentHook,
    prefabs: PrefabCache,
    options: SceneOptions,
}

impl<'a> SceneSerializer<'a> {
    pub fn new(
        registry: &'a ComponentRegistry,
        assets: &'a dyn AssetStore,
        managed: &'a dyn ManagedComponentHook,
    ) -> Self {
        Self {
            registry,
            assets,
            managed,
            prefabs: PrefabCache::new(),
            options: SceneOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SceneOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    /// The template cache, mostly for seeding templates in tools and tests.
    pub fn prefabs_mut(&mut self) -> &mut PrefabCache {
        &mut self.prefabs
    }

    pub fn clear_prefab_cache(&mut self) {
        self.prefabs.clear();
    }

    fn reconstructor(&mut self) -> EntityReconstructor<'_> {
        EntityReconstructor::new(self.registry, self.assets, self.managed, &mut self.prefabs)
            .restore_identity(self.options.restore_entity_ids)
    }

    fn writer(&mut self) -> SceneWriter<'_> {
        SceneWriter::new(self.registry, self.assets, self.managed, &mut self.prefabs)
            .prefab_root(&self.options.prefab_root)
    }

    // -----------------------------------------------------------------------
    // Scenes
    // -----------------------------------------------------------------------

    /// Parses a whole scene without touching any world.
    pub fn parse(&self, bytes: &[u8]) -> Result<SceneDocument, SceneError> {
        match format::detect(bytes)? {
            SceneFormat::Binary(_) => binary::decode(bytes, self.registry, self.assets),
            SceneFormat::Json => json::decode(bytes),
            SceneFormat::MessagePack => msgpack::decode(bytes),
        }
    }

    /// Loads a scene into `world`.
    ///
    /// The input is classified and parsed before the world is touched, so a
    /// format, truncation or binary schema error leaves `world` exactly as
    /// it was. A non-additive load then removes every entity that has a
    /// Transform and is not marked [`KeepOnSceneLoad`].
    pub fn load_scene(
        &mut self,
        world: &mut World,
        bytes: &[u8],
        additive: bool,
    ) -> Result<LoadReport, SceneError> {
        let start = Instant::now();
        self.prefabs.clear();

        let document = self.parse(bytes)?;
        let format = document.format;
        let settings = document.settings.clone();
        if !additive {
            clear_scene(world);
        }

        log::info!("{format}: scene has {} entities", document.len());
        let report = self.reconstructor().reconstruct(world, document);

        if let Some(settings) = settings {
            let skybox = match settings.skybox_path.as_deref() {
                Some(path) if !path.is_empty() => self.assets.path_to_id(path).unwrap_or_else(|err| {
                    log::warn!("{format}: skybox '{path}' is not a valid asset path: {err}");
                    AssetId::INVALID
                }),
                _ => AssetId::INVALID,
            };
            world.insert_resource(SceneSettings {
                skybox,
                skybox_boost: settings.skybox_boost,
            });
        }

        log::info!(
            "loaded {format} scene in {:.3}ms ({} entities, {} dropped)",
            start.elapsed().as_secs_f64() * 1000.0,
            report.entities.len(),
            report.dropped.len()
        );
        Ok(report)
    }

    pub fn load_scene_asset(
        &mut self,
        world: &mut World,
        asset: AssetId,
        additive: bool,
    ) -> Result<LoadReport, SceneError> {
        let bytes = self.assets.read(asset)?;
        self.load_scene(world, &bytes, additive)
    }

    /// [`load_scene_asset`](Self::load_scene_asset) with the configured
    /// additive default.
    pub fn open_scene(&mut self, world: &mut World, asset: AssetId) -> Result<LoadReport, SceneError> {
        let additive = self.options.additive;
        self.load_scene_asset(world, asset, additive)
    }

    /// Encodes every saved entity of `world`.
    pub fn save_scene(&mut self, world: &World, format: SceneFormat) -> Result<Vec<u8>, SceneError> {
        let start = Instant::now();
        self.prefabs.clear();
        let entities = saved_entities(world);
        let pretty = self.options.pretty_json;

        let bytes = match format {
            SceneFormat::Binary(family) if family != BinaryFamily::Wscn => {
                return Err(SchemaError::Document(format!("{family} is read-only")).into());
            }
            SceneFormat::Binary(_) => self.writer().binary(world, &entities),
            SceneFormat::Json => {
                let document = self.writer().document(world, &entities, format);
                json::encode(&document, pretty)?
            }
            SceneFormat::MessagePack => {
                let document = self.writer().document(world, &entities, format);
                msgpack::encode(&document)?
            }
        };

        log::info!(
            "saved {format} scene in {:.3}ms ({} entities, {} bytes)",
            start.elapsed().as_secs_f64() * 1000.0,
            entities.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    pub fn save_scene_asset(
        &mut self,
        world: &World,
        asset: AssetId,
        format: SceneFormat,
    ) -> Result<(), SceneError> {
        let bytes = self.save_scene(world, format)?;
        self.assets.write(asset, &bytes)?;
        Ok(())
    }

    /// [`save_scene_asset`](Self::save_scene_asset) in the configured
    /// default format.
    pub fn store_scene(&mut self, world: &World, asset: AssetId) -> Result<(), SceneError> {
        let format = self.options.default_format.into();
        self.save_scene_asset(world, asset, format)
    }

    // -----------------------------------------------------------------------
    // Clipboard and prefabs
    // -----------------------------------------------------------------------

    /// Full component bag of one entity. References to other entities are
    /// written as `null`.
    pub fn entity_to_json(&mut self, world: &World, entity: Entity) -> Value {
        self.entities_to_json(world, &[entity])
            .remove(&entity.index().to_string())
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Bare entity map of `entities`, keyed by slot index. References
    /// between them survive a paste; references leaving the set are `null`.
    pub fn entities_to_json(&mut self, world: &World, entities: &[Entity]) -> Map<String, Value> {
        let ids: HashMap<_, _> = entities
            .iter()
            .map(|&entity| (entity, StoredEntityId(entity.index())))
            .collect();
        let mut ctx = SaveContext::new(&ids, self.assets);
        let writer = self.writer();
        entities
            .iter()
            .map(|&entity| {
                let bag = writer.entity_bag(world, entity, &mut ctx);
                (entity.index().to_string(), Value::Object(bag))
            })
            .collect()
    }

    /// Spawns one entity from a component bag (or a prefab instance
    /// record).
    pub fn json_to_entity(&mut self, world: &mut World, value: Value) -> Result<Entity, SceneError> {
        let stored = StoredEntityId(0);
        let mut entities = Map::new();
        entities.insert(stored.0.to_string(), value);
        let report = self.json_to_entities(world, Value::Object(entities))?;
        report
            .entity(stored)
            .ok_or_else(|| SchemaError::MissingTransform { stored }.into())
    }

    /// Pastes a bare entity map. Every entity gets a fresh handle.
    pub fn json_to_entities(&mut self, world: &mut World, value: Value) -> Result<LoadReport, SceneError> {
        self.prefabs.clear();
        let mut document = SceneDocument::new(SceneFormat::Json);
        document.entities = json::entities_from_value(value)?;
        Ok(self.reconstructor().reconstruct_scoped(world, document))
    }

    /// Spawns the contents of a prefab asset as a plain entity.
    pub fn load_entity(&mut self, world: &mut World, asset: AssetId) -> Result<Entity, SceneError> {
        self.prefabs.clear();
        self.reconstructor().load_entity(world, asset)
    }

    /// Spawns a tracked instance of a prefab asset.
    pub fn create_prefab(&mut self, world: &mut World, asset: AssetId) -> Result<Entity, SceneError> {
        self.prefabs.clear();
        self.reconstructor().create_prefab(world, asset)
    }
}

/// Despawns the current scene, keeping entities marked [`KeepOnSceneLoad`].
fn clear_scene(world: &mut World) {
    let doomed: Vec<Entity> = world
        .entities_with::<Transform>()
        .filter(|&entity| !world.has::<KeepOnSceneLoad>(entity))
        .collect();
    log::debug!("clearing {} scene entities", doomed.len());
    for entity in doomed {
        world.despawn(entity);
    }
}
