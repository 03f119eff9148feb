//! Prefab templates, memoized per load batch.
//!
//! A template is the component bag of a prefab asset in canonical form:
//! every native component is decoded and re-encoded once so that fields the
//! asset left at their defaults are spelled out. Diffs are always computed
//! and applied against this canonical form, which keeps the diff of an
//! unmodified instance empty.
//!
//! Entity references inside a template cannot point anywhere meaningful
//! and canonicalize to `null`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use worlds_ecs::components::Transform;
use worlds_ecs::Component;
use worlds_vfs::{AssetId, AssetStore};

use crate::context::{LoadContext, SaveContext};
use crate::document::ComponentBag;
use crate::error::{SceneError, SchemaError};
use crate::format::{self, SceneFormat};
use crate::msgpack;
use crate::patch;
use crate::registry::ComponentRegistry;

/// Immutable template bag of one prefab asset.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefabDocument {
    pub asset: AssetId,
    pub path: String,
    pub components: Map<String, Value>,
}

impl PrefabDocument {
    /// The template as a JSON object, the base every diff refers to.
    pub fn to_value(&self) -> Value {
        Value::Object(self.components.clone())
    }

    /// A fresh bag holding the template's components.
    pub fn bag(&self) -> ComponentBag {
        ComponentBag::from_json_map(self.components.clone())
    }

    pub fn transform(&self) -> Option<&Value> {
        self.components.get(Transform::NAME)
    }
}

/// Template cache keyed by asset id.
///
/// Owned by one serializer and cleared at the start of every load or save
/// batch, so edits to a prefab asset are picked up by the next batch.
#[derive(Default)]
pub struct PrefabCache {
    entries: HashMap<AssetId, Arc<PrefabDocument>>,
}

impl PrefabCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("prefabs: dropping {} cached templates", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, asset: AssetId) -> bool {
        self.entries.contains_key(&asset)
    }

    /// Seeds the cache with an already loaded template, canonicalized the
    /// same way a template read from the asset store would be.
    pub fn insert(
        &mut self,
        asset: AssetId,
        path: impl Into<String>,
        components: Map<String, Value>,
        registry: &ComponentRegistry,
        assets: &dyn AssetStore,
    ) -> Arc<PrefabDocument> {
        let document = Arc::new(PrefabDocument {
            asset,
            path: path.into(),
            components: canonicalize(components, registry, assets),
        });
        self.entries.insert(asset, Arc::clone(&document));
        document
    }

    /// Returns the template for `asset`, reading it on a miss.
    pub fn get(
        &mut self,
        asset: AssetId,
        registry: &ComponentRegistry,
        assets: &dyn AssetStore,
    ) -> Result<Arc<PrefabDocument>, SceneError> {
        if let Some(document) = self.entries.get(&asset) {
            return Ok(Arc::clone(document));
        }

        let path = assets
            .id_to_path(asset)
            .ok_or(worlds_vfs::VfsError::UnknownAsset(asset.0))?;
        let bytes = assets.read(asset)?;
        let components = parse_template(&bytes, &path)?;
        log::debug!(
            "prefabs: loaded '{path}' ({} components)",
            components.len()
        );
        Ok(self.insert(asset, path, components, registry, assets))
    }

    /// Like [`get`](Self::get), resolving the asset from its path first.
    pub fn get_by_path(
        &mut self,
        path: &str,
        registry: &ComponentRegistry,
        assets: &dyn AssetStore,
    ) -> Result<Arc<PrefabDocument>, SceneError> {
        let asset = assets.path_to_id(path)?;
        self.get(asset, registry, assets)
    }
}

fn parse_template(bytes: &[u8], path: &str) -> Result<Map<String, Value>, SceneError> {
    let value = match format::detect(bytes)? {
        SceneFormat::Json => serde_json::from_slice(bytes)?,
        SceneFormat::MessagePack => msgpack::decode_value(bytes)?,
        SceneFormat::Binary(family) => {
            return Err(SchemaError::Document(format!(
                "prefab '{path}' is a {family} stream; prefabs must be JSON or MessagePack"
            ))
            .into())
        }
    };
    match value {
        Value::Object(map) => Ok(map),
        other => Err(SchemaError::Document(format!(
            "prefab '{path}' must be an object of components, found {}",
            patch::kind(&other)
        ))
        .into()),
    }
}

fn canonicalize(
    components: Map<String, Value>,
    registry: &ComponentRegistry,
    assets: &dyn AssetStore,
) -> Map<String, Value> {
    let ids = HashMap::new();
    let mut load = LoadContext::validating(assets, SceneFormat::Json);
    let mut save = SaveContext::new(&ids, assets);

    components
        .into_iter()
        .map(|(name, value)| {
            let callbacks = registry.by_name(&name).and_then(|d| d.native_callbacks());
            let Some(callbacks) = callbacks else {
                return (name, value);
            };
            match (callbacks.canonical_json)(&value, &mut load, &mut save) {
                Ok(canonical) => (name, canonical),
                Err(err) => {
                    log::warn!("prefabs: keeping '{name}' as written, it does not decode: {err}");
                    (name, value)
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use worlds_vfs::{AssetDb, MemoryProvider, Vfs};

    fn store(files: &[(&str, &str)]) -> AssetDb {
        let mem = MemoryProvider::new();
        for (path, data) in files {
            mem.insert(*path, data.as_bytes().to_vec());
        }
        let mut vfs = Vfs::new();
        vfs.mount("game", mem);
        vfs.set_default("game");
        AssetDb::new(vfs)
    }

    #[test]
    fn templates_are_canonical_and_cached() {
        let assets = store(&[(
            "Prefabs/lamp.json",
            r#"{"Transform": {"position": [0, 1, 0], "rotation": [0, 0, 0, 1], "scale": [1, 1, 1]},
                "Light": {"color": [1, 1, 1]},
                "Sway": {"speed": 2}}"#,
        )]);
        let registry = ComponentRegistry::with_builtin();
        let mut cache = PrefabCache::new();

        let lamp = cache.get_by_path("Prefabs/lamp.json", &registry, &assets).unwrap();
        assert_eq!(lamp.path, "Prefabs/lamp.json");
        assert_eq!(lamp.components["Light"]["intensity"], json!(1.0));
        assert_eq!(lamp.components["Light"]["enabled"], json!(true));
        // unknown components stay as written
        assert_eq!(lamp.components["Sway"], json!({"speed": 2}));
        assert!(lamp.transform().is_some());

        assert!(cache.contains(lamp.asset));
        let again = cache.get(lamp.asset, &registry, &assets).unwrap();
        assert!(Arc::ptr_eq(&lamp, &again));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn template_must_be_an_object() {
        let assets = store(&[("Prefabs/bad.json", "  [1, 2]"), ("Prefabs/bin.wscn", "WSCN\x06")]);
        let registry = ComponentRegistry::with_builtin();
        let mut cache = PrefabCache::new();

        let err = cache.get_by_path("Prefabs/bad.json", &registry, &assets).err().unwrap();
        assert!(matches!(err, SceneError::Format(_)));
        let err = cache.get_by_path("Prefabs/bin.wscn", &registry, &assets).err().unwrap();
        assert!(matches!(err, SceneError::Schema(SchemaError::Document(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_asset_is_an_error() {
        let assets = store(&[]);
        let registry = ComponentRegistry::with_builtin();
        let mut cache = PrefabCache::new();
        let err = cache.get_by_path("Prefabs/none.json", &registry, &assets).err().unwrap();
        assert!(matches!(err, SceneError::Asset(_)));
    }
}
