//! Turns a parsed [`SceneDocument`] into live entities.
//!
//! Reconstruction runs in three phases, whatever format the document came
//! from:
//!
//! 1. Every entity that has a Transform is created and gets its Transform.
//!    Entities without one are dropped before they exist. Once this phase
//!    ends the remap table is complete.
//! 2. Prefab instances have their diff applied to the cached template.
//! 3. The remaining components are applied in ascending sort key across all
//!    entities, native before managed, resolving entity references through
//!    the remap table.
//!
//! Per-entity problems are logged and counted in the [`LoadReport`]; the
//! reconstructor itself never fails.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use worlds_ecs::components::Transform;
use worlds_ecs::{Component, Entity, World};
use worlds_vfs::{AssetId, AssetStore};

use crate::binary::io::BinaryReader;
use crate::components::PrefabInstance;
use crate::context::LoadContext;
use crate::document::{
    ComponentBag, ComponentPayload, DiffRecord, EntityRecord, ErasedComponent, SceneDocument,
};
use crate::error::{PatchConflictError, SceneError, SchemaError};
use crate::format::SceneFormat;
use crate::managed::ManagedComponentHook;
use crate::patch::{self, Patch};
use crate::prefab::{PrefabCache, PrefabDocument};
use crate::registry::{ComponentRegistry, NativeCallbacks};
use crate::remap::{EntityIdRemapper, StoredEntityId};

/// Outcome of one reconstruction.
#[derive(Debug)]
pub struct LoadReport {
    pub format: SceneFormat,
    /// Live entity created for each stored id that survived.
    pub entities: BTreeMap<StoredEntityId, Entity>,
    /// Entities dropped because they had no usable Transform.
    pub dropped: Vec<StoredEntityId>,
    /// Prefab instances whose diff did not apply; they kept only their
    /// Transform.
    pub patch_conflicts: Vec<(StoredEntityId, PatchConflictError)>,
    /// Prefab instances whose template could not be loaded.
    pub missing_prefabs: Vec<(StoredEntityId, String)>,
    /// Components that failed to decode or insert and were skipped.
    pub component_errors: usize,
    /// Entity references that pointed at undeclared entities.
    pub unresolved_references: usize,
}

impl LoadReport {
    pub fn new(format: SceneFormat) -> Self {
        Self {
            format,
            entities: BTreeMap::new(),
            dropped: Vec::new(),
            patch_conflicts: Vec::new(),
            missing_prefabs: Vec::new(),
            component_errors: 0,
            unresolved_references: 0,
        }
    }

    pub fn entity(&self, stored: StoredEntityId) -> Option<Entity> {
        self.entities.get(&stored).copied()
    }

    /// `true` when nothing had to be skipped or degraded.
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
            && self.patch_conflicts.is_empty()
            && self.missing_prefabs.is_empty()
            && self.component_errors == 0
            && self.unresolved_references == 0
    }
}

// ---------------------------------------------------------------------------
// Per-entity state between phases
// ---------------------------------------------------------------------------

struct Pending {
    stored: StoredEntityId,
    entity: Entity,
    bag: ComponentBag,
    instance: Option<Instance>,
}

struct Instance {
    template: Arc<PrefabDocument>,
    diff: Value,
}

/// Builds entities from documents. Borrows everything it needs for the
/// duration of one batch.
pub struct EntityReconstructor<'a> {
    registry: &'a ComponentRegistry,
    assets: &'a dyn AssetStore,
    managed: &'a dyn ManagedComponentHook,
    prefabs: &'a mut PrefabCache,
    restore_identity: bool,
}

impl<'a> EntityReconstructor<'a> {
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
            restore_identity: false,
        }
    }

    /// Re-create entities at their stored slot index where it is free.
    pub fn restore_identity(mut self, restore: bool) -> Self {
        self.restore_identity = restore;
        self
    }

    /// Reconstructs a whole document into `world`.
    pub fn reconstruct(&mut self, world: &mut World, document: SceneDocument) -> LoadReport {
        let remap = if self.restore_identity {
            EntityIdRemapper::restoring_identity(EntityIdRemapper::slot_limit(world, document.len()))
        } else {
            EntityIdRemapper::new()
        };
        self.run(world, document, remap)
    }

    /// Reconstructs a clipboard payload or prefab. Identities are never
    /// restored: pasted entities always get fresh handles, and references
    /// only resolve among the pasted set.
    pub fn reconstruct_scoped(&mut self, world: &mut World, document: SceneDocument) -> LoadReport {
        self.run(world, document, EntityIdRemapper::new())
    }

    /// Spawns the contents of a prefab asset as a plain entity.
    pub fn load_entity(&mut self, world: &mut World, asset: AssetId) -> Result<Entity, SceneError> {
        let template = self.prefabs.get(asset, self.registry, self.assets)?;
        self.spawn_single(world, EntityRecord::Full(template.bag()))
    }

    /// Spawns an instance of a prefab asset, tagged with [`PrefabInstance`]
    /// so it saves as a diff.
    pub fn create_prefab(&mut self, world: &mut World, asset: AssetId) -> Result<Entity, SceneError> {
        let template = self.prefabs.get(asset, self.registry, self.assets)?;
        self.spawn_single(
            world,
            EntityRecord::PrefabInstance(DiffRecord {
                prefab_path: template.path.clone(),
                diff: Value::Array(Vec::new()),
                transform: None,
            }),
        )
    }

    fn spawn_single(&mut self, world: &mut World, record: EntityRecord) -> Result<Entity, SceneError> {
        let stored = StoredEntityId(0);
        let mut document = SceneDocument::new(SceneFormat::Json);
        document.entities.insert(stored, record);
        let report = self.reconstruct_scoped(world, document);
        report
            .entity(stored)
            .ok_or_else(|| SchemaError::MissingTransform { stored }.into())
    }

    fn run(&mut self, world: &mut World, document: SceneDocument, mut remap: EntityIdRemapper) -> LoadReport {
        self.registry.register_storages(world);
        let format = document.format;
        let mut report = LoadReport::new(format);

        let Some(transform) = self
            .registry
            .by_name(Transform::NAME)
            .and_then(|d| d.native_callbacks())
            .copied()
        else {
            log::error!("{format}: registry has no native Transform, nothing can be loaded");
            return report;
        };

        let mut pending = self.create_entities(world, document, &mut remap, transform, &mut report);
        self.resolve_instances(world, &mut pending, &mut report);
        self.apply_components(world, &mut pending, &remap, &mut report);

        report.entities = pending.iter().map(|p| (p.stored, p.entity)).collect();
        report
    }

    // -----------------------------------------------------------------------
    // Phase 1: entities and transforms
    // -----------------------------------------------------------------------

    fn create_entities(
        &mut self,
        world: &mut World,
        document: SceneDocument,
        remap: &mut EntityIdRemapper,
        transform: NativeCallbacks,
        report: &mut LoadReport,
    ) -> Vec<Pending> {
        let format = document.format;
        let mut pending = Vec::with_capacity(document.len());

        for (stored, record) in document.entities {
            let (mut bag, transform_value, instance) = match record {
                EntityRecord::Full(mut bag) => {
                    let value = bag.remove(Transform::NAME);
                    (bag, value, None)
                }
                EntityRecord::PrefabInstance(record) => {
                    match self.prefabs.get_by_path(&record.prefab_path, self.registry, self.assets) {
                        Ok(template) => {
                            let value = record
                                .transform
                                .or_else(|| template.transform().cloned())
                                .map(ComponentPayload::Json);
                            let instance = Instance {
                                template,
                                diff: record.diff,
                            };
                            (ComponentBag::new(), value, Some(instance))
                        }
                        Err(err) => {
                            log::error!(
                                "{format}: entity {stored}: prefab '{}' unavailable, keeping only its Transform: {err}",
                                record.prefab_path
                            );
                            report.missing_prefabs.push((stored, record.prefab_path));
                            (ComponentBag::new(), record.transform.map(ComponentPayload::Json), None)
                        }
                    }
                }
            };

            let Some(value) = transform_value else {
                log::warn!("{format}: {}", SchemaError::MissingTransform { stored });
                report.dropped.push(stored);
                continue;
            };
            let mut ctx = LoadContext::validating(self.assets, format);
            ctx.set_current(stored, Transform::NAME);
            let component = match decode_payload(&transform, value, &mut ctx) {
                Ok(component) => component,
                Err(err) => {
                    log::warn!("{format}: dropping entity {stored}, its Transform does not decode: {err}");
                    report.dropped.push(stored);
                    continue;
                }
            };

            let entity = remap.declare(world, stored);
            if let Err(err) = component.insert_into(world, entity) {
                log::error!("{format}: dropping entity {stored}: {err}");
                remap.forget(stored);
                world.despawn(entity);
                report.dropped.push(stored);
                continue;
            }
            // Stray Transform in a diff-resolved bag must not override phase 1
            bag.remove(Transform::NAME);
            pending.push(Pending {
                stored,
                entity,
                bag,
                instance,
            });
        }

        log::debug!(
            "{format}: created {} entities, dropped {}",
            pending.len(),
            report.dropped.len()
        );
        pending
    }

    // -----------------------------------------------------------------------
    // Phase 2: prefab diffs
    // -----------------------------------------------------------------------

    fn resolve_instances(&self, world: &mut World, pending: &mut [Pending], report: &mut LoadReport) {
        let format = report.format;
        for entry in pending.iter_mut() {
            let Some(instance) = entry.instance.take() else {
                continue;
            };
            let stored = entry.stored;

            match apply_diff(&instance.template, instance.diff) {
                Ok(mut components) => {
                    components.remove(Transform::NAME);
                    entry.bag = ComponentBag::from_json_map(components);
                }
                Err(conflict) => {
                    log::error!(
                        "{format}: malformed prefab instance {stored} of '{}': {conflict}",
                        instance.template.path
                    );
                    report.patch_conflicts.push((stored, conflict));
                }
            }

            let marker = PrefabInstance {
                prefab: instance.template.asset,
            };
            if let Err(err) = world.insert(entry.entity, marker) {
                log::error!("{format}: entity {stored}: {err}");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase 3: ordered component apply
    // -----------------------------------------------------------------------

    fn apply_components(
        &self,
        world: &mut World,
        pending: &mut [Pending],
        remap: &EntityIdRemapper,
        report: &mut LoadReport,
    ) {
        let format = report.format;
        let mut ctx = LoadContext::new(remap, self.assets, format);

        for (descriptor, callbacks) in self.registry.native() {
            if descriptor.name == Transform::NAME {
                continue;
            }
            for entry in pending.iter_mut() {
                let Some(payload) = entry.bag.remove(descriptor.name) else {
                    continue;
                };
                let (stored, entity) = (entry.stored, entry.entity);

                let missing = descriptor.depends_on.iter().copied().find(|dep| {
                    self.registry
                        .by_name(dep)
                        .and_then(|d| d.native_callbacks())
                        .is_some_and(|dep| !(dep.has)(world, entity))
                });
                if let Some(requires) = missing {
                    let err = SchemaError::MissingDependency {
                        component: descriptor.name,
                        requires,
                    };
                    log::warn!("{format}: entity {stored}: {err}");
                    report.component_errors += 1;
                    continue;
                }

                ctx.set_current(stored, descriptor.name);
                let result = decode_payload(callbacks, payload, &mut ctx)
                    .and_then(|component| Ok(component.insert_into(world, entity)?));
                if let Err(err) = result {
                    log::warn!(
                        "{format}: entity {stored}: skipping component '{}': {err}",
                        descriptor.name
                    );
                    report.component_errors += 1;
                }
            }
        }

        // Whatever is left is not native: hand it to the managed runtime in
        // registry order, unknown names last.
        let mut leftover: Vec<String> = pending
            .iter()
            .flat_map(|entry| entry.bag.names().map(str::to_owned))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        leftover.sort_by_key(|name| self.registry.order_of(name).unwrap_or(usize::MAX));

        for name in &leftover {
            for entry in pending.iter_mut() {
                let Some(payload) = entry.bag.remove(name) else {
                    continue;
                };
                let stored = entry.stored;
                let ComponentPayload::Json(value) = payload else {
                    log::error!("{format}: entity {stored}: '{name}' is not a registered native component");
                    report.component_errors += 1;
                    continue;
                };
                ctx.set_current(stored, name.clone());
                if let Err(err) = self.managed.deserialize(world, entry.entity, name, &value, &mut ctx) {
                    log::warn!("{format}: entity {stored}: managed component '{name}' failed: {err}");
                    report.component_errors += 1;
                }
            }
        }

        report.unresolved_references = ctx.unresolved();
    }
}

/// Decodes one payload with the component's callbacks.
fn decode_payload(
    callbacks: &NativeCallbacks,
    payload: ComponentPayload,
    ctx: &mut LoadContext,
) -> Result<Box<dyn ErasedComponent>, SceneError> {
    match payload {
        ComponentPayload::Json(value) => (callbacks.from_json)(&value, ctx),
        ComponentPayload::Binary { data, version } => {
            let mut input = BinaryReader::new(&data);
            (callbacks.read_binary)(&mut input, version, ctx)
        }
        ComponentPayload::Native(component) => Ok(component),
    }
}

/// Applies an instance diff to its template, yielding the component map.
fn apply_diff(
    template: &PrefabDocument,
    diff: Value,
) -> Result<serde_json::Map<String, Value>, PatchConflictError> {
    let patch = Patch::from_value(diff)?;
    match patch::patched(&template.to_value(), &patch)? {
        Value::Object(components) => Ok(components),
        other => Err(PatchConflictError {
            index: patch.len().saturating_sub(1),
            op: "result",
            path: String::new(),
            reason: format!("patched template is {}, not an object", patch::kind(&other)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Child, Light};
    use crate::managed::NoManagedComponents;
    use serde_json::json;
    use worlds_ecs::components::Name;
    use worlds_vfs::{AssetDb, Vfs};

    fn document(value: Value) -> SceneDocument {
        crate::json::parse_document(value, SceneFormat::Json).unwrap()
    }

    #[test]
    fn references_resolve_regardless_of_order() {
        let registry = ComponentRegistry::with_builtin();
        let assets = AssetDb::new(Vfs::new());
        let mut prefabs = PrefabCache::new();
        let mut world = World::new();

        let doc = document(json!({
            "1": {"Transform": {}, "Child": {"parent": 9}},
            "9": {"Transform": {}, "Name": {"name": "root"}}
        }));
        let report = EntityReconstructor::new(&registry, &assets, &NoManagedComponents, &mut prefabs)
            .reconstruct(&mut world, doc);

        assert!(report.is_clean(), "{report:?}");
        let child = report.entity(StoredEntityId(1)).unwrap();
        let root = report.entity(StoredEntityId(9)).unwrap();
        assert_eq!(world.get::<Child>(child).unwrap().parent, root);
        assert_eq!(world.get::<Name>(root).map(Name::as_str), Some("root"));
    }

    #[test]
    fn entity_without_transform_is_never_created() {
        let registry = ComponentRegistry::with_builtin();
        let assets = AssetDb::new(Vfs::new());
        let mut prefabs = PrefabCache::new();
        let mut world = World::new();

        let doc = document(json!({
            "1": {"Light": {}},
            "2": {"Transform": {}, "Child": {"parent": 1}}
        }));
        let report = EntityReconstructor::new(&registry, &assets, &NoManagedComponents, &mut prefabs)
            .reconstruct(&mut world, doc);

        assert_eq!(report.dropped, vec![StoredEntityId(1)]);
        assert_eq!(world.entity_count(), 1);
        let child = report.entity(StoredEntityId(2)).unwrap();
        assert_eq!(world.get::<Child>(child).unwrap().parent, Entity::INVALID);
        assert_eq!(report.unresolved_references, 1);
        assert!(world.entities_with::<Light>().next().is_none());
    }

    #[test]
    fn bad_component_only_skips_itself() {
        let registry = ComponentRegistry::with_builtin();
        let assets = AssetDb::new(Vfs::new());
        let mut prefabs = PrefabCache::new();
        let mut world = World::new();

        let doc = document(json!({"4": {"Transform": {}, "Light": {"type": 42}, "Name": {"name": "x"}}}));
        let report = EntityReconstructor::new(&registry, &assets, &NoManagedComponents, &mut prefabs)
            .reconstruct(&mut world, doc);

        let e = report.entity(StoredEntityId(4)).unwrap();
        assert_eq!(report.component_errors, 1);
        assert!(!world.has::<Light>(e));
        assert!(world.has::<Name>(e));
    }

    #[test]
    fn restore_identity_reuses_stored_index() {
        let registry = ComponentRegistry::with_builtin();
        let assets = AssetDb::new(Vfs::new());
        let mut prefabs = PrefabCache::new();
        let mut world = World::new();
        for _ in 0..16 {
            world.spawn();
        }
        let freed = world.entity_at_index(12).unwrap();
        world.despawn(freed);

        let doc = document(json!({"12": {"Transform": {}}, "900": {"Transform": {}}}));
        let report = EntityReconstructor::new(&registry, &assets, &NoManagedComponents, &mut prefabs)
            .restore_identity(true)
            .reconstruct(&mut world, doc);
        let restored = report.entity(StoredEntityId(12)).unwrap();
        assert_eq!(restored.index(), 12);
        assert_ne!(restored, freed);
        // Far past the slots in use: a fresh entity instead
        assert_eq!(report.entity(StoredEntityId(900)).unwrap().index(), 16);
    }

    #[test]
    fn missing_prefab_keeps_transform() {
        let registry = ComponentRegistry::with_builtin();
        let assets = AssetDb::new(Vfs::new());
        let mut prefabs = PrefabCache::new();
        let mut world = World::new();

        let doc = document(json!({
            "3": {"prefabPath": "Prefabs/gone.json", "diff": [], "Transform": {"position": [1, 2, 3]}},
            "4": {"prefabPath": "Prefabs/gone.json", "diff": []}
        }));
        let report = EntityReconstructor::new(&registry, &assets, &NoManagedComponents, &mut prefabs)
            .reconstruct(&mut world, doc);

        assert_eq!(report.missing_prefabs.len(), 2);
        assert_eq!(report.dropped, vec![StoredEntityId(4)]);
        let e = report.entity(StoredEntityId(3)).unwrap();
        assert_eq!(world.get::<Transform>(e).unwrap().position, glam::Vec3::new(1.0, 2.0, 3.0));
        assert!(!world.has::<PrefabInstance>(e));
    }
}
