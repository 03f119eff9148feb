//! Per-call contexts handed to component codecs.
//!
//! [`LoadContext`] turns stored entity ids and asset references back into
//! live handles. [`SaveContext`] does the reverse. Both borrow the state of
//! a single load or save and are never shared between calls.

use std::borrow::Cow;
use std::collections::HashMap;

use serde_json::Value;
use worlds_ecs::Entity;
use worlds_vfs::{AssetId, AssetStore};

use crate::error::{SceneError, SchemaError};
use crate::format::SceneFormat;
use crate::remap::{EntityIdRemapper, StoredEntityId};

/// Raw value written for "no entity" and "no asset" in binary payloads.
pub const NULL_ID: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// LoadContext
// ---------------------------------------------------------------------------

/// Context for decoding component values.
pub struct LoadContext<'a> {
    /// `None` while only validating a stream: references are not resolved.
    remap: Option<&'a EntityIdRemapper>,
    assets: &'a dyn AssetStore,
    format: SceneFormat,
    stored: Option<StoredEntityId>,
    component: Cow<'static, str>,
    unresolved: usize,
}

impl<'a> LoadContext<'a> {
    pub fn new(
        remap: &'a EntityIdRemapper,
        assets: &'a dyn AssetStore,
        format: SceneFormat,
    ) -> Self {
        Self {
            remap: Some(remap),
            assets,
            format,
            stored: None,
            component: Cow::Borrowed(""),
            unresolved: 0,
        }
    }

    /// A context for structural validation before any entity exists.
    /// Every entity reference decodes to [`Entity::INVALID`] without a
    /// diagnostic.
    pub fn validating(assets: &'a dyn AssetStore, format: SceneFormat) -> Self {
        Self {
            remap: None,
            assets,
            format,
            stored: None,
            component: Cow::Borrowed(""),
            unresolved: 0,
        }
    }

    pub fn format(&self) -> SceneFormat {
        self.format
    }

    /// Records which entity and component are being decoded, for diagnostics.
    pub fn set_current(&mut self, stored: StoredEntityId, component: impl Into<Cow<'static, str>>) {
        self.stored = Some(stored);
        self.component = component.into();
    }

    /// Name of the component being decoded.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Number of references that pointed at undeclared entities.
    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    pub fn assets(&self) -> &'a dyn AssetStore {
        self.assets
    }

    /// Resolves an entity reference. A miss yields [`Entity::INVALID`].
    pub fn resolve_entity(&mut self, stored: StoredEntityId) -> Entity {
        let Some(remap) = self.remap else {
            return Entity::INVALID;
        };
        match remap.resolve(stored) {
            Some(entity) => entity,
            None => {
                self.unresolved += 1;
                match self.stored {
                    Some(owner) => log::warn!(
                        "{}: '{}' on entity {owner} references undeclared entity {stored}",
                        self.format,
                        self.component
                    ),
                    None => log::warn!(
                        "{}: '{}' references undeclared entity {stored}",
                        self.format,
                        self.component
                    ),
                }
                Entity::INVALID
            }
        }
    }

    /// Binary entity reference. [`NULL_ID`] means "none".
    pub fn entity_from_raw(&mut self, raw: u32) -> Entity {
        if raw == NULL_ID {
            Entity::INVALID
        } else {
            self.resolve_entity(StoredEntityId(raw))
        }
    }

    /// JSON entity reference: a stored id or `null`.
    pub fn entity_from_json(&mut self, value: &Value) -> Result<Entity, SceneError> {
        match value {
            Value::Null => Ok(Entity::INVALID),
            Value::Number(n) => match n.as_u64().and_then(|v| u32::try_from(v).ok()) {
                Some(raw) => Ok(self.entity_from_raw(raw)),
                None => Err(SchemaError::invalid(
                    self.component(),
                    format!("entity reference {n} is not a stored id"),
                )
                .into()),
            },
            other => Err(SchemaError::invalid(
                self.component(),
                format!("expected entity id or null, found {other}"),
            )
            .into()),
        }
    }

    pub fn asset_from_path(&self, path: &str) -> Result<AssetId, SceneError> {
        Ok(self.assets.path_to_id(path)?)
    }

    /// JSON asset reference: a path, a numeric id, or `null`.
    pub fn asset_from_json(&self, value: &Value) -> Result<AssetId, SceneError> {
        match value {
            Value::Null => Ok(AssetId::INVALID),
            Value::String(path) if path.is_empty() => Ok(AssetId::INVALID),
            Value::String(path) => self.asset_from_path(path),
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(AssetId)
                .ok_or_else(|| {
                    SchemaError::invalid(self.component(), format!("bad asset id {n}")).into()
                }),
            other => Err(SchemaError::invalid(
                self.component(),
                format!("expected asset path, found {other}"),
            )
            .into()),
        }
    }
}

// ---------------------------------------------------------------------------
// SaveContext
// ---------------------------------------------------------------------------

/// Context for encoding component values.
pub struct SaveContext<'a> {
    ids: &'a HashMap<Entity, StoredEntityId>,
    assets: &'a dyn AssetStore,
    component: &'static str,
    dangling: usize,
}

impl<'a> SaveContext<'a> {
    /// `ids` holds the stored id of every entity being written.
    pub fn new(ids: &'a HashMap<Entity, StoredEntityId>, assets: &'a dyn AssetStore) -> Self {
        Self {
            ids,
            assets,
            component: "",
            dangling: 0,
        }
    }

    pub fn set_component(&mut self, component: &'static str) {
        self.component = component;
    }

    /// References to entities outside the saved set.
    pub fn dangling(&self) -> usize {
        self.dangling
    }

    pub fn stored_id(&mut self, entity: Entity) -> Option<StoredEntityId> {
        if !entity.is_valid() {
            return None;
        }
        let stored = self.ids.get(&entity).copied();
        if stored.is_none() {
            self.dangling += 1;
            log::warn!(
                "save: '{}' references {entity}, which is not being saved; writing null",
                self.component
            );
        }
        stored
    }

    pub fn entity_to_json(&mut self, entity: Entity) -> Value {
        match self.stored_id(entity) {
            Some(stored) => Value::from(stored.0),
            None => Value::Null,
        }
    }

    pub fn entity_to_raw(&mut self, entity: Entity) -> u32 {
        self.stored_id(entity).map_or(NULL_ID, |stored| stored.0)
    }

    /// Asset reference as a path, `null` when empty or unknown.
    pub fn asset_to_json(&self, asset: AssetId) -> Value {
        if !asset.is_valid() {
            return Value::Null;
        }
        match self.assets.id_to_path(asset) {
            Some(path) => Value::String(path),
            None => {
                log::warn!("save: '{}' references unknown {asset}", self.component);
                Value::Null
            }
        }
    }
}
