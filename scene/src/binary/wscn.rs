//! WSCN: numeric component id + payload per component.
//!
//! ```text
//! "WSCN" u8 version u32 entity_count
//!   entity_count x ( u32 stored_id  u8 component_count
//!                    component_count x ( u32 component_id  payload ) )
//! ```
//!
//! Payload layouts belong to each component and depend on the version.

use worlds_ecs::{Entity, World};
use worlds_vfs::AssetStore;

use super::io::{BinaryReader, BinaryWriter};
use super::strategy::{DecodeStrategy, WSCN_MAX_VERSION};
use crate::context::{LoadContext, SaveContext};
use crate::document::{ComponentBag, ComponentPayload, EntityRecord, SceneDocument};
use crate::error::{SceneError, SchemaError, TruncatedStreamError};
use crate::format::{BinaryFamily, SceneFormat, WSCN_MAGIC};
use crate::registry::ComponentRegistry;
use crate::remap::StoredEntityId;

/// Smallest possible entity record: stored id plus component count.
const MIN_ENTITY_SIZE: usize = 5;

pub struct WscnStrategy {
    version: u8,
}

impl WscnStrategy {
    pub const fn new(version: u8) -> Self {
        Self { version }
    }
}

impl DecodeStrategy for WscnStrategy {
    fn family(&self) -> BinaryFamily {
        BinaryFamily::Wscn
    }

    fn version(&self) -> u8 {
        self.version
    }

    /// Validates every payload and keeps its raw bytes. Payloads are decoded
    /// again during reconstruction, once entity references can resolve.
    fn decode(
        &self,
        input: &mut BinaryReader,
        registry: &ComponentRegistry,
        assets: &dyn AssetStore,
    ) -> Result<SceneDocument, SceneError> {
        let format = SceneFormat::Binary(BinaryFamily::Wscn);
        let version = self.version;
        let count = input.u32("entity count")? as usize;
        if count.saturating_mul(MIN_ENTITY_SIZE) > input.remaining() {
            return Err(TruncatedStreamError {
                offset: input.position(),
                reading: "entity table",
            }
            .into());
        }

        let mut document = SceneDocument::new(format);
        let mut validate = LoadContext::validating(assets, format);

        for _ in 0..count {
            let stored = StoredEntityId(input.u32("stored entity id")?);
            let components = input.u8("component count")?;
            let mut bag = ComponentBag::new();

            for _ in 0..components {
                let id = input.u32("component id")?;
                let unknown = || SchemaError::UnknownComponentId {
                    id,
                    stored,
                    family: BinaryFamily::Wscn,
                    version,
                };
                let descriptor = registry.by_serialized_id(id).ok_or_else(unknown)?;
                let callbacks = descriptor.native_callbacks().ok_or_else(unknown)?;
                if descriptor.since_version > version {
                    return Err(SchemaError::ComponentTooNew {
                        component: descriptor.name,
                        stored,
                        since: descriptor.since_version,
                        version,
                    }
                    .into());
                }

                validate.set_current(stored, descriptor.name);
                let start = input.position();
                (callbacks.read_binary)(input, version, &mut validate)?;
                bag.insert(
                    descriptor.name,
                    ComponentPayload::Binary {
                        data: input.span_from(start).to_vec(),
                        version,
                    },
                );
            }

            if document.entities.insert(stored, EntityRecord::Full(bag)).is_some() {
                return Err(SchemaError::DuplicateEntity { stored }.into());
            }
        }

        if input.remaining() > 0 {
            log::warn!(
                "WSCN v{version}: {} trailing bytes after {count} entities",
                input.remaining()
            );
        }
        Ok(document)
    }
}

/// Writes `entities` at the current version.
///
/// Only native components present on each entity are written, in registry
/// order.
pub fn encode(
    world: &World,
    registry: &ComponentRegistry,
    entities: &[(Entity, StoredEntityId)],
    ctx: &mut SaveContext,
) -> Vec<u8> {
    let mut out = BinaryWriter::new();
    out.bytes(WSCN_MAGIC);
    out.u8(WSCN_MAX_VERSION);
    out.u32(entities.len() as u32);

    for &(entity, stored) in entities {
        let mut present: Vec<_> = registry
            .native()
            .filter(|(_, callbacks)| (callbacks.has)(world, entity))
            .filter_map(|(descriptor, callbacks)| {
                descriptor.serialized_id.map(|id| (descriptor.name, id, callbacks))
            })
            .collect();
        if present.len() > u8::MAX as usize {
            log::error!(
                "WSCN: entity {stored} has {} components, only {} fit",
                present.len(),
                u8::MAX
            );
            present.truncate(u8::MAX as usize);
        }

        out.u32(stored.0);
        out.u8(present.len() as u8);
        for (name, id, callbacks) in present {
            ctx.set_component(name);
            out.u32(id);
            (callbacks.write_binary)(world, entity, &mut out, ctx);
        }
    }
    out.into_bytes()
}
