//! ESCN: the frozen presence-bitfield layout.
//!
//! ```text
//! "ESCN" u8 version u32 entity_count
//!   entity_count x ( u32 stored_id  u8 bits  payloads in bit order )
//! ```
//!
//! | Bit | Component | Versions |
//! |---|---|---|
//! | 0 | Transform | 1- |
//! | 1 | WorldObject | 1- (32 material slots from 2) |
//! | 2 | Light | 1- |
//! | 3 | PhysicsActor | 1- (shape poses from 3) |
//! | 4 | DynamicPhysicsActor | 1- (mass from 2) |
//! | 5 | Name | 3- |
//! | 6 | WorldCubemap | 4 |
//!
//! Nothing is ever added to this table; new components only go to WSCN.

use worlds_ecs::Component;
use worlds_vfs::{AssetId, AssetStore};

use super::io::BinaryReader;
use super::strategy::DecodeStrategy;
use crate::components::{
    DynamicPhysicsActor, Light, Name, PhysicsActor, PhysicsShape, Pose, Transform, WorldCubemap,
    WorldObject, DEFAULT_LAYER, MAX_MATERIALS,
};
use crate::document::{erase, ComponentBag, ComponentPayload, EntityRecord, SceneDocument};
use crate::error::{SceneError, SchemaError};
use crate::format::{BinaryFamily, SceneFormat};
use crate::registry::ComponentRegistry;
use crate::remap::StoredEntityId;

const TRANSFORM: u8 = 1 << 0;
const WORLD_OBJECT: u8 = 1 << 1;
const LIGHT: u8 = 1 << 2;
const PHYSICS_ACTOR: u8 = 1 << 3;
const DYNAMIC_PHYSICS_ACTOR: u8 = 1 << 4;
const NAME: u8 = 1 << 5;
const WORLD_CUBEMAP: u8 = 1 << 6;

pub struct EscnStrategy {
    version: u8,
}

impl EscnStrategy {
    pub const fn new(version: u8) -> Self {
        Self { version }
    }

    fn allowed_bits(&self) -> u8 {
        match self.version {
            1 | 2 => 0x1F,
            3 => 0x3F,
            _ => 0x7F,
        }
    }

    fn read_world_object(&self, input: &mut BinaryReader) -> Result<WorldObject, SceneError> {
        let materials = if self.version == 1 {
            vec![AssetId(input.u32("WorldObject material")?)]
        } else {
            let mut slots = Vec::with_capacity(MAX_MATERIALS);
            for _ in 0..MAX_MATERIALS {
                let present = input.bool("WorldObject material present")?;
                slots.push(if present {
                    AssetId(input.u32("WorldObject material")?)
                } else {
                    AssetId::INVALID
                });
            }
            while slots.last() == Some(&AssetId::INVALID) {
                slots.pop();
            }
            slots
        };
        Ok(WorldObject {
            mesh: AssetId(input.u32("WorldObject mesh")?),
            materials,
            tex_scale_offset: input.vec4("WorldObject texScaleOffset")?,
            static_flags: 0,
        })
    }

    fn read_shapes(&self, input: &mut BinaryReader) -> Result<Vec<PhysicsShape>, SceneError> {
        let count = input.u16("shape count")?;
        let mut shapes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let code = input.i32("shape type")?;
            let pose = if self.version >= 3 {
                Pose::read(input, "shape pose")?
            } else {
                Pose::default()
            };
            let kind = PhysicsShape::read_kind(input, code, false)?;
            shapes.push(PhysicsShape { kind, pose });
        }
        Ok(shapes)
    }

    fn read_entity(&self, input: &mut BinaryReader, bits: u8) -> Result<ComponentBag, SceneError> {
        let mut bag = ComponentBag::new();
        if bits & TRANSFORM != 0 {
            let transform = Transform {
                position: input.vec3("Transform")?,
                rotation: input.quat("Transform")?,
                scale: input.vec3("Transform")?,
            };
            bag.insert(Transform::NAME, ComponentPayload::Native(erase(transform)));
        }
        if bits & WORLD_OBJECT != 0 {
            let object = self.read_world_object(input)?;
            bag.insert(WorldObject::NAME, ComponentPayload::Native(erase(object)));
        }
        if bits & LIGHT != 0 {
            let light = Light::read_base(input)?;
            bag.insert(Light::NAME, ComponentPayload::Native(erase(light)));
        }
        if bits & PHYSICS_ACTOR != 0 {
            let actor = PhysicsActor {
                shapes: self.read_shapes(input)?,
                layer: DEFAULT_LAYER,
            };
            bag.insert(PhysicsActor::NAME, ComponentPayload::Native(erase(actor)));
        }
        if bits & DYNAMIC_PHYSICS_ACTOR != 0 {
            let mut actor = DynamicPhysicsActor::default();
            if self.version >= 2 {
                actor.mass = input.f32("DynamicPhysicsActor mass")?;
            }
            actor.shapes = self.read_shapes(input)?;
            bag.insert(DynamicPhysicsActor::NAME, ComponentPayload::Native(erase(actor)));
        }
        if bits & NAME != 0 {
            let name = Name(input.string_i32("Name")?);
            bag.insert(Name::NAME, ComponentPayload::Native(erase(name)));
        }
        if bits & WORLD_CUBEMAP != 0 {
            let cubemap = WorldCubemap {
                cubemap: AssetId(input.u32("WorldCubemap cubemap")?),
                extent: input.vec3("WorldCubemap extent")?,
                ..WorldCubemap::default()
            };
            bag.insert(WorldCubemap::NAME, ComponentPayload::Native(erase(cubemap)));
        }
        Ok(bag)
    }
}

impl DecodeStrategy for EscnStrategy {
    fn family(&self) -> BinaryFamily {
        BinaryFamily::Escn
    }

    fn version(&self) -> u8 {
        self.version
    }

    fn decode(
        &self,
        input: &mut BinaryReader,
        _registry: &ComponentRegistry,
        _assets: &dyn AssetStore,
    ) -> Result<SceneDocument, SceneError> {
        let count = input.u32("entity count")?;
        let mut document = SceneDocument::new(SceneFormat::Binary(BinaryFamily::Escn));

        for _ in 0..count {
            let stored = StoredEntityId(input.u32("stored entity id")?);
            let bits = input.u8("component bits")?;
            let undefined = bits & !self.allowed_bits();
            if undefined != 0 {
                return Err(SchemaError::UndefinedComponentBits {
                    bits: undefined,
                    stored,
                    version: self.version,
                }
                .into());
            }
            let bag = self.read_entity(input, bits)?;
            if document.entities.insert(stored, EntityRecord::Full(bag)).is_some() {
                return Err(SchemaError::DuplicateEntity { stored }.into());
            }
        }
        Ok(document)
    }
}
