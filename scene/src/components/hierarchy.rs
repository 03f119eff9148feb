use serde::{Deserialize, Serialize};
use serde_json::Value;
use worlds_ecs::components::Transform;
use worlds_ecs::{Component, Entity};

use super::fields::{encode, parse, read_transform, write_transform};
use crate::binary::io::{BinaryReader, BinaryWriter};
use crate::context::{LoadContext, SaveContext};
use crate::error::SceneError;
use crate::registry::SceneComponent;

/// Attaches an entity to `parent` at a fixed local offset.
///
/// The entity's own `Transform` stays authoritative in world space; the
/// offset is what a hierarchy system re-applies when the parent moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Child {
    pub parent: Entity,
    pub offset: Transform,
}

impl Component for Child {
    const NAME: &'static str = "Child";
}

#[derive(Serialize, Deserialize)]
struct ChildJson {
    #[serde(default)]
    parent: Value,
    #[serde(default)]
    offset: Transform,
}

impl SceneComponent for Child {
    const SERIALIZED_ID: u32 = 8;
    const SORT_KEY: i32 = 1;
    const SINCE_VERSION: u8 = 6;
    const DEPENDS_ON: &'static [&'static str] = &[Transform::NAME];

    fn to_json(&self, ctx: &mut SaveContext) -> Result<Value, SceneError> {
        ctx.set_component(Self::NAME);
        encode(
            Self::NAME,
            &ChildJson {
                parent: ctx.entity_to_json(self.parent),
                offset: self.offset,
            },
        )
    }

    fn from_json(value: &Value, ctx: &mut LoadContext) -> Result<Self, SceneError> {
        let json: ChildJson = parse(Self::NAME, value)?;
        Ok(Self {
            parent: ctx.entity_from_json(&json.parent)?,
            offset: json.offset,
        })
    }

    fn write_binary(&self, out: &mut BinaryWriter, ctx: &mut SaveContext) {
        ctx.set_component(Self::NAME);
        out.u32(ctx.entity_to_raw(self.parent));
        write_transform(out, &self.offset);
    }

    fn read_binary(
        input: &mut BinaryReader,
        _version: u8,
        ctx: &mut LoadContext,
    ) -> Result<Self, SceneError> {
        let parent = ctx.entity_from_raw(input.u32("Child parent")?);
        Ok(Self {
            parent,
            offset: read_transform(input, "Child offset")?,
        })
    }
}
