//! Persistence for the ECS crate's own `Transform` and `Name`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use worlds_ecs::components::{Name, Transform};
use worlds_ecs::Component;

use super::fields::{encode, parse, read_transform, write_transform};
use crate::binary::io::{BinaryReader, BinaryWriter};
use crate::context::{LoadContext, SaveContext};
use crate::error::SceneError;
use crate::registry::SceneComponent;

impl SceneComponent for Transform {
    const SERIALIZED_ID: u32 = 0;
    const SORT_KEY: i32 = -1;

    fn to_json(&self, _ctx: &mut SaveContext) -> Result<Value, SceneError> {
        encode(Self::NAME, self)
    }

    fn from_json(value: &Value, _ctx: &mut LoadContext) -> Result<Self, SceneError> {
        parse(Self::NAME, value)
    }

    fn write_binary(&self, out: &mut BinaryWriter, _ctx: &mut SaveContext) {
        write_transform(out, self);
    }

    fn read_binary(
        input: &mut BinaryReader,
        _version: u8,
        _ctx: &mut LoadContext,
    ) -> Result<Self, SceneError> {
        read_transform(input, "Transform")
    }
}

#[derive(Serialize, Deserialize)]
struct NameJson {
    name: String,
}

impl SceneComponent for Name {
    const SERIALIZED_ID: u32 = 1;
    const SORT_KEY: i32 = -2;

    fn to_json(&self, _ctx: &mut SaveContext) -> Result<Value, SceneError> {
        encode(Self::NAME, &NameJson { name: self.0.clone() })
    }

    fn from_json(value: &Value, _ctx: &mut LoadContext) -> Result<Self, SceneError> {
        let json: NameJson = parse(Self::NAME, value)?;
        Ok(Name(json.name))
    }

    fn write_binary(&self, out: &mut BinaryWriter, _ctx: &mut SaveContext) {
        out.string_u32(&self.0);
    }

    /// Versions up to 2 used a 16-bit length prefix.
    fn read_binary(
        input: &mut BinaryReader,
        version: u8,
        _ctx: &mut LoadContext,
    ) -> Result<Self, SceneError> {
        let name = if version <= 2 {
            input.string_u16("Name")?
        } else {
            input.string_u32("Name")?
        };
        Ok(Name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::format::SceneFormat;
    use crate::remap::EntityIdRemapper;
    use serde_json::json;
    use worlds_vfs::{AssetDb, Vfs};

    #[test]
    fn bad_values_name_the_component() {
        let assets = AssetDb::new(Vfs::new());
        let remap = EntityIdRemapper::new();
        let mut ctx = LoadContext::new(&remap, &assets, SceneFormat::Json);

        for (value, expected) in [
            (Name::from_json(&json!({"name": 5}), &mut ctx).map(|_| ()), "Name"),
            (Transform::from_json(&json!({"position": "up"}), &mut ctx).map(|_| ()), "Transform"),
        ] {
            match value {
                Err(SceneError::Schema(SchemaError::InvalidValue { component, .. })) => {
                    assert_eq!(component, expected)
                }
                other => panic!("expected a schema error, got {other:?}"),
            }
        }
    }

    #[test]
    fn name_survives_json() {
        let assets = AssetDb::new(Vfs::new());
        let ids = std::collections::HashMap::new();
        let mut save = SaveContext::new(&ids, &assets);
        let value = Name::new("lamp").to_json(&mut save).unwrap();
        assert_eq!(value, json!({"name": "lamp"}));

        let remap = EntityIdRemapper::new();
        let mut load = LoadContext::new(&remap, &assets, SceneFormat::Json);
        assert_eq!(Name::from_json(&value, &mut load).unwrap(), Name::new("lamp"));
    }
}
