//! Persisted data of renderable components.
//!
//! Only what goes into scene files lives here; GPU-side state is rebuilt by
//! the renderer from these values.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use worlds_ecs::Component;
use worlds_vfs::AssetId;

use super::fields::{encode, parse};
use crate::binary::io::{BinaryReader, BinaryWriter};
use crate::context::{LoadContext, SaveContext};
use crate::error::{SceneError, SchemaError};
use crate::registry::SceneComponent;

/// Material slots per mesh.
pub const MAX_MATERIALS: usize = 32;

// ---------------------------------------------------------------------------
// WorldObject
// ---------------------------------------------------------------------------

/// A static mesh with per-submesh materials.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldObject {
    pub mesh: AssetId,
    /// One entry per used slot; empty slots hold [`AssetId::INVALID`].
    pub materials: Vec<AssetId>,
    pub tex_scale_offset: Vec4,
    pub static_flags: u8,
}

impl Component for WorldObject {
    const NAME: &'static str = "WorldObject";
}

impl Default for WorldObject {
    fn default() -> Self {
        Self {
            mesh: AssetId::INVALID,
            materials: Vec::new(),
            tex_scale_offset: default_tex_scale_offset(),
            static_flags: 0,
        }
    }
}

fn default_tex_scale_offset() -> Vec4 {
    Vec4::new(1.0, 1.0, 0.0, 0.0)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorldObjectJson {
    #[serde(default)]
    mesh: Value,
    #[serde(default)]
    materials: Vec<Value>,
    #[serde(default = "default_tex_scale_offset")]
    tex_scale_offset: Vec4,
    #[serde(default)]
    static_flags: u8,
}

impl SceneComponent for WorldObject {
    const SERIALIZED_ID: u32 = 2;

    fn to_json(&self, ctx: &mut SaveContext) -> Result<Value, SceneError> {
        encode(
            Self::NAME,
            &WorldObjectJson {
                mesh: ctx.asset_to_json(self.mesh),
                materials: self.materials.iter().map(|m| ctx.asset_to_json(*m)).collect(),
                tex_scale_offset: self.tex_scale_offset,
                static_flags: self.static_flags,
            },
        )
    }

    fn from_json(value: &Value, ctx: &mut LoadContext) -> Result<Self, SceneError> {
        let json: WorldObjectJson = parse(Self::NAME, value)?;
        if json.materials.len() > MAX_MATERIALS {
            return Err(SchemaError::invalid(
                Self::NAME,
                format!("{} materials, at most {MAX_MATERIALS} allowed", json.materials.len()),
            )
            .into());
        }
        Ok(Self {
            mesh: ctx.asset_from_json(&json.mesh)?,
            materials: json
                .materials
                .iter()
                .map(|m| ctx.asset_from_json(m))
                .collect::<Result<_, _>>()?,
            tex_scale_offset: json.tex_scale_offset,
            static_flags: json.static_flags,
        })
    }

    fn write_binary(&self, out: &mut BinaryWriter, _ctx: &mut SaveContext) {
        let count = self.materials.len().min(MAX_MATERIALS);
        out.u32(self.mesh.0);
        out.u8(count as u8);
        for material in &self.materials[..count] {
            out.u32(material.0);
        }
        out.vec4(self.tex_scale_offset);
        out.u8(self.static_flags);
    }

    fn read_binary(
        input: &mut BinaryReader,
        _version: u8,
        _ctx: &mut LoadContext,
    ) -> Result<Self, SceneError> {
        let mesh = AssetId(input.u32("WorldObject mesh")?);
        let count = input.u8("WorldObject material count")? as usize;
        if count > MAX_MATERIALS {
            return Err(SchemaError::invalid(Self::NAME, format!("{count} material slots")).into());
        }
        let mut materials = Vec::with_capacity(count);
        for _ in 0..count {
            materials.push(AssetId(input.u32("WorldObject material")?));
        }
        Ok(Self {
            mesh,
            materials,
            tex_scale_offset: input.vec4("WorldObject texScaleOffset")?,
            static_flags: input.u8("WorldObject staticFlags")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Light
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum LightType {
    #[default]
    Point,
    Spot,
    Directional,
    Sphere,
    Tube,
}

impl TryFrom<i32> for LightType {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LightType::Point),
            1 => Ok(LightType::Spot),
            2 => Ok(LightType::Directional),
            3 => Ok(LightType::Sphere),
            4 => Ok(LightType::Tube),
            other => Err(format!("unknown light type {other}")),
        }
    }
}

impl From<LightType> for i32 {
    fn from(value: LightType) -> Self {
        value as i32
    }
}

fn default_color() -> Vec3 {
    Vec3::ONE
}

fn default_cutoff() -> f32 {
    std::f32::consts::FRAC_PI_4
}

fn default_intensity() -> f32 {
    1.0
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Light {
    #[serde(rename = "type", default)]
    pub light_type: LightType,
    #[serde(default = "default_color")]
    pub color: Vec3,
    #[serde(default = "default_cutoff")]
    pub spot_cutoff: f32,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Component for Light {
    const NAME: &'static str = "Light";
}

impl Default for Light {
    fn default() -> Self {
        Self {
            light_type: LightType::Point,
            color: default_color(),
            spot_cutoff: default_cutoff(),
            intensity: default_intensity(),
            enabled: default_enabled(),
        }
    }
}

impl Light {
    /// Legacy layout shared by ESCN and WSCN up to version 3.
    pub(crate) fn read_base(input: &mut BinaryReader) -> Result<Self, SceneError> {
        let raw_type = input.i32("Light type")?;
        let light_type =
            LightType::try_from(raw_type).map_err(|e| SchemaError::invalid(Self::NAME, e))?;
        Ok(Self {
            light_type,
            color: input.vec3("Light color")?,
            spot_cutoff: input.f32("Light spotCutoff")?,
            ..Self::default()
        })
    }
}

impl SceneComponent for Light {
    const SERIALIZED_ID: u32 = 3;

    fn to_json(&self, _ctx: &mut SaveContext) -> Result<Value, SceneError> {
        encode(Self::NAME, self)
    }

    fn from_json(value: &Value, _ctx: &mut LoadContext) -> Result<Self, SceneError> {
        parse(Self::NAME, value)
    }

    fn write_binary(&self, out: &mut BinaryWriter, _ctx: &mut SaveContext) {
        out.i32(self.light_type.into());
        out.vec3(self.color);
        out.f32(self.spot_cutoff);
        out.bool(self.enabled);
        out.f32(self.intensity);
    }

    /// `enabled` and `intensity` were added in version 4.
    fn read_binary(
        input: &mut BinaryReader,
        version: u8,
        _ctx: &mut LoadContext,
    ) -> Result<Self, SceneError> {
        let mut light = Self::read_base(input)?;
        if version >= 4 {
            light.enabled = input.bool("Light enabled")?;
            light.intensity = input.f32("Light intensity")?;
        }
        Ok(light)
    }
}

// ---------------------------------------------------------------------------
// WorldCubemap
// ---------------------------------------------------------------------------

/// A reflection probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldCubemap {
    pub cubemap: AssetId,
    pub extent: Vec3,
    pub use_cube_parallax: bool,
    pub priority: i32,
}

impl Component for WorldCubemap {
    const NAME: &'static str = "WorldCubemap";
}

impl Default for WorldCubemap {
    fn default() -> Self {
        Self {
            cubemap: AssetId::INVALID,
            extent: Vec3::ONE,
            use_cube_parallax: false,
            priority: 0,
        }
    }
}

fn default_extent() -> Vec3 {
    Vec3::ONE
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorldCubemapJson {
    #[serde(default)]
    cubemap: Value,
    #[serde(default = "default_extent")]
    extent: Vec3,
    #[serde(default)]
    use_cube_parallax: bool,
    #[serde(default)]
    priority: i32,
}

impl SceneComponent for WorldCubemap {
    const SERIALIZED_ID: u32 = 6;

    fn to_json(&self, ctx: &mut SaveContext) -> Result<Value, SceneError> {
        encode(
            Self::NAME,
            &WorldCubemapJson {
                cubemap: ctx.asset_to_json(self.cubemap),
                extent: self.extent,
                use_cube_parallax: self.use_cube_parallax,
                priority: self.priority,
            },
        )
    }

    fn from_json(value: &Value, ctx: &mut LoadContext) -> Result<Self, SceneError> {
        let json: WorldCubemapJson = parse(Self::NAME, value)?;
        Ok(Self {
            cubemap: ctx.asset_from_json(&json.cubemap)?,
            extent: json.extent,
            use_cube_parallax: json.use_cube_parallax,
            priority: json.priority,
        })
    }

    fn write_binary(&self, out: &mut BinaryWriter, _ctx: &mut SaveContext) {
        out.u32(self.cubemap.0);
        out.vec3(self.extent);
        out.bool(self.use_cube_parallax);
        out.i32(self.priority);
    }

    fn read_binary(
        input: &mut BinaryReader,
        _version: u8,
        _ctx: &mut LoadContext,
    ) -> Result<Self, SceneError> {
        Ok(Self {
            cubemap: AssetId(input.u32("WorldCubemap cubemap")?),
            extent: input.vec3("WorldCubemap extent")?,
            use_cube_parallax: input.bool("WorldCubemap useCubeParallax")?,
            priority: input.i32("WorldCubemap priority")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn light_json_fills_defaults() {
        let light: Light = serde_json::from_value(json!({"color": [1, 0.5, 0]})).unwrap();
        assert_eq!(light.light_type, LightType::Point);
        assert_eq!(light.color, Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(light.intensity, 1.0);
        assert!(light.enabled);
    }

    #[test]
    fn light_type_is_numeric() {
        let light = Light {
            light_type: LightType::Spot,
            ..Light::default()
        };
        let value = serde_json::to_value(light).unwrap();
        assert_eq!(value["type"], json!(1));
        assert!(serde_json::from_value::<Light>(json!({"type": 9})).is_err());
    }
}
