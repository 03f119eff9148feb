//! Persisted data of physics components.
//!
//! These carry what a physics engine needs to rebuild its actors and joints;
//! no engine state is stored.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use worlds_ecs::{Component, Entity};
use worlds_vfs::AssetId;

use super::fields::{encode, parse, Pose};
use crate::binary::io::{BinaryReader, BinaryWriter};
use crate::context::{LoadContext, SaveContext};
use crate::error::{SceneError, SchemaError};
use crate::registry::SceneComponent;

/// Collision layer assumed when a stream predates per-actor layers.
pub const DEFAULT_LAYER: u32 = 1;

/// First WSCN version storing collision layers.
const LAYER_VERSION: u8 = 5;

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
    Capsule { height: f32, radius: f32 },
    Mesh { mesh: AssetId },
}

impl ShapeKind {
    fn code(&self) -> i32 {
        match self {
            ShapeKind::Sphere { .. } => 0,
            ShapeKind::Box { .. } => 1,
            ShapeKind::Capsule { .. } => 2,
            ShapeKind::Mesh { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsShape {
    pub kind: ShapeKind,
    pub pose: Pose,
}

impl PhysicsShape {
    pub fn sphere(radius: f32) -> Self {
        Self {
            kind: ShapeKind::Sphere { radius },
            pose: Pose::default(),
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self {
            kind: ShapeKind::Box { half_extents },
            pose: Pose::default(),
        }
    }

    /// Reads the type-specific payload. Legacy mesh shapes carried no mesh
    /// reference; `with_mesh_id` is false for them.
    pub(crate) fn read_kind(
        input: &mut BinaryReader,
        code: i32,
        with_mesh_id: bool,
    ) -> Result<ShapeKind, SceneError> {
        Ok(match code {
            0 => ShapeKind::Sphere {
                radius: input.f32("shape radius")?,
            },
            1 => ShapeKind::Box {
                half_extents: input.vec3("shape half extents")?,
            },
            2 => ShapeKind::Capsule {
                height: input.f32("shape height")?,
                radius: input.f32("shape radius")?,
            },
            3 => ShapeKind::Mesh {
                mesh: if with_mesh_id {
                    AssetId(input.u32("shape mesh")?)
                } else {
                    AssetId::INVALID
                },
            },
            other => {
                return Err(SchemaError::invalid("PhysicsShape", format!("unknown shape type {other}")).into())
            }
        })
    }

    fn read(input: &mut BinaryReader) -> Result<Self, SceneError> {
        let code = input.i32("shape type")?;
        let pose = Pose::read(input, "shape pose")?;
        let kind = Self::read_kind(input, code, true)?;
        Ok(Self { kind, pose })
    }

    fn write(&self, out: &mut BinaryWriter) {
        out.i32(self.kind.code());
        self.pose.write(out);
        match self.kind {
            ShapeKind::Sphere { radius } => out.f32(radius),
            ShapeKind::Box { half_extents } => out.vec3(half_extents),
            ShapeKind::Capsule { height, radius } => {
                out.f32(height);
                out.f32(radius);
            }
            ShapeKind::Mesh { mesh } => out.u32(mesh.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ShapeTag {
    Sphere,
    Box,
    Capsule,
    Mesh,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapeJson {
    #[serde(rename = "type")]
    tag: ShapeTag,
    #[serde(default)]
    position: Vec3,
    #[serde(default = "identity")]
    rotation: Quat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    half_extents: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<f32>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    mesh: Value,
}

fn identity() -> Quat {
    Quat::IDENTITY
}

impl ShapeJson {
    fn from_shape(shape: &PhysicsShape, ctx: &SaveContext) -> Self {
        let mut json = Self {
            tag: ShapeTag::Sphere,
            position: shape.pose.position,
            rotation: shape.pose.rotation,
            radius: None,
            half_extents: None,
            height: None,
            mesh: Value::Null,
        };
        match shape.kind {
            ShapeKind::Sphere { radius } => json.radius = Some(radius),
            ShapeKind::Box { half_extents } => {
                json.tag = ShapeTag::Box;
                json.half_extents = Some(half_extents);
            }
            ShapeKind::Capsule { height, radius } => {
                json.tag = ShapeTag::Capsule;
                json.height = Some(height);
                json.radius = Some(radius);
            }
            ShapeKind::Mesh { mesh } => {
                json.tag = ShapeTag::Mesh;
                json.mesh = ctx.asset_to_json(mesh);
            }
        }
        json
    }

    fn into_shape(self, component: &'static str, ctx: &LoadContext) -> Result<PhysicsShape, SceneError> {
        let missing = |field: &str| SchemaError::invalid(component, format!("{:?} shape without '{field}'", self.tag));
        let kind = match self.tag {
            ShapeTag::Sphere => ShapeKind::Sphere {
                radius: self.radius.ok_or_else(|| missing("radius"))?,
            },
            ShapeTag::Box => ShapeKind::Box {
                half_extents: self.half_extents.ok_or_else(|| missing("halfExtents"))?,
            },
            ShapeTag::Capsule => ShapeKind::Capsule {
                height: self.height.ok_or_else(|| missing("height"))?,
                radius: self.radius.ok_or_else(|| missing("radius"))?,
            },
            ShapeTag::Mesh => ShapeKind::Mesh {
                mesh: ctx.asset_from_json(&self.mesh)?,
            },
        };
        Ok(PhysicsShape {
            kind,
            pose: Pose {
                position: self.position,
                rotation: self.rotation,
            },
        })
    }
}

fn shapes_to_json(shapes: &[PhysicsShape], ctx: &SaveContext) -> Vec<ShapeJson> {
    shapes.iter().map(|s| ShapeJson::from_shape(s, ctx)).collect()
}

fn shapes_from_json(
    component: &'static str,
    shapes: Vec<ShapeJson>,
    ctx: &LoadContext,
) -> Result<Vec<PhysicsShape>, SceneError> {
    shapes.into_iter().map(|s| s.into_shape(component, ctx)).collect()
}

fn write_shapes(out: &mut BinaryWriter, shapes: &[PhysicsShape]) {
    out.u32(shapes.len() as u32);
    for shape in shapes {
        shape.write(out);
    }
}

fn read_shapes(input: &mut BinaryReader) -> Result<Vec<PhysicsShape>, SceneError> {
    let count = input.u32("shape count")? as usize;
    // Each shape is at least a type tag and a pose
    let min_size = 4 + 28;
    if count.saturating_mul(min_size) > input.remaining() {
        return Err(crate::error::TruncatedStreamError {
            offset: input.position(),
            reading: "shapes",
        }
        .into());
    }
    (0..count).map(|_| PhysicsShape::read(input)).collect()
}

fn default_layer() -> u32 {
    DEFAULT_LAYER
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// PhysicsActor
// ---------------------------------------------------------------------------

/// A static collider.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsActor {
    pub shapes: Vec<PhysicsShape>,
    pub layer: u32,
}

impl Component for PhysicsActor {
    const NAME: &'static str = "PhysicsActor";
}

impl Default for PhysicsActor {
    fn default() -> Self {
        Self {
            shapes: Vec::new(),
            layer: DEFAULT_LAYER,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PhysicsActorJson {
    #[serde(default)]
    shapes: Vec<ShapeJson>,
    #[serde(default = "default_layer")]
    layer: u32,
}

impl SceneComponent for PhysicsActor {
    const SERIALIZED_ID: u32 = 4;

    fn to_json(&self, ctx: &mut SaveContext) -> Result<Value, SceneError> {
        encode(
            Self::NAME,
            &PhysicsActorJson {
                shapes: shapes_to_json(&self.shapes, ctx),
                layer: self.layer,
            },
        )
    }

    fn from_json(value: &Value, ctx: &mut LoadContext) -> Result<Self, SceneError> {
        let json: PhysicsActorJson = parse(Self::NAME, value)?;
        Ok(Self {
            shapes: shapes_from_json(Self::NAME, json.shapes, ctx)?,
            layer: json.layer,
        })
    }

    fn write_binary(&self, out: &mut BinaryWriter, _ctx: &mut SaveContext) {
        write_shapes(out, &self.shapes);
        out.u32(self.layer);
    }

    fn read_binary(
        input: &mut BinaryReader,
        version: u8,
        _ctx: &mut LoadContext,
    ) -> Result<Self, SceneError> {
        let shapes = read_shapes(input)?;
        let layer = if version >= LAYER_VERSION {
            input.u32("PhysicsActor layer")?
        } else {
            DEFAULT_LAYER
        };
        Ok(Self { shapes, layer })
    }
}

// ---------------------------------------------------------------------------
// DynamicPhysicsActor
// ---------------------------------------------------------------------------

/// A simulated rigid body.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicPhysicsActor {
    pub mass: f32,
    pub shapes: Vec<PhysicsShape>,
    pub layer: u32,
    pub enable_gravity: bool,
    pub enable_ccd: bool,
}

impl Component for DynamicPhysicsActor {
    const NAME: &'static str = "DynamicPhysicsActor";
}

impl Default for DynamicPhysicsActor {
    fn default() -> Self {
        Self {
            mass: 1.0,
            shapes: Vec::new(),
            layer: DEFAULT_LAYER,
            enable_gravity: true,
            enable_ccd: false,
        }
    }
}

fn default_mass() -> f32 {
    1.0
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DynamicPhysicsActorJson {
    #[serde(default = "default_mass")]
    mass: f32,
    #[serde(default)]
    shapes: Vec<ShapeJson>,
    #[serde(default = "default_layer")]
    layer: u32,
    #[serde(default = "default_true")]
    enable_gravity: bool,
    #[serde(default, rename = "enableCCD")]
    enable_ccd: bool,
}

impl SceneComponent for DynamicPhysicsActor {
    const SERIALIZED_ID: u32 = 5;

    fn to_json(&self, ctx: &mut SaveContext) -> Result<Value, SceneError> {
        encode(
            Self::NAME,
            &DynamicPhysicsActorJson {
                mass: self.mass,
                shapes: shapes_to_json(&self.shapes, ctx),
                layer: self.layer,
                enable_gravity: self.enable_gravity,
                enable_ccd: self.enable_ccd,
            },
        )
    }

    fn from_json(value: &Value, ctx: &mut LoadContext) -> Result<Self, SceneError> {
        let json: DynamicPhysicsActorJson = parse(Self::NAME, value)?;
        Ok(Self {
            mass: json.mass,
            shapes: shapes_from_json(Self::NAME, json.shapes, ctx)?,
            layer: json.layer,
            enable_gravity: json.enable_gravity,
            enable_ccd: json.enable_ccd,
        })
    }

    fn write_binary(&self, out: &mut BinaryWriter, _ctx: &mut SaveContext) {
        out.f32(self.mass);
        write_shapes(out, &self.shapes);
        out.u32(self.layer);
        out.bool(self.enable_gravity);
        out.bool(self.enable_ccd);
    }

    /// Layer, gravity and CCD flags were added in version 5.
    fn read_binary(
        input: &mut BinaryReader,
        version: u8,
        _ctx: &mut LoadContext,
    ) -> Result<Self, SceneError> {
        let mut actor = Self {
            mass: input.f32("DynamicPhysicsActor mass")?,
            shapes: read_shapes(input)?,
            ..Self::default()
        };
        if version >= LAYER_VERSION {
            actor.layer = input.u32("DynamicPhysicsActor layer")?;
            actor.enable_gravity = input.bool("DynamicPhysicsActor enableGravity")?;
            actor.enable_ccd = input.bool("DynamicPhysicsActor enableCCD")?;
        }
        Ok(actor)
    }
}

// ---------------------------------------------------------------------------
// D6Joint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum D6Motion {
    #[default]
    Locked,
    Limited,
    Free,
}

impl TryFrom<u8> for D6Motion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(D6Motion::Locked),
            1 => Ok(D6Motion::Limited),
            2 => Ok(D6Motion::Free),
            other => Err(format!("unknown joint motion {other}")),
        }
    }
}

impl From<D6Motion> for u8 {
    fn from(value: D6Motion) -> Self {
        value as u8
    }
}

/// Six-degree-of-freedom joint between this body and `target`.
///
/// Axes are ordered X, Y, Z, twist, swing 1, swing 2. A joint whose target
/// did not survive loading keeps [`Entity::INVALID`] and is attached to the
/// world frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct D6Joint {
    pub target: Entity,
    pub axis_motions: [D6Motion; 6],
    pub this_pose: Pose,
    pub connected_pose: Pose,
}

impl Component for D6Joint {
    const NAME: &'static str = "D6Joint";
}

impl Default for D6Joint {
    fn default() -> Self {
        Self {
            target: Entity::INVALID,
            axis_motions: [D6Motion::Locked; 6],
            this_pose: Pose::default(),
            connected_pose: Pose::default(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct D6JointJson {
    #[serde(default)]
    target: Value,
    #[serde(default)]
    axis_motions: [D6Motion; 6],
    #[serde(default)]
    this_pose: Pose,
    #[serde(default)]
    connected_pose: Pose,
}

impl SceneComponent for D6Joint {
    const SERIALIZED_ID: u32 = 7;
    const SORT_KEY: i32 = 1;
    const SINCE_VERSION: u8 = 6;
    const DEPENDS_ON: &'static [&'static str] = &[DynamicPhysicsActor::NAME];

    fn to_json(&self, ctx: &mut SaveContext) -> Result<Value, SceneError> {
        ctx.set_component(Self::NAME);
        encode(
            Self::NAME,
            &D6JointJson {
                target: ctx.entity_to_json(self.target),
                axis_motions: self.axis_motions,
                this_pose: self.this_pose,
                connected_pose: self.connected_pose,
            },
        )
    }

    fn from_json(value: &Value, ctx: &mut LoadContext) -> Result<Self, SceneError> {
        let json: D6JointJson = parse(Self::NAME, value)?;
        Ok(Self {
            target: ctx.entity_from_json(&json.target)?,
            axis_motions: json.axis_motions,
            this_pose: json.this_pose,
            connected_pose: json.connected_pose,
        })
    }

    fn write_binary(&self, out: &mut BinaryWriter, ctx: &mut SaveContext) {
        ctx.set_component(Self::NAME);
        out.u32(ctx.entity_to_raw(self.target));
        for motion in self.axis_motions {
            out.u8(motion.into());
        }
        self.this_pose.write(out);
        self.connected_pose.write(out);
    }

    fn read_binary(
        input: &mut BinaryReader,
        _version: u8,
        ctx: &mut LoadContext,
    ) -> Result<Self, SceneError> {
        let target = ctx.entity_from_raw(input.u32("D6Joint target")?);
        let mut axis_motions = [D6Motion::Locked; 6];
        for motion in &mut axis_motions {
            *motion = D6Motion::try_from(input.u8("D6Joint axis motion")?)
                .map_err(|e| SchemaError::invalid(Self::NAME, e))?;
        }
        Ok(Self {
            target,
            axis_motions,
            this_pose: Pose::read(input, "D6Joint thisPose")?,
            connected_pose: Pose::read(input, "D6Joint connectedPose")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SceneFormat;
    use crate::remap::EntityIdRemapper;
    use serde_json::json;
    use std::collections::HashMap;
    use worlds_vfs::{AssetDb, Vfs};

    #[test]
    fn shapes_roundtrip_through_json() {
        let assets = AssetDb::new(Vfs::new());
        let mesh = worlds_vfs::AssetStore::path_to_id(&assets, "Meshes/rock.mesh").unwrap();
        let actor = PhysicsActor {
            shapes: vec![
                PhysicsShape::sphere(0.5),
                PhysicsShape::cuboid(Vec3::new(1.0, 2.0, 3.0)),
                PhysicsShape {
                    kind: ShapeKind::Capsule { height: 2.0, radius: 0.25 },
                    pose: Pose { position: Vec3::Y, rotation: Quat::IDENTITY },
                },
                PhysicsShape {
                    kind: ShapeKind::Mesh { mesh },
                    pose: Pose::default(),
                },
            ],
            layer: 4,
        };

        let ids = HashMap::new();
        let mut save = SaveContext::new(&ids, &assets);
        let value = actor.to_json(&mut save).unwrap();
        assert_eq!(value["shapes"][0]["type"], json!("sphere"));
        assert_eq!(value["shapes"][3]["mesh"], json!("Meshes/rock.mesh"));

        let remap = EntityIdRemapper::new();
        let mut load = LoadContext::new(&remap, &assets, SceneFormat::Json);
        assert_eq!(PhysicsActor::from_json(&value, &mut load).unwrap(), actor);
    }

    #[test]
    fn json_accepts_every_value_it_writes() {
        let assets = AssetDb::new(Vfs::new());
        let ids = HashMap::new();
        let mut save = SaveContext::new(&ids, &assets);
        let remap = EntityIdRemapper::new();
        let mut load = LoadContext::new(&remap, &assets, SceneFormat::Json);

        let fixed = PhysicsActor { shapes: Vec::new(), layer: 0 };
        let value = fixed.to_json(&mut save).unwrap();
        assert_eq!(PhysicsActor::from_json(&value, &mut load).unwrap(), fixed);

        let body = DynamicPhysicsActor {
            mass: 0.0,
            layer: 0,
            ..DynamicPhysicsActor::default()
        };
        let value = body.to_json(&mut save).unwrap();
        assert_eq!(DynamicPhysicsActor::from_json(&value, &mut load).unwrap(), body);

        // Missing fields still take the defaults
        let sparse = DynamicPhysicsActor::from_json(&json!({}), &mut load).unwrap();
        assert_eq!(sparse, DynamicPhysicsActor::default());
    }

    #[test]
    fn incomplete_shape_is_rejected() {
        let assets = AssetDb::new(Vfs::new());
        let remap = EntityIdRemapper::new();
        let mut load = LoadContext::new(&remap, &assets, SceneFormat::Json);
        let value = json!({"shapes": [{"type": "capsule", "radius": 1.0}]});
        assert!(PhysicsActor::from_json(&value, &mut load).is_err());
    }

    #[test]
    fn pre_layer_versions_skip_layer_fields() {
        let mut out = BinaryWriter::new();
        out.f32(3.0);
        write_shapes(&mut out, &[PhysicsShape::sphere(1.0)]);
        let bytes = out.into_bytes();

        let assets = AssetDb::new(Vfs::new());
        let mut ctx = LoadContext::validating(&assets, SceneFormat::Json);
        let mut input = BinaryReader::new(&bytes);
        let actor = DynamicPhysicsActor::read_binary(&mut input, 4, &mut ctx).unwrap();
        assert_eq!(actor.mass, 3.0);
        assert_eq!(actor.layer, DEFAULT_LAYER);
        assert!(actor.enable_gravity);
        assert_eq!(input.remaining(), 0);
    }
}
