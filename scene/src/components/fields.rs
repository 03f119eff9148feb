//! Shared helpers for component payloads.

use glam::{Quat, Vec3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use worlds_ecs::components::Transform;

use crate::binary::io::{BinaryReader, BinaryWriter};
use crate::error::{SceneError, SchemaError};

/// Deserializes a JSON component value, tagging failures with the
/// component name.
pub(crate) fn parse<T: DeserializeOwned>(component: &'static str, value: &Value) -> Result<T, SceneError> {
    T::deserialize(value).map_err(|e| SchemaError::invalid(component, e.to_string()).into())
}

pub(crate) fn encode<T: Serialize>(component: &'static str, value: &T) -> Result<Value, SceneError> {
    serde_json::to_value(value).map_err(|e| SchemaError::invalid(component, e.to_string()).into())
}

pub(crate) fn read_transform(
    input: &mut BinaryReader,
    reading: &'static str,
) -> Result<Transform, SceneError> {
    Ok(Transform {
        position: input.vec3(reading)?,
        rotation: input.quat(reading)?,
        scale: input.vec3(reading)?,
    })
}

pub(crate) fn write_transform(out: &mut BinaryWriter, transform: &Transform) {
    out.vec3(transform.position);
    out.quat(transform.rotation);
    out.vec3(transform.scale);
}

/// Position and orientation without scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "identity")]
    pub rotation: Quat,
}

fn identity() -> Quat {
    Quat::IDENTITY
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    pub(crate) fn read(input: &mut BinaryReader, reading: &'static str) -> Result<Self, SceneError> {
        Ok(Self {
            position: input.vec3(reading)?,
            rotation: input.quat(reading)?,
        })
    }

    pub(crate) fn write(&self, out: &mut BinaryWriter) {
        out.vec3(self.position);
        out.quat(self.rotation);
    }
}
