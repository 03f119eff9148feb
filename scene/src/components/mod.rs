//! Built-in persisted components.
//!
//! | Component | Binary id | Sort key | Since WSCN | Depends on |
//! |---|---|---|---|---|
//! | `Name` | 1 | -2 | 1 | |
//! | `Transform` | 0 | -1 | 1 | |
//! | `WorldObject` | 2 | 0 | 1 | |
//! | `Light` | 3 | 0 | 1 | |
//! | `PhysicsActor` | 4 | 0 | 1 | |
//! | `DynamicPhysicsActor` | 5 | 0 | 1 | |
//! | `WorldCubemap` | 6 | 0 | 1 | |
//! | `D6Joint` | 7 | 1 | 6 | `DynamicPhysicsActor` |
//! | `Child` | 8 | 1 | 6 | `Transform` |

mod base;
mod fields;
mod hierarchy;
mod markers;
mod physics;
mod render;

pub use fields::Pose;
pub use hierarchy::Child;
pub use markers::{DontSerialize, KeepOnSceneLoad, PrefabInstance};
pub use physics::{
    D6Joint, D6Motion, DynamicPhysicsActor, PhysicsActor, PhysicsShape, ShapeKind, DEFAULT_LAYER,
};
pub use render::{Light, LightType, WorldCubemap, WorldObject, MAX_MATERIALS};
pub use worlds_ecs::components::{Name, Transform};

use worlds_ecs::World;

use crate::registry::ComponentRegistryBuilder;

/// Adds every built-in persisted component to `builder`.
pub fn register_builtin(builder: ComponentRegistryBuilder) -> ComponentRegistryBuilder {
    builder
        .register::<Name>()
        .register::<Transform>()
        .register::<WorldObject>()
        .register::<Light>()
        .register::<PhysicsActor>()
        .register::<DynamicPhysicsActor>()
        .register::<WorldCubemap>()
        .register::<D6Joint>()
        .register::<Child>()
}

/// Registers storage for the marker components.
pub fn register_markers(world: &mut World) {
    world.register_component::<PrefabInstance>();
    world.register_component::<DontSerialize>();
    world.register_component::<KeepOnSceneLoad>();
}
