//! Marker components that steer saving and loading. None of them are
//! written to scene files.

use worlds_ecs::Component;
use worlds_vfs::AssetId;

/// The entity was instantiated from a prefab and is saved as a diff
/// against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefabInstance {
    pub prefab: AssetId,
}

impl Component for PrefabInstance {
    const NAME: &'static str = "PrefabInstance";
}

/// Excludes the entity from saved scenes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DontSerialize;

impl Component for DontSerialize {
    const NAME: &'static str = "DontSerialize";
}

/// Keeps the entity alive across non-additive scene loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepOnSceneLoad;

impl Component for KeepOnSceneLoad {
    const NAME: &'static str = "KeepOnSceneLoad";
}
