//! Scene settings loaded from `scene.toml`.
//!
//! ```toml
//! [scene]
//! default_format = "json"
//! pretty_json = true
//! prefab_root = "SourceData/"
//!
//! [[mount]]
//! name = "game"
//! path = "./SourceData"
//! default = true
//! ```

use std::path::Path;

use serde::Deserialize;
use worlds_vfs::{FileSystemProvider, MemoryProvider, Vfs};

use crate::error::SceneError;
use crate::format::{BinaryFamily, SceneFormat};

/// Encoding used when saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    #[default]
    Json,
    #[serde(rename = "msgpack")]
    MessagePack,
    /// Current-version WSCN.
    Binary,
}

impl From<SaveFormat> for SceneFormat {
    fn from(format: SaveFormat) -> Self {
        match format {
            SaveFormat::Json => SceneFormat::Json,
            SaveFormat::MessagePack => SceneFormat::MessagePack,
            SaveFormat::Binary => SceneFormat::Binary(BinaryFamily::Wscn),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub scene: SceneOptions,
    #[serde(default)]
    pub mount: Vec<MountConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    pub default_format: SaveFormat,
    pub pretty_json: bool,
    /// Stripped from prefab paths written into prefab instance records.
    pub prefab_root: String,
    /// Loads keep existing entities unless told otherwise.
    pub additive: bool,
    /// Loaded entities reuse their stored slot index where it is free.
    pub restore_entity_ids: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            default_format: SaveFormat::Json,
            pretty_json: true,
            prefab_root: "SourceData/".into(),
            additive: false,
            restore_entity_ids: false,
        }
    }
}

/// A single VFS mount point.
///
/// The `type` field selects the provider: `"filesystem"` (default) or
/// `"memory"`.
#[derive(Debug, Clone, Deserialize)]
pub struct MountConfig {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default = "default_mount_type")]
    pub r#type: String,
}

fn default_mount_type() -> String {
    "filesystem".into()
}

impl SceneConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, SceneError> {
        toml::from_str(content).map_err(|e| SceneError::Config(e.to_string()))
    }

    /// Reads a config file.
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SceneError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| SceneError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Reads a config file, falling back to the defaults when it is missing
    /// or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                log::info!(
                    "Loaded scene config {} ({} mounts)",
                    path.display(),
                    config.mount.len()
                );
                config
            }
            Err(e) => {
                log::warn!("No scene config ({e}), using defaults");
                Self::default()
            }
        }
    }

    /// Builds a [`Vfs`] from the mount list.
    pub fn build_vfs(&self) -> Vfs {
        let mut vfs = Vfs::new();

        for mount in &self.mount {
            match mount.r#type.as_str() {
                "filesystem" => {
                    log::info!("VFS mount: \"{}\" -> filesystem {:?}", mount.name, mount.path);
                    vfs.mount(&mount.name, FileSystemProvider::new(&mount.path));
                }
                "memory" => {
                    log::info!("VFS mount: \"{}\" -> memory", mount.name);
                    vfs.mount(&mount.name, MemoryProvider::new());
                }
                other => {
                    log::warn!("Unknown mount type \"{}\" for \"{}\"", other, mount.name);
                }
            }
        }

        if let Some(default_mount) = self.mount.iter().find(|m| m.default) {
            vfs.set_default(&default_mount.name);
        }

        vfs
    }
}
