//! Binary scene codec.
//!
//! Two families share the `magic + version byte` header: WSCN, which is
//! still written, and the frozen ESCN. Decoding goes through a
//! [`DecodeStrategy`] picked by `(family, version)` and never touches the
//! world; a decode error therefore leaves the caller's world unchanged.

mod escn;
pub mod io;
mod strategy;
mod wscn;

pub use strategy::{
    max_version, strategy_for, DecodeStrategy, ESCN_MAX_VERSION, WSCN_MAX_VERSION,
};
pub use wscn::encode;

use worlds_vfs::AssetStore;

use crate::document::SceneDocument;
use crate::error::{FormatError, SceneError};
use crate::format::{BinaryFamily, ESCN_MAGIC, WSCN_MAGIC};
use crate::registry::ComponentRegistry;
use io::BinaryReader;

/// Parses and validates a complete binary scene.
pub fn decode(
    bytes: &[u8],
    registry: &ComponentRegistry,
    assets: &dyn AssetStore,
) -> Result<SceneDocument, SceneError> {
    let mut input = BinaryReader::new(bytes);
    let magic = input.bytes(4, "magic")?;
    let family = if magic == WSCN_MAGIC {
        BinaryFamily::Wscn
    } else if magic == ESCN_MAGIC {
        BinaryFamily::Escn
    } else {
        return Err(FormatError::Unknown(magic.to_vec()).into());
    };
    let version = input.u8("format version")?;
    let strategy = strategy_for(family, version)?;
    log::debug!("binary: decoding {family} version {version}");
    strategy.decode(&mut input, registry, assets)
}
