//! Version dispatch for binary scene decoding.

use worlds_vfs::AssetStore;

use super::escn::EscnStrategy;
use super::io::BinaryReader;
use super::wscn::WscnStrategy;
use crate::document::SceneDocument;
use crate::error::{FormatError, SceneError};
use crate::format::BinaryFamily;
use crate::registry::ComponentRegistry;

/// Newest WSCN layout; the only one ever written.
pub const WSCN_MAX_VERSION: u8 = 6;
/// ESCN is frozen: no version past this will ever exist.
pub const ESCN_MAX_VERSION: u8 = 4;

/// Decoder for exactly one `(family, version)` layout.
///
/// A strategy parses the stream body (everything after the magic and the
/// version byte) into a [`SceneDocument`] without touching any world.
pub trait DecodeStrategy: Sync {
    fn family(&self) -> BinaryFamily;

    fn version(&self) -> u8;

    fn decode(
        &self,
        input: &mut BinaryReader,
        registry: &ComponentRegistry,
        assets: &dyn AssetStore,
    ) -> Result<SceneDocument, SceneError>;
}

static WSCN_STRATEGIES: [WscnStrategy; WSCN_MAX_VERSION as usize] = [
    WscnStrategy::new(1),
    WscnStrategy::new(2),
    WscnStrategy::new(3),
    WscnStrategy::new(4),
    WscnStrategy::new(5),
    WscnStrategy::new(6),
];

static ESCN_STRATEGIES: [EscnStrategy; ESCN_MAX_VERSION as usize] = [
    EscnStrategy::new(1),
    EscnStrategy::new(2),
    EscnStrategy::new(3),
    EscnStrategy::new(4),
];

pub fn max_version(family: BinaryFamily) -> u8 {
    match family {
        BinaryFamily::Wscn => WSCN_MAX_VERSION,
        BinaryFamily::Escn => ESCN_MAX_VERSION,
    }
}

/// Looks up the decoder for a declared version.
pub fn strategy_for(
    family: BinaryFamily,
    version: u8,
) -> Result<&'static dyn DecodeStrategy, FormatError> {
    let slot = (version as usize).checked_sub(1);
    let found: Option<&'static dyn DecodeStrategy> = match family {
        BinaryFamily::Wscn => slot
            .and_then(|i| WSCN_STRATEGIES.get(i))
            .map(|s| s as &'static dyn DecodeStrategy),
        BinaryFamily::Escn => slot
            .and_then(|i| ESCN_STRATEGIES.get(i))
            .map(|s| s as &'static dyn DecodeStrategy),
    };
    found.ok_or(FormatError::UnsupportedVersion {
        family,
        version,
        max: max_version(family),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_supported_version_has_a_strategy() {
        for version in 1..=WSCN_MAX_VERSION {
            let strategy = strategy_for(BinaryFamily::Wscn, version).unwrap();
            assert_eq!(strategy.family(), BinaryFamily::Wscn);
            assert_eq!(strategy.version(), version);
        }
        for version in 1..=ESCN_MAX_VERSION {
            assert_eq!(strategy_for(BinaryFamily::Escn, version).unwrap().version(), version);
        }
    }

    #[test]
    fn out_of_range_versions_are_rejected() {
        for (family, version) in [
            (BinaryFamily::Wscn, 0),
            (BinaryFamily::Wscn, WSCN_MAX_VERSION + 1),
            (BinaryFamily::Escn, ESCN_MAX_VERSION + 1),
        ] {
            let err = strategy_for(family, version).err().unwrap();
            assert!(matches!(err, FormatError::UnsupportedVersion { .. }));
        }
    }
}
