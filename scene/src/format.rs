//! Scene format detection.
//!
//! Classifies input by its leading bytes without consuming it:
//!
//! | Leading bytes | Format |
//! |---|---|
//! | `WSCN` + version byte | current binary family |
//! | `ESCN` + version byte | frozen legacy binary family |
//! | `WMSP` | MessagePack document |
//! | `{` (after optional whitespace) | JSON document |

use std::io::{Read, Seek, SeekFrom};

use crate::error::{FormatError, SceneError};

pub const WSCN_MAGIC: &[u8; 4] = b"WSCN";
pub const ESCN_MAGIC: &[u8; 4] = b"ESCN";
pub const MSGPACK_MAGIC: &[u8; 4] = b"WMSP";

/// Bytes examined by [`detect_stream`]. JSON preceded by more whitespace
/// than this is not recognized.
const PEEK_WINDOW: usize = 256;

/// Binary scene file family, identified by its magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryFamily {
    /// Generic numeric-id + payload layout. Still written.
    Wscn,
    /// Fixed presence-bitfield layout. Read-only.
    Escn,
}

impl BinaryFamily {
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            BinaryFamily::Wscn => WSCN_MAGIC,
            BinaryFamily::Escn => ESCN_MAGIC,
        }
    }
}

impl std::fmt::Display for BinaryFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryFamily::Wscn => write!(f, "WSCN"),
            BinaryFamily::Escn => write!(f, "ESCN"),
        }
    }
}

/// A recognized scene encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneFormat {
    Binary(BinaryFamily),
    Json,
    MessagePack,
}

impl std::fmt::Display for SceneFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneFormat::Binary(family) => write!(f, "binary {family}"),
            SceneFormat::Json => write!(f, "json"),
            SceneFormat::MessagePack => write!(f, "msgpack"),
        }
    }
}

/// Classifies a complete scene buffer.
pub fn detect(bytes: &[u8]) -> Result<SceneFormat, FormatError> {
    match bytes.first() {
        Some(b'W') | Some(b'E') => {
            let unknown = || FormatError::Unknown(bytes.iter().take(4).copied().collect());
            let tag = bytes.get(..4).ok_or_else(unknown)?;
            if tag == WSCN_MAGIC {
                Ok(SceneFormat::Binary(BinaryFamily::Wscn))
            } else if tag == ESCN_MAGIC {
                Ok(SceneFormat::Binary(BinaryFamily::Escn))
            } else if tag == MSGPACK_MAGIC {
                Ok(SceneFormat::MessagePack)
            } else {
                Err(unknown())
            }
        }
        _ => {
            let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
            if first == Some(&b'{') {
                Ok(SceneFormat::Json)
            } else {
                Err(FormatError::Unknown(bytes.iter().take(4).copied().collect()))
            }
        }
    }
}

/// Classifies a seekable stream, leaving its position where it was.
pub fn detect_stream<R: Read + Seek>(reader: &mut R) -> Result<SceneFormat, SceneError> {
    let start = reader.stream_position()?;
    let mut window = Vec::with_capacity(PEEK_WINDOW);
    let peeked = reader
        .by_ref()
        .take(PEEK_WINDOW as u64)
        .read_to_end(&mut window);
    reader.seek(SeekFrom::Start(start))?;
    peeked?;
    Ok(detect(&window)?)
}
