//! MessagePack scene codec.
//!
//! A `WMSP` tag followed by the JSON document tree encoded with
//! `rmp-serde`. Maps are written with named keys so the packed form has
//! exactly the logical shape of the JSON form.

use serde_json::Value;

use crate::document::SceneDocument;
use crate::error::{FormatError, SceneError};
use crate::format::{SceneFormat, MSGPACK_MAGIC};
use crate::json;

/// Packs a JSON value behind the `WMSP` tag.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, SceneError> {
    let mut out = MSGPACK_MAGIC.to_vec();
    out.extend(rmp_serde::to_vec_named(value)?);
    Ok(out)
}

/// Unpacks a `WMSP` buffer into a JSON value.
pub fn decode_value(bytes: &[u8]) -> Result<Value, SceneError> {
    let body = bytes
        .strip_prefix(MSGPACK_MAGIC.as_slice())
        .ok_or_else(|| FormatError::Unknown(bytes.iter().take(4).copied().collect()))?;
    Ok(rmp_serde::from_slice(body)?)
}

pub fn decode(bytes: &[u8]) -> Result<SceneDocument, SceneError> {
    json::parse_document(decode_value(bytes)?, SceneFormat::MessagePack)
}

pub fn encode(document: &SceneDocument) -> Result<Vec<u8>, SceneError> {
    encode_value(&json::document_to_value(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_survives_packing() {
        let value = json!({
            "entities": {"3": {"Name": {"name": "crate"}, "Light": {"color": [1.0, 0.5, 0.0]}}},
            "settings": {"skyboxBoost": 2.0}
        });
        let packed = encode_value(&value).unwrap();
        assert_eq!(&packed[..4], MSGPACK_MAGIC);
        assert_eq!(decode_value(&packed).unwrap(), value);
    }

    #[test]
    fn missing_tag_is_a_format_error() {
        let packed = rmp_serde::to_vec_named(&json!({})).unwrap();
        assert!(matches!(
            decode_value(&packed),
            Err(SceneError::Format(FormatError::Unknown(_)))
        ));
    }

    #[test]
    fn garbage_after_tag_is_a_decode_error() {
        let bytes = b"WMSP\xc1\xc1".to_vec();
        assert!(matches!(decode_value(&bytes), Err(SceneError::MessagePackDecode(_))));
    }
}
