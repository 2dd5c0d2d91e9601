//! Length-aware text fields.
//!
//! Validators cap byte strings at 64 bytes, so text longer than that is
//! stored as a list of 64-byte chunks. Every text field in a datum goes
//! through [`text_to_data`] and [`data_to_text`].

use ambassador_types::constants::MAX_BYTES_CHUNK;

use crate::plutus::{shape, PlutusData, PlutusDataExt};
use crate::DatumError;

/// Encode text as a single byte string, or a list of chunks when longer
/// than 64 bytes.
pub fn text_to_data(s: &str) -> PlutusData {
    let bytes = s.as_bytes();
    if bytes.len() <= MAX_BYTES_CHUNK {
        return PlutusData::bytes(bytes.to_vec());
    }
    PlutusData::list(
        bytes
            .chunks(MAX_BYTES_CHUNK)
            .map(|c| PlutusData::bytes(c.to_vec()))
            .collect(),
    )
}

/// Decode text written by [`text_to_data`].
pub fn data_to_text(entity: &'static str, data: &PlutusData) -> Result<String, DatumError> {
    let bytes = match data {
        PlutusData::BoundedBytes(_) => data.as_bytes(entity)?.to_vec(),
        PlutusData::Array(_) => {
            let mut out = Vec::new();
            for chunk in data.as_list(entity)? {
                out.extend_from_slice(chunk.as_bytes(entity)?);
            }
            out
        }
        other => return Err(shape(entity, "bytes or list of bytes", other)),
    };
    String::from_utf8(bytes).map_err(|_| DatumError::Utf8 { entity })
}

/// Decode an optional metadata text field. Absent fields read as an
/// empty string so datums written by an older metadata schema still load.
pub fn optional_text(entity: &'static str, data: Option<&PlutusData>) -> Result<String, DatumError> {
    match data {
        None => Ok(String::new()),
        Some(d) => data_to_text(entity, d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_bytes() {
        assert_eq!(text_to_data("hello"), PlutusData::bytes(b"hello".to_vec()));
        assert_eq!(text_to_data(""), PlutusData::bytes(Vec::new()));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let s = "a".repeat(64);
        assert!(matches!(text_to_data(&s), PlutusData::BoundedBytes(_)));
        let s = "a".repeat(65);
        let d = text_to_data(&s);
        let chunks = d.as_list("T").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], PlutusData::bytes(b"a".to_vec()));
    }

    #[test]
    fn test_multibyte_text_split_mid_char_roundtrips() {
        let s = "é".repeat(50); // 100 bytes, chunk boundary inside a character
        let d = text_to_data(&s);
        assert_eq!(data_to_text("T", &d).unwrap(), s);
    }

    #[test]
    fn test_optional_missing_is_empty() {
        assert_eq!(optional_text("T", None).unwrap(), "");
    }

    #[test]
    fn test_wrong_shape_errors() {
        assert!(data_to_text("T", &PlutusData::int(3)).is_err());
        assert!(data_to_text("T", &PlutusData::bytes(vec![0xff])).is_err());
    }
}
