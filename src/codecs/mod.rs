//! Per-field-type encode/decode pairs. Every field type gets a pure
//! `decode(bytes) -> value` / `encode(value) -> bytes` pair, per `spec.md`
//! §4.2. The small scalar codecs (text, UUID, u16/u32) live in this module;
//! the structured ones (preferences, named policies, password history) get
//! their own submodule.

pub mod history;
pub mod policy;
pub mod prefs;
pub mod timestamp;

use uuid::Uuid;

use crate::error::{Error, Result};

/// UTF-8 text, no terminator, empty permitted. Stored internally as raw
/// bytes by callers (see `spec.md` §9 Open Questions); this function is the
/// lossy accessor-boundary decode.
pub fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn encode_text(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

pub fn decode_uuid(bytes: &[u8]) -> Result<Uuid> {
    let raw: [u8; 16] = bytes
        .try_into()
        .map_err(|_| Error::MalformedContainer(format!("UUID field has length {} (want 16)", bytes.len())))?;
    Ok(Uuid::from_bytes(raw))
}

pub fn encode_uuid(uuid: &Uuid) -> [u8; 16] {
    *uuid.as_bytes()
}

pub fn decode_u16(bytes: &[u8]) -> Result<u16> {
    let raw: [u8; 2] = bytes
        .try_into()
        .map_err(|_| Error::MalformedContainer(format!("u16 field has length {} (want 2)", bytes.len())))?;
    Ok(u16::from_le_bytes(raw))
}

pub fn encode_u16(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

pub fn decode_u32(bytes: &[u8]) -> Result<u32> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| Error::MalformedContainer(format!("u32 field has length {} (want 4)", bytes.len())))?;
    Ok(u32::from_le_bytes(raw))
}

pub fn encode_u32(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// A list of UUIDs packed back-to-back (16 bytes each), used for the
/// recent-entries header field's payload when more than one entry shares a
/// field instance.
pub fn decode_uuid_list(bytes: &[u8]) -> Result<Vec<Uuid>> {
    if bytes.len() % 16 != 0 {
        return Err(Error::MalformedContainer(format!(
            "UUID list has length {} (not a multiple of 16)",
            bytes.len()
        )));
    }
    Ok(bytes.chunks_exact(16).map(|c| Uuid::from_slice(c).unwrap()).collect())
}

pub fn encode_uuid_list(uuids: &[Uuid]) -> Vec<u8> {
    uuids.iter().flat_map(|u| *u.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trips_including_empty() {
        assert_eq!(decode_text(&encode_text("hello")), "hello");
        assert_eq!(decode_text(&encode_text("")), "");
    }

    #[test]
    fn uuid_round_trips() {
        let id = Uuid::new_v4();
        assert_eq!(decode_uuid(&encode_uuid(&id)).unwrap(), id);
    }

    #[test]
    fn uuid_wrong_length_is_an_error() {
        assert!(decode_uuid(&[1, 2, 3]).is_err());
    }

    #[test]
    fn u16_and_u32_round_trip_little_endian() {
        assert_eq!(decode_u16(&encode_u16(0x1234)).unwrap(), 0x1234);
        assert_eq!(decode_u32(&encode_u32(0xdead_beef)).unwrap(), 0xdead_beef);
        assert_eq!(encode_u16(1), [1, 0]);
    }

    #[test]
    fn uuid_list_round_trips() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let encoded = encode_uuid_list(&ids);
        assert_eq!(decode_uuid_list(&encoded).unwrap(), ids);
    }
}
