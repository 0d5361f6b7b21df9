//! Block-aligned typed-length-value framing shared by the header set and
//! the record set.
//!
//! One field is serialized as `length(u32 LE) || type(u8) || value`, then
//! padded with random bytes out to the next 16-byte boundary. Decoding mirrors
//! encoding exactly. This is the same block-splitting idea as
//! `third-party/pwsafer/src/reader.rs::PwsafeReader::next_buffered_field` /
//! `src/writer.rs::PwsafeWriter::write_field`, generalized to operate over an
//! in-memory decrypted body rather than being spliced into file I/O, and with
//! truncation reported as an error instead of silently clamped.

use byteorder::{LittleEndian, WriteBytesExt};
use rand::RngCore;
use std::io::{self, Write};

use crate::error::{Error, Result};

pub const BLOCK_SIZE: usize = 16;
pub const TERMINATOR: u8 = 0xFF;

/// Appends one field (header field or record field) to `out`, including its
/// trailing random padding.
pub fn encode_field(out: &mut Vec<u8>, field_type: u8, value: &[u8], rng: &mut impl RngCore) -> io::Result<()> {
    let mut head = Vec::with_capacity(5);
    head.write_u32::<LittleEndian>(value.len() as u32)?;
    head.write_u8(field_type)?;

    let mut i = 0usize;
    let mut first = true;
    loop {
        let mut block = [0u8; BLOCK_SIZE];
        let mut filled = 0usize;

        if first {
            block[..5].copy_from_slice(&head);
            filled = 5;
            first = false;
        }

        let take = (BLOCK_SIZE - filled).min(value.len() - i);
        block[filled..filled + take].copy_from_slice(&value[i..i + take]);
        filled += take;
        i += take;

        rng.fill_bytes(&mut block[filled..]);
        out.write_all(&block)?;

        if i >= value.len() {
            break;
        }
    }
    Ok(())
}

/// Appends the terminator field (type `0xFF`, zero-length value).
pub fn encode_terminator(out: &mut Vec<u8>, rng: &mut impl RngCore) -> io::Result<()> {
    encode_field(out, TERMINATOR, &[], rng)
}

/// One decoded field: its type, its value, and how many bytes of `data` it
/// (including padding) consumed.
pub struct DecodedField {
    pub field_type: u8,
    pub value: Vec<u8>,
    pub consumed: usize,
}

/// Parses one field from the front of `data` regardless of whether it is a
/// terminator; `field_type == TERMINATOR && value.is_empty()` tells the
/// caller whether it just consumed a terminator.
fn parse_one(data: &[u8], what: &str) -> Result<DecodedField> {
    if data.len() < BLOCK_SIZE {
        return Err(Error::truncated(what));
    }

    let field_length = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    let field_type = data[4];

    let total_len = 5 + field_length;
    let num_blocks = total_len.div_ceil(BLOCK_SIZE).max(1);
    let consumed = num_blocks * BLOCK_SIZE;

    if consumed > data.len() {
        return Err(Error::truncated(what));
    }

    let value = data[5..5 + field_length].to_vec();
    Ok(DecodedField {
        field_type,
        value,
        consumed,
    })
}

/// Decodes one field from the front of `data`.
///
/// Returns `Ok(None)` if the terminator field is at the front. `what` names
/// the stream for error messages ("header", "record"). Used to parse a
/// single header group or a single record group, each of which ends at its
/// own terminator.
pub fn decode_field(data: &[u8], what: &str) -> Result<Option<DecodedField>> {
    let field = parse_one(data, what)?;
    if field.field_type == TERMINATOR && field.value.is_empty() {
        return Ok(None);
    }
    Ok(Some(field))
}

/// Iterates every field of one group (terminator excluded) in `data`,
/// calling `visit` with the field's raw value bytes in wire order. Stops at
/// the group's own terminator — use this for a single header group or a
/// single record group, never for a whole headers+records body (a body is
/// several groups back to back and this would stop at the first one).
pub fn for_each_field_value(mut data: &[u8], what: &str, mut visit: impl FnMut(&[u8])) -> Result<()> {
    loop {
        match decode_field(data, what)? {
            None => return Ok(()),
            Some(field) => {
                visit(&field.value);
                data = &data[field.consumed..];
            }
        }
    }
}

/// Iterates every field in `data` — header group, then every record group,
/// back to back — until `data` is exhausted, calling `visit` with each
/// field's raw value bytes, including each terminator's own empty value.
///
/// This is the HMAC authentication domain (`spec.md` §4.5): "the
/// concatenation, in on-the-wire order, of the value bytes of each field
/// (headers then records, **including each terminator field's empty
/// value**)". Unlike `for_each_field_value`, this never stops early at a
/// `0xFF`/length-0 field — only true buffer exhaustion ends the sweep,
/// mirroring `third-party/pwsafer/src/reader.rs::next_buffered_field`, which
/// has no notion of "group" and just keeps reading fields until the buffer
/// runs out.
pub fn for_each_field_value_in_body(mut data: &[u8], what: &str, mut visit: impl FnMut(&[u8])) -> Result<()> {
    while !data.is_empty() {
        let field = parse_one(data, what)?;
        visit(&field.value);
        data = &data[field.consumed..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn rng() -> StepRng {
        StepRng::new(0, 1)
    }

    #[test]
    fn round_trips_a_short_field() {
        let mut buf = Vec::new();
        encode_field(&mut buf, 0x42, b"dummy", &mut rng()).unwrap();
        let field = decode_field(&buf, "test").unwrap().unwrap();
        assert_eq!(field.field_type, 0x42);
        assert_eq!(field.value, b"dummy");
        assert_eq!(field.consumed, buf.len());
    }

    #[test]
    fn round_trips_a_multi_block_field() {
        let value = vec![7u8; 40];
        let mut buf = Vec::new();
        encode_field(&mut buf, 0x10, &value, &mut rng()).unwrap();
        assert_eq!(buf.len() % BLOCK_SIZE, 0);
        let field = decode_field(&buf, "test").unwrap().unwrap();
        assert_eq!(field.value, value);
    }

    #[test]
    fn empty_value_still_occupies_one_block() {
        let mut buf = Vec::new();
        encode_field(&mut buf, 0x01, b"", &mut rng()).unwrap();
        assert_eq!(buf.len(), BLOCK_SIZE);
    }

    #[test]
    fn terminator_is_recognized() {
        let mut buf = Vec::new();
        encode_terminator(&mut buf, &mut rng()).unwrap();
        assert!(decode_field(&buf, "test").unwrap().is_none());
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let mut buf = Vec::new();
        encode_field(&mut buf, 0x02, b"0123456789abcdef0123456789", &mut rng()).unwrap();
        buf.truncate(buf.len() - BLOCK_SIZE);
        assert!(decode_field(&buf, "test").is_err());
    }

    #[test]
    fn for_each_field_value_skips_terminator() {
        let mut buf = Vec::new();
        encode_field(&mut buf, 0x01, b"one", &mut rng()).unwrap();
        encode_field(&mut buf, 0x02, b"two", &mut rng()).unwrap();
        encode_terminator(&mut buf, &mut rng()).unwrap();

        let mut seen = Vec::new();
        for_each_field_value(&buf, "test", |v| seen.push(v.to_vec())).unwrap();
        assert_eq!(seen, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn whole_body_sweep_crosses_group_boundaries() {
        // header group: one field, then its terminator
        let mut buf = Vec::new();
        encode_field(&mut buf, 0x08, b"db-name", &mut rng()).unwrap();
        encode_terminator(&mut buf, &mut rng()).unwrap();
        // record group 1: one field, then its terminator
        encode_field(&mut buf, 0x03, b"title-one", &mut rng()).unwrap();
        encode_terminator(&mut buf, &mut rng()).unwrap();
        // record group 2: one field, then its terminator
        encode_field(&mut buf, 0x03, b"title-two", &mut rng()).unwrap();
        encode_terminator(&mut buf, &mut rng()).unwrap();

        let mut seen = Vec::new();
        for_each_field_value_in_body(&buf, "test", |v| seen.push(v.to_vec())).unwrap();
        assert_eq!(
            seen,
            vec![
                b"db-name".to_vec(),
                b"".to_vec(),
                b"title-one".to_vec(),
                b"".to_vec(),
                b"title-two".to_vec(),
                b"".to_vec(),
            ]
        );
    }
}
