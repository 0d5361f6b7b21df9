//! Password-history record field: `status(1) || max(2) || count(2) ||
//! entries`, each entry `{ when_u32_le, pw_len_u16_le, pw }` (`spec.md`
//! §4.2).
//!
//! Per `spec.md` §9 Open Questions, `status`'s on/off/suspended semantics
//! are ambiguous upstream; it is preserved verbatim as a raw byte rather
//! than interpreted.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::codecs::timestamp::Timestamp;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub when: Timestamp,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PasswordHistory {
    /// Opaque on/off/suspended status byte; not interpreted (see module doc).
    pub status: u8,
    pub max_entries: u16,
    pub entries: Vec<HistoryEntry>,
}

pub fn decode(bytes: &[u8]) -> Result<PasswordHistory> {
    if bytes.is_empty() {
        return Ok(PasswordHistory::default());
    }

    let mut cursor = Cursor::new(bytes);
    let status = cursor.read_u8().map_err(|_| Error::truncated("password history status"))?;
    let max_entries = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| Error::truncated("password history max"))?;
    let count = cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| Error::truncated("password history count"))?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let when_raw = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::truncated("password history entry timestamp"))?;
        let pw_len = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::truncated("password history entry length"))?;
        let mut pw_bytes = vec![0u8; pw_len as usize];
        cursor
            .read_exact(&mut pw_bytes)
            .map_err(|_| Error::truncated("password history entry password"))?;

        entries.push(HistoryEntry {
            when: Timestamp(when_raw),
            password: String::from_utf8_lossy(&pw_bytes).into_owned(),
        });
    }

    Ok(PasswordHistory {
        status,
        max_entries,
        entries,
    })
}

pub fn encode(history: &PasswordHistory) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_u8(history.status).unwrap();
    out.write_u16::<LittleEndian>(history.max_entries).unwrap();
    out.write_u16::<LittleEndian>(history.entries.len() as u16).unwrap();
    for entry in &history.entries {
        out.write_u32::<LittleEndian>(entry.when.0).unwrap();
        let pw_bytes = entry.password.as_bytes();
        out.write_u16::<LittleEndian>(pw_bytes.len() as u16).unwrap();
        out.extend_from_slice(pw_bytes);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_empty_history() {
        let history = PasswordHistory {
            status: 1,
            max_entries: 10,
            entries: Vec::new(),
        };
        let encoded = encode(&history);
        assert_eq!(decode(&encoded).unwrap(), history);
    }

    #[test]
    fn round_trips_several_entries() {
        let history = PasswordHistory {
            status: 1,
            max_entries: 5,
            entries: vec![
                HistoryEntry {
                    when: Timestamp(1_600_000_000),
                    password: "old-one".into(),
                },
                HistoryEntry {
                    when: Timestamp(1_700_000_000),
                    password: "old-two".into(),
                },
            ],
        };
        let encoded = encode(&history);
        assert_eq!(decode(&encoded).unwrap(), history);
    }

    #[test]
    fn decode_of_empty_payload_yields_default() {
        assert_eq!(decode(&[]).unwrap(), PasswordHistory::default());
    }

    #[test]
    fn status_byte_is_preserved_verbatim() {
        for status in [0u8, 1, 2, 255] {
            let history = PasswordHistory {
                status,
                max_entries: 0,
                entries: Vec::new(),
            };
            let encoded = encode(&history);
            assert_eq!(decode(&encoded).unwrap().status, status);
        }
    }
}
