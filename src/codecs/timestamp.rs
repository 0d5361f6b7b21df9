//! Timestamp codec: 4-byte little-endian seconds-since-epoch on write,
//! accepting the legacy 8-byte ASCII hex form on read (`spec.md` §4.2).

use crate::error::{Error, Result};

/// Seconds since the Unix epoch. `0` means "unset" for optional timestamp
/// fields, matching how the rest of the format treats an absent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub fn now() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Timestamp(secs as u32)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            4 => {
                let raw: [u8; 4] = bytes.try_into().unwrap();
                Ok(Timestamp(u32::from_le_bytes(raw)))
            }
            8 => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| Error::MalformedContainer("legacy timestamp is not ASCII hex".into()))?;
                let value = u32::from_str_radix(text, 16)
                    .map_err(|_| Error::MalformedContainer("legacy timestamp is not ASCII hex".into()))?;
                Ok(Timestamp(value))
            }
            other => Err(Error::MalformedContainer(format!(
                "timestamp field has unexpected length {other}"
            ))),
        }
    }

    /// Always emits the modern 4-byte little-endian form, per `spec.md`:
    /// "a legacy 8-byte ASCII hex form must be accepted on read ... and
    /// written in the 4-byte form."
    pub fn encode(&self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_modern_form() {
        let ts = Timestamp::decode(&1_700_000_000u32.to_le_bytes()).unwrap();
        assert_eq!(ts.0, 1_700_000_000);
    }

    #[test]
    fn decodes_legacy_hex_form() {
        let hex = format!("{:08x}", 0x1234_5678u32);
        let ts = Timestamp::decode(hex.as_bytes()).unwrap();
        assert_eq!(ts.0, 0x1234_5678);
    }

    #[test]
    fn always_writes_modern_form() {
        let ts = Timestamp(42);
        assert_eq!(ts.encode().len(), 4);
        assert_eq!(ts.encode(), 42u32.to_le_bytes());
    }

    #[test]
    fn rejects_bad_length() {
        assert!(Timestamp::decode(&[1, 2, 3]).is_err());
    }
}
