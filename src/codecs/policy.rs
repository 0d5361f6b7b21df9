//! Password policy codec, shared between the header's named-policy list and
//! a record's single attached policy (`spec.md` §4.2: "Password-policy
//! (record): same structure as one policy entry in named-policies.").

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};

use crate::error::{Error, Result};

bitflags::bitflags! {
    /// Flag bits for a password policy, per `spec.md` §4.2: "flag bits map
    /// to `{lowercase, uppercase, digits, symbols, hex, easyvision,
    /// pronounceable}`".
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PolicyFlags: u16 {
        const LOWERCASE = 1 << 0;
        const UPPERCASE = 1 << 1;
        const DIGITS = 1 << 2;
        const SYMBOLS = 1 << 3;
        const HEX = 1 << 4;
        const EASY_VISION = 1 << 5;
        const PRONOUNCEABLE = 1 << 6;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    /// Empty for a record's unnamed attached policy.
    pub name: String,
    pub flags: PolicyFlags,
    pub total_length: u16,
    pub min_lowercase: u16,
    pub min_uppercase: u16,
    pub min_digits: u16,
    pub min_symbols: u16,
    pub symbol_set: String,
}

impl PasswordPolicy {
    fn decode_from(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let name_len = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::truncated("password policy name length"))?;
        let name = read_text(cursor, name_len as usize, "password policy name")?;

        let flags = PolicyFlags::from_bits_truncate(
            cursor
                .read_u16::<LittleEndian>()
                .map_err(|_| Error::truncated("password policy flags"))?,
        );
        let total_length = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::truncated("password policy length"))?;
        let min_lowercase = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::truncated("password policy min lowercase"))?;
        let min_uppercase = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::truncated("password policy min uppercase"))?;
        let min_digits = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::truncated("password policy min digits"))?;
        let min_symbols = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::truncated("password policy min symbols"))?;
        let symset_len = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::truncated("password policy symbol set length"))?;
        let symbol_set = read_text(cursor, symset_len as usize, "password policy symbol set")?;

        Ok(PasswordPolicy {
            name,
            flags,
            total_length,
            min_lowercase,
            min_uppercase,
            min_digits,
            min_symbols,
            symbol_set,
        })
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        let name_bytes = self.name.as_bytes();
        out.write_u16::<LittleEndian>(name_bytes.len() as u16).unwrap();
        out.extend_from_slice(name_bytes);
        out.write_u16::<LittleEndian>(self.flags.bits()).unwrap();
        out.write_u16::<LittleEndian>(self.total_length).unwrap();
        out.write_u16::<LittleEndian>(self.min_lowercase).unwrap();
        out.write_u16::<LittleEndian>(self.min_uppercase).unwrap();
        out.write_u16::<LittleEndian>(self.min_digits).unwrap();
        out.write_u16::<LittleEndian>(self.min_symbols).unwrap();
        let symset_bytes = self.symbol_set.as_bytes();
        out.write_u16::<LittleEndian>(symset_bytes.len() as u16).unwrap();
        out.extend_from_slice(symset_bytes);
    }
}

fn read_text(cursor: &mut Cursor<&[u8]>, len: usize, what: &str) -> Result<String> {
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).map_err(|_| Error::truncated(what))?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Decodes a record's single attached policy.
pub fn decode_single(bytes: &[u8]) -> Result<PasswordPolicy> {
    let mut cursor = Cursor::new(bytes);
    PasswordPolicy::decode_from(&mut cursor)
}

/// Encodes a record's single attached policy.
pub fn encode_single(policy: &PasswordPolicy) -> Vec<u8> {
    let mut out = Vec::new();
    policy.encode_into(&mut out);
    out
}

/// Decodes the header's named-policy list: a count byte followed by that
/// many policy entries.
pub fn decode_list(bytes: &[u8]) -> Result<Vec<PasswordPolicy>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let mut cursor = Cursor::new(bytes);
    let count = cursor.read_u8().map_err(|_| Error::truncated("named policy count"))?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(PasswordPolicy::decode_from(&mut cursor)?);
    }
    Ok(out)
}

/// Encodes the header's named-policy list.
pub fn encode_list(policies: &[PasswordPolicy]) -> Result<Vec<u8>> {
    if policies.len() > u8::MAX as usize {
        return Err(Error::FieldValidation("too many named policies for an 8-bit count".into()));
    }
    let mut out = vec![policies.len() as u8];
    for policy in policies {
        policy.encode_into(&mut out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_policy() -> PasswordPolicy {
        PasswordPolicy {
            name: "Policy Hex".into(),
            flags: PolicyFlags::HEX,
            total_length: 20,
            min_lowercase: 1,
            min_uppercase: 1,
            min_digits: 1,
            min_symbols: 1,
            symbol_set: "+-=_@#$%^&;:,.<>/~\\[](){}?!|".into(),
        }
    }

    #[test]
    fn round_trips_single_policy() {
        let policy = hex_policy();
        let encoded = encode_single(&policy);
        let decoded = decode_single(&encoded).unwrap();
        assert_eq!(decoded, policy);
    }

    #[test]
    fn round_trips_named_policy_list() {
        let list = vec![hex_policy(), hex_policy()];
        let encoded = encode_list(&list).unwrap();
        let decoded = decode_list(&encoded).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn s4_hex_policy_flags() {
        let policy = hex_policy();
        assert!(policy.flags.contains(PolicyFlags::HEX));
        assert!(!policy.flags.contains(PolicyFlags::LOWERCASE));
        assert!(!policy.flags.contains(PolicyFlags::UPPERCASE));
        assert!(!policy.flags.contains(PolicyFlags::DIGITS));
        assert!(!policy.flags.contains(PolicyFlags::SYMBOLS));
        assert!(!policy.flags.contains(PolicyFlags::EASY_VISION));
        assert!(!policy.flags.contains(PolicyFlags::PRONOUNCEABLE));
    }

    #[test]
    fn empty_list_round_trips() {
        let encoded = encode_list(&[]).unwrap();
        assert_eq!(decode_list(&encoded).unwrap(), Vec::new());
    }
}
