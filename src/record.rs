//! The record set: the ordered collection of entries following the header
//! group (`spec.md` §3, §4.5).

use uuid::Uuid;

use crate::codecs::history::PasswordHistory;
use crate::codecs::policy::PasswordPolicy;
use crate::codecs::timestamp::Timestamp;
use crate::codecs::{self, history, policy};
use crate::error::{Error, Result};

/// On-the-wire record field type codes. As with `header::kind`, this is this
/// crate's own consistent numbering (see `DESIGN.md`), not a copy of a
/// retrieved upstream table.
pub mod kind {
    pub const UUID: u8 = 0x01;
    pub const GROUP: u8 = 0x02;
    pub const TITLE: u8 = 0x03;
    pub const USERNAME: u8 = 0x04;
    pub const NOTES: u8 = 0x05;
    pub const PASSWORD: u8 = 0x06;
    pub const CREATED_TIME: u8 = 0x07;
    pub const PASSWORD_MODIFIED_TIME: u8 = 0x08;
    pub const LAST_ACCESS_TIME: u8 = 0x09;
    pub const PASSWORD_EXPIRY_TIME: u8 = 0x0a;
    pub const ENTRY_MODIFIED_TIME: u8 = 0x0c;
    pub const URL: u8 = 0x0d;
    pub const AUTOTYPE: u8 = 0x0e;
    pub const RUN_COMMAND: u8 = 0x0f;
    pub const DCA: u8 = 0x10;
    pub const SHIFT_DCA: u8 = 0x11;
    pub const EMAIL: u8 = 0x14;
    pub const PROTECTED_ENTRY: u8 = 0x15;
    pub const PASSWORD_POLICY: u8 = 0x16;
    pub const PASSWORD_HISTORY: u8 = 0x17;
    pub const POLICY_NAME: u8 = 0x18;
    pub const TWO_FACTOR_KEY: u8 = 0x19;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordField {
    Uuid(Uuid),
    Group(String),
    Title(String),
    Username(String),
    Notes(String),
    Password(String),
    Url(String),
    Email(String),
    CreatedTime(Timestamp),
    PasswordModifiedTime(Timestamp),
    EntryModifiedTime(Timestamp),
    LastAccessTime(Timestamp),
    PasswordExpiryTime(Timestamp),
    PasswordPolicy(PasswordPolicy),
    PolicyName(String),
    PasswordHistory(PasswordHistory),
    RunCommand(String),
    Dca(u16),
    ShiftDca(u16),
    Autotype(String),
    ProtectedEntry(bool),
    TwoFactorKey(Vec<u8>),
    /// Preserved verbatim for forward compatibility with field types this
    /// build does not recognize.
    Unknown(u8, Vec<u8>),
}

impl RecordField {
    pub fn field_type(&self) -> u8 {
        use kind::*;
        match self {
            RecordField::Uuid(_) => UUID,
            RecordField::Group(_) => GROUP,
            RecordField::Title(_) => TITLE,
            RecordField::Username(_) => USERNAME,
            RecordField::Notes(_) => NOTES,
            RecordField::Password(_) => PASSWORD,
            RecordField::Url(_) => URL,
            RecordField::Email(_) => EMAIL,
            RecordField::CreatedTime(_) => CREATED_TIME,
            RecordField::PasswordModifiedTime(_) => PASSWORD_MODIFIED_TIME,
            RecordField::EntryModifiedTime(_) => ENTRY_MODIFIED_TIME,
            RecordField::LastAccessTime(_) => LAST_ACCESS_TIME,
            RecordField::PasswordExpiryTime(_) => PASSWORD_EXPIRY_TIME,
            RecordField::PasswordPolicy(_) => PASSWORD_POLICY,
            RecordField::PolicyName(_) => POLICY_NAME,
            RecordField::PasswordHistory(_) => PASSWORD_HISTORY,
            RecordField::RunCommand(_) => RUN_COMMAND,
            RecordField::Dca(_) => DCA,
            RecordField::ShiftDca(_) => SHIFT_DCA,
            RecordField::Autotype(_) => AUTOTYPE,
            RecordField::ProtectedEntry(_) => PROTECTED_ENTRY,
            RecordField::TwoFactorKey(_) => TWO_FACTOR_KEY,
            RecordField::Unknown(t, _) => *t,
        }
    }

    pub fn decode(field_type: u8, value: &[u8]) -> Result<Self> {
        use kind::*;
        Ok(match field_type {
            UUID => RecordField::Uuid(codecs::decode_uuid(value)?),
            GROUP => RecordField::Group(codecs::decode_text(value)),
            TITLE => RecordField::Title(codecs::decode_text(value)),
            USERNAME => RecordField::Username(codecs::decode_text(value)),
            NOTES => RecordField::Notes(codecs::decode_text(value)),
            PASSWORD => RecordField::Password(codecs::decode_text(value)),
            URL => RecordField::Url(codecs::decode_text(value)),
            EMAIL => RecordField::Email(codecs::decode_text(value)),
            CREATED_TIME => RecordField::CreatedTime(Timestamp::decode(value)?),
            PASSWORD_MODIFIED_TIME => RecordField::PasswordModifiedTime(Timestamp::decode(value)?),
            ENTRY_MODIFIED_TIME => RecordField::EntryModifiedTime(Timestamp::decode(value)?),
            LAST_ACCESS_TIME => RecordField::LastAccessTime(Timestamp::decode(value)?),
            PASSWORD_EXPIRY_TIME => RecordField::PasswordExpiryTime(Timestamp::decode(value)?),
            PASSWORD_POLICY => RecordField::PasswordPolicy(policy::decode_single(value)?),
            POLICY_NAME => RecordField::PolicyName(codecs::decode_text(value)),
            PASSWORD_HISTORY => RecordField::PasswordHistory(history::decode(value)?),
            RUN_COMMAND => RecordField::RunCommand(codecs::decode_text(value)),
            DCA => RecordField::Dca(codecs::decode_u16(value)?),
            SHIFT_DCA => RecordField::ShiftDca(codecs::decode_u16(value)?),
            AUTOTYPE => RecordField::Autotype(codecs::decode_text(value)),
            PROTECTED_ENTRY => RecordField::ProtectedEntry(value.first().copied().unwrap_or(0) != 0),
            TWO_FACTOR_KEY => RecordField::TwoFactorKey(value.to_vec()),
            other => RecordField::Unknown(other, value.to_vec()),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(match self {
            RecordField::Uuid(u) => codecs::encode_uuid(u).to_vec(),
            RecordField::Group(s) => codecs::encode_text(s),
            RecordField::Title(s) => codecs::encode_text(s),
            RecordField::Username(s) => codecs::encode_text(s),
            RecordField::Notes(s) => codecs::encode_text(s),
            RecordField::Password(s) => codecs::encode_text(s),
            RecordField::Url(s) => codecs::encode_text(s),
            RecordField::Email(s) => codecs::encode_text(s),
            RecordField::CreatedTime(t) => t.encode().to_vec(),
            RecordField::PasswordModifiedTime(t) => t.encode().to_vec(),
            RecordField::EntryModifiedTime(t) => t.encode().to_vec(),
            RecordField::LastAccessTime(t) => t.encode().to_vec(),
            RecordField::PasswordExpiryTime(t) => t.encode().to_vec(),
            RecordField::PasswordPolicy(p) => policy::encode_single(p),
            RecordField::PolicyName(s) => codecs::encode_text(s),
            RecordField::PasswordHistory(h) => history::encode(h),
            RecordField::RunCommand(s) => codecs::encode_text(s),
            RecordField::Dca(v) => codecs::encode_u16(*v).to_vec(),
            RecordField::ShiftDca(v) => codecs::encode_u16(*v).to_vec(),
            RecordField::Autotype(s) => codecs::encode_text(s),
            RecordField::ProtectedEntry(b) => vec![if *b { 1 } else { 0 }],
            RecordField::TwoFactorKey(bytes) => bytes.clone(),
            RecordField::Unknown(_, bytes) => bytes.clone(),
        })
    }
}

/// A single entry. `spec.md` §4.5 requires every record to carry a UUID,
/// title, and password; everything else is optional.
///
/// Deliberately does not derive/implement a public `Default`: every public
/// constructor other than `new` would let a caller hand `Safe::add_record`
/// a record missing one of those three mandatory fields. The only empty
/// constructor is `pub(crate)` and is used solely by `Record::decode`, which
/// immediately fills it back in from the wire.
#[derive(Debug, Clone)]
pub struct Record {
    fields: Vec<RecordField>,
}

impl Record {
    /// Builds a record with the three mandatory fields. Additional fields
    /// can be attached with `set`/`push`.
    pub fn new(uuid: Uuid, title: impl Into<String>, password: impl Into<String>) -> Self {
        Record {
            fields: vec![
                RecordField::Uuid(uuid),
                RecordField::Title(title.into()),
                RecordField::Password(password.into()),
            ],
        }
    }

    /// An empty record with none of the mandatory fields set yet. Not
    /// exposed publicly — see the struct doc. Used only while decoding a
    /// record off the wire, where the mandatory fields arrive as ordinary
    /// fields in the stream.
    pub(crate) fn empty() -> Self {
        Record { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.fields.iter().find_map(|f| match f {
            RecordField::Uuid(u) => Some(*u),
            _ => None,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            RecordField::Title(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn password(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            RecordField::Password(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn username(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            RecordField::Username(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn group(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            RecordField::Group(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn url(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            RecordField::Url(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn email(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            RecordField::Email(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn expiration_time(&self) -> Option<Timestamp> {
        self.fields.iter().find_map(|f| match f {
            RecordField::PasswordExpiryTime(t) => Some(*t),
            _ => None,
        })
    }

    /// Replaces every existing field of the same wire type, then stores
    /// `field`. Matches the "at most one of each type" rule most record
    /// fields follow.
    pub fn set(&mut self, field: RecordField) {
        let ty = field.field_type();
        self.fields.retain(|f| f.field_type() != ty);
        self.fields.push(field);
    }

    /// Appends `field` without deduplicating, for repeatable fields if a
    /// future revision adds any.
    pub fn push(&mut self, field: RecordField) {
        self.fields.push(field);
    }

    fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let mut record = Record::empty();
        let mut consumed = 0usize;
        loop {
            match crate::stream::decode_field(&data[consumed..], "record")? {
                None => {
                    consumed += crate::stream::BLOCK_SIZE;
                    return Ok((record, consumed));
                }
                Some(field) => {
                    record.fields.push(RecordField::decode(field.field_type, &field.value)?);
                    consumed += field.consumed;
                }
            }
        }
    }

    fn encode(&self, out: &mut Vec<u8>, rng: &mut impl rand::RngCore) -> Result<()> {
        for field in &self.fields {
            crate::stream::encode_field(out, field.field_type(), &field.encode()?, rng).map_err(Error::Io)?;
        }
        crate::stream::encode_terminator(out, rng).map_err(Error::Io)?;
        Ok(())
    }
}

/// The ordered collection of records making up a database, preserving
/// on-disk order.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new() -> Self {
        RecordSet::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn insert(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn find(&self, uuid: Uuid) -> Result<&Record> {
        self.records.iter().find(|r| r.uuid() == Some(uuid)).ok_or(Error::NotFound)
    }

    pub fn find_mut(&mut self, uuid: Uuid) -> Result<&mut Record> {
        self.records.iter_mut().find(|r| r.uuid() == Some(uuid)).ok_or(Error::NotFound)
    }

    pub fn remove(&mut self, uuid: Uuid) -> Result<Record> {
        let index = self.records.iter().position(|r| r.uuid() == Some(uuid)).ok_or(Error::NotFound)?;
        Ok(self.records.remove(index))
    }

    /// Decodes every record from `data` until it is exhausted.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        let mut set = RecordSet::new();
        while !data.is_empty() {
            let (record, consumed) = Record::decode(data)?;
            set.records.push(record);
            data = &data[consumed..];
        }
        Ok(set)
    }

    pub fn encode(&self, out: &mut Vec<u8>, rng: &mut impl rand::RngCore) -> Result<()> {
        for record in &self.records {
            record.encode(out, rng)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn rng() -> StepRng {
        StepRng::new(0, 1)
    }

    #[test]
    fn record_round_trips_through_the_byte_stream() {
        let uuid = Uuid::new_v4();
        let mut record = Record::new(uuid, "Example", "hunter2");
        record.set(RecordField::Username("alice".into()));
        record.set(RecordField::Group("Personal".into()));
        record.set(RecordField::Unknown(0x7e, vec![9, 9, 9]));

        let mut set = RecordSet::new();
        set.insert(record);

        let mut buf = Vec::new();
        set.encode(&mut buf, &mut rng()).unwrap();

        let decoded = RecordSet::decode(&buf).unwrap();
        assert_eq!(decoded.len(), 1);
        let found = decoded.find(uuid).unwrap();
        assert_eq!(found.title(), Some("Example"));
        assert_eq!(found.password(), Some("hunter2"));
        assert_eq!(found.username(), Some("alice"));
        assert_eq!(found.group(), Some("Personal"));
        assert!(found.fields().iter().any(|f| matches!(f, RecordField::Unknown(0x7e, v) if v == &[9, 9, 9])));
    }

    #[test]
    fn multiple_records_preserve_insertion_order() {
        let a = Record::new(Uuid::new_v4(), "A", "pw-a");
        let b = Record::new(Uuid::new_v4(), "B", "pw-b");
        let a_uuid = a.uuid().unwrap();
        let b_uuid = b.uuid().unwrap();

        let mut set = RecordSet::new();
        set.insert(a);
        set.insert(b);

        let mut buf = Vec::new();
        set.encode(&mut buf, &mut rng()).unwrap();
        let decoded = RecordSet::decode(&buf).unwrap();

        assert_eq!(decoded.records()[0].uuid(), Some(a_uuid));
        assert_eq!(decoded.records()[1].uuid(), Some(b_uuid));
    }

    #[test]
    fn find_missing_uuid_is_not_found() {
        let set = RecordSet::new();
        assert!(matches!(set.find(Uuid::new_v4()), Err(Error::NotFound)));
    }

    #[test]
    fn remove_extracts_the_record() {
        let record = Record::new(Uuid::new_v4(), "Gone", "pw");
        let uuid = record.uuid().unwrap();
        let mut set = RecordSet::new();
        set.insert(record);
        let removed = set.remove(uuid).unwrap();
        assert_eq!(removed.title(), Some("Gone"));
        assert!(set.find(uuid).is_err());
    }
}
