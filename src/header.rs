//! The header set: the ordered collection of typed fields preceding the
//! record stream (`spec.md` §3, §4.4).
//!
//! Field types are a tagged union with an `Unknown` escape hatch (Design
//! Note: "Dynamic dispatch on field types is best replaced by a tagged-union
//! ... plus an `Unknown(type_byte, bytes)` variant for forward
//! compatibility"), and the collection itself is an ordered vector with
//! `upsert_singleton`/`append_repeatable`/`remove_all_of_kind` helpers
//! (Design Note on "Runtime attribute mutation on collections").

use uuid::Uuid;

use crate::codecs::policy::PasswordPolicy;
use crate::codecs::prefs::Preference;
use crate::codecs::timestamp::Timestamp;
use crate::codecs::{self, policy, prefs};
use crate::error::{Error, Result};

/// On-the-wire header field type codes.
///
/// The upstream `pwsafer::field::PwsafeHeaderField` table was not present in
/// the retrieved sources this crate was built from, so this table is this
/// crate's own consistent numbering rather than a byte-for-byte copy of
/// real-world Password Safe's codes (see `DESIGN.md`).
pub mod kind {
    pub const VERSION: u8 = 0x00;
    pub const UUID: u8 = 0x01;
    pub const NON_DEFAULT_PREFS: u8 = 0x02;
    pub const TREE_DISPLAY_STATUS: u8 = 0x03;
    pub const TIMESTAMP_LAST_SAVE: u8 = 0x04;
    pub const WHO_LAST_SAVED: u8 = 0x05;
    pub const LAST_SAVE_USER: u8 = 0x06;
    pub const LAST_SAVE_HOST: u8 = 0x07;
    pub const DB_NAME: u8 = 0x08;
    pub const DB_DESCRIPTION: u8 = 0x09;
    pub const EMPTY_GROUP: u8 = 0x0a;
    pub const RECENT_ENTRY: u8 = 0x0b;
    pub const NAMED_POLICIES: u8 = 0x0c;
    pub const LAST_SAVE_APP: u8 = 0x0d;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderField {
    Version(u16),
    Uuid(Uuid),
    NonDefaultPrefs(Vec<Preference>),
    TreeDisplayStatus(String),
    TimestampOfLastSave(Timestamp),
    WhoLastSaved(String),
    LastSaveUser(String),
    LastSaveHost(String),
    DbName(String),
    DbDescription(String),
    EmptyGroup(String),
    RecentEntry(Uuid),
    NamedPolicies(Vec<PasswordPolicy>),
    LastSaveApp(String),
    /// Preserved verbatim for forward compatibility with field types this
    /// build does not recognize.
    Unknown(u8, Vec<u8>),
}

impl HeaderField {
    pub fn field_type(&self) -> u8 {
        use kind::*;
        match self {
            HeaderField::Version(_) => VERSION,
            HeaderField::Uuid(_) => UUID,
            HeaderField::NonDefaultPrefs(_) => NON_DEFAULT_PREFS,
            HeaderField::TreeDisplayStatus(_) => TREE_DISPLAY_STATUS,
            HeaderField::TimestampOfLastSave(_) => TIMESTAMP_LAST_SAVE,
            HeaderField::WhoLastSaved(_) => WHO_LAST_SAVED,
            HeaderField::LastSaveUser(_) => LAST_SAVE_USER,
            HeaderField::LastSaveHost(_) => LAST_SAVE_HOST,
            HeaderField::DbName(_) => DB_NAME,
            HeaderField::DbDescription(_) => DB_DESCRIPTION,
            HeaderField::EmptyGroup(_) => EMPTY_GROUP,
            HeaderField::RecentEntry(_) => RECENT_ENTRY,
            HeaderField::NamedPolicies(_) => NAMED_POLICIES,
            HeaderField::LastSaveApp(_) => LAST_SAVE_APP,
            HeaderField::Unknown(t, _) => *t,
        }
    }

    /// At most one instance of a singleton header type may appear. Unknown
    /// fields carry no such guarantee either way, so callers are free to
    /// append as many as they like.
    pub fn is_singleton(&self) -> bool {
        !matches!(self, HeaderField::EmptyGroup(_) | HeaderField::RecentEntry(_) | HeaderField::Unknown(..))
    }

    pub fn decode(field_type: u8, value: &[u8]) -> Result<Self> {
        use kind::*;
        Ok(match field_type {
            VERSION => HeaderField::Version(codecs::decode_u16(value)?),
            UUID => HeaderField::Uuid(codecs::decode_uuid(value)?),
            NON_DEFAULT_PREFS => HeaderField::NonDefaultPrefs(prefs::decode(value)?),
            TREE_DISPLAY_STATUS => HeaderField::TreeDisplayStatus(codecs::decode_text(value)),
            TIMESTAMP_LAST_SAVE => HeaderField::TimestampOfLastSave(Timestamp::decode(value)?),
            WHO_LAST_SAVED => HeaderField::WhoLastSaved(codecs::decode_text(value)),
            LAST_SAVE_USER => HeaderField::LastSaveUser(codecs::decode_text(value)),
            LAST_SAVE_HOST => HeaderField::LastSaveHost(codecs::decode_text(value)),
            DB_NAME => HeaderField::DbName(codecs::decode_text(value)),
            DB_DESCRIPTION => HeaderField::DbDescription(codecs::decode_text(value)),
            EMPTY_GROUP => HeaderField::EmptyGroup(codecs::decode_text(value)),
            RECENT_ENTRY => HeaderField::RecentEntry(codecs::decode_uuid(value)?),
            NAMED_POLICIES => HeaderField::NamedPolicies(policy::decode_list(value)?),
            LAST_SAVE_APP => HeaderField::LastSaveApp(codecs::decode_text(value)),
            other => HeaderField::Unknown(other, value.to_vec()),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(match self {
            HeaderField::Version(v) => codecs::encode_u16(*v).to_vec(),
            HeaderField::Uuid(u) => codecs::encode_uuid(u).to_vec(),
            HeaderField::NonDefaultPrefs(p) => prefs::encode(p),
            HeaderField::TreeDisplayStatus(s) => codecs::encode_text(s),
            HeaderField::TimestampOfLastSave(t) => t.encode().to_vec(),
            HeaderField::WhoLastSaved(s) => codecs::encode_text(s),
            HeaderField::LastSaveUser(s) => codecs::encode_text(s),
            HeaderField::LastSaveHost(s) => codecs::encode_text(s),
            HeaderField::DbName(s) => codecs::encode_text(s),
            HeaderField::DbDescription(s) => codecs::encode_text(s),
            HeaderField::EmptyGroup(s) => codecs::encode_text(s),
            HeaderField::RecentEntry(u) => codecs::encode_uuid(u).to_vec(),
            HeaderField::NamedPolicies(p) => policy::encode_list(p)?,
            HeaderField::LastSaveApp(s) => codecs::encode_text(s),
            HeaderField::Unknown(_, bytes) => bytes.clone(),
        })
    }
}

/// Known mappings from a human "pretty" version string to the two-byte
/// format-version field. The historical release-to-format-version mapping is
/// not derivable from this crate's sources (see `DESIGN.md` Open Questions);
/// only the mapping `spec.md` §8 scenario S5 exercises is seeded here.
const KNOWN_PRETTY_VERSIONS: &[(&str, u16)] = &[("PasswordSafe V3.28", 0x030A)];

#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    fields: Vec<HeaderField>,
}

impl HeaderSet {
    pub fn new() -> Self {
        HeaderSet::default()
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// Decodes a whole header group from the front of `data`, stopping at
    /// (and consuming) the terminator field. Returns the remaining bytes.
    pub fn decode(data: &[u8]) -> Result<(Self, &[u8])> {
        let mut set = HeaderSet::new();
        let mut rest = data;
        loop {
            match crate::stream::decode_field(rest, "header")? {
                None => {
                    rest = &rest[crate::stream::BLOCK_SIZE..];
                    return Ok((set, rest));
                }
                Some(field) => {
                    set.fields.push(HeaderField::decode(field.field_type, &field.value)?);
                    rest = &rest[field.consumed..];
                }
            }
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>, rng: &mut impl rand::RngCore) -> Result<()> {
        for field in &self.fields {
            crate::stream::encode_field(out, field.field_type(), &field.encode()?, rng)
                .map_err(Error::Io)?;
        }
        crate::stream::encode_terminator(out, rng).map_err(Error::Io)?;
        Ok(())
    }

    pub fn upsert_singleton(&mut self, field: HeaderField) {
        debug_assert!(field.is_singleton(), "upsert_singleton called with a repeatable field");
        let ty = field.field_type();
        self.fields.retain(|f| f.field_type() != ty);
        self.fields.insert(0, field);
    }

    pub fn append_repeatable(&mut self, field: HeaderField) {
        debug_assert!(!field.is_singleton(), "append_repeatable called with a singleton field");
        self.fields.push(field);
    }

    pub fn remove_all_of_kind(&mut self, field_type: u8) {
        self.fields.retain(|f| f.field_type() != field_type);
    }

    fn singleton_of<'a, T>(&'a self, extract: impl Fn(&'a HeaderField) -> Option<T>) -> Option<T> {
        self.fields.iter().find_map(extract)
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.singleton_of(|f| match f {
            HeaderField::Uuid(u) => Some(*u),
            _ => None,
        })
    }

    pub fn set_uuid(&mut self, uuid: Uuid) {
        self.upsert_singleton(HeaderField::Uuid(uuid));
    }

    pub fn version_id(&self) -> Option<u16> {
        self.singleton_of(|f| match f {
            HeaderField::Version(v) => Some(*v),
            _ => None,
        })
    }

    pub fn set_version_id(&mut self, version: u16) {
        self.upsert_singleton(HeaderField::Version(version));
    }

    /// Resolves a pretty version string (e.g. `"PasswordSafe V3.28"`) to a
    /// format-version code and stores it, or fails with `FieldValidation`
    /// for an unrecognized string.
    pub fn set_pretty_version(&mut self, pretty: &str) -> Result<()> {
        let version = KNOWN_PRETTY_VERSIONS
            .iter()
            .find(|(name, _)| *name == pretty)
            .map(|(_, v)| *v)
            .ok_or_else(|| Error::FieldValidation(format!("unrecognized version string {pretty:?}")))?;
        self.set_version_id(version);
        Ok(())
    }

    pub fn db_name(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            HeaderField::DbName(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn set_db_name(&mut self, name: impl Into<String>) {
        self.upsert_singleton(HeaderField::DbName(name.into()));
    }

    pub fn db_description(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            HeaderField::DbDescription(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn set_db_description(&mut self, description: impl Into<String>) {
        self.upsert_singleton(HeaderField::DbDescription(description.into()));
    }

    pub fn last_save_time(&self) -> Option<Timestamp> {
        self.singleton_of(|f| match f {
            HeaderField::TimestampOfLastSave(t) => Some(*t),
            _ => None,
        })
    }

    pub fn set_last_save_time(&mut self, time: Timestamp) {
        self.upsert_singleton(HeaderField::TimestampOfLastSave(time));
    }

    pub fn last_save_app(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            HeaderField::LastSaveApp(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn set_last_save_app(&mut self, app: impl Into<String>) {
        self.upsert_singleton(HeaderField::LastSaveApp(app.into()));
    }

    pub fn last_save_host(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            HeaderField::LastSaveHost(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn set_last_save_host(&mut self, host: impl Into<String>) {
        self.upsert_singleton(HeaderField::LastSaveHost(host.into()));
    }

    /// New-style last-save-user header.
    pub fn last_save_user(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            HeaderField::LastSaveUser(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Old-style combined "who last saved" header, deprecated in favor of
    /// `last_save_user`/`last_save_host` but still read for compatibility.
    pub fn who_last_saved(&self) -> Option<&str> {
        self.fields.iter().find_map(|f| match f {
            HeaderField::WhoLastSaved(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Sets the new-style last-save-user header, and the legacy
    /// who-last-saved header too when `add_old` is set — see `spec.md` §8
    /// scenario S2.
    pub fn set_last_save_user(&mut self, user: impl Into<String>, add_old: bool) {
        let user = user.into();
        if add_old {
            self.upsert_singleton(HeaderField::WhoLastSaved(user.clone()));
        }
        self.upsert_singleton(HeaderField::LastSaveUser(user));
    }

    pub fn non_default_prefs(&self) -> Vec<Preference> {
        self.singleton_of(|f| match f {
            HeaderField::NonDefaultPrefs(p) => Some(p.clone()),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn set_non_default_prefs(&mut self, prefs: Vec<Preference>) {
        self.upsert_singleton(HeaderField::NonDefaultPrefs(prefs));
    }

    pub fn named_policies(&self) -> Vec<PasswordPolicy> {
        self.singleton_of(|f| match f {
            HeaderField::NamedPolicies(p) => Some(p.clone()),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn set_named_policies(&mut self, policies: Vec<PasswordPolicy>) {
        self.upsert_singleton(HeaderField::NamedPolicies(policies));
    }

    pub fn empty_groups(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter_map(|f| match f {
                HeaderField::EmptyGroup(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn add_empty_group(&mut self, name: impl Into<String>) {
        self.append_repeatable(HeaderField::EmptyGroup(name.into()));
    }

    pub fn recent_entries(&self) -> Vec<Uuid> {
        self.fields
            .iter()
            .filter_map(|f| match f {
                HeaderField::RecentEntry(u) => Some(*u),
                _ => None,
            })
            .collect()
    }

    pub fn add_recent_entry(&mut self, uuid: Uuid) {
        self.append_repeatable(HeaderField::RecentEntry(uuid));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_groups_s1() {
        let mut set = HeaderSet::new();
        set.add_empty_group("asdf");
        set.add_empty_group("fdas");
        assert_eq!(set.empty_groups(), vec!["asdf", "fdas"]);
        set.add_empty_group("bogus5324");
        assert_eq!(set.empty_groups(), vec!["asdf", "fdas", "bogus5324"]);
    }

    #[test]
    fn last_save_user_s2() {
        let mut set = HeaderSet::new();
        set.upsert_singleton(HeaderField::LastSaveUser("gpmidi".into()));
        assert_eq!(set.last_save_user(), Some("gpmidi"));
        assert_eq!(set.who_last_saved(), None);

        set.set_last_save_user("user123", true);
        assert_eq!(set.last_save_user(), Some("user123"));
        assert_eq!(set.who_last_saved(), Some("user123"));
    }

    #[test]
    fn version_s5() {
        let mut set = HeaderSet::new();
        assert_eq!(set.version_id(), None);
        set.set_pretty_version("PasswordSafe V3.28").unwrap();
        assert_eq!(set.version_id(), Some(0x030A));
        assert!(matches!(set.set_pretty_version("Bogus version"), Err(Error::FieldValidation(_))));
    }

    #[test]
    fn upsert_singleton_replaces_not_duplicates() {
        let mut set = HeaderSet::new();
        set.set_db_name("first");
        set.set_db_name("second");
        assert_eq!(set.fields.iter().filter(|f| matches!(f, HeaderField::DbName(_))).count(), 1);
        assert_eq!(set.db_name(), Some("second"));
    }

    #[test]
    fn unknown_field_round_trips() {
        let field = HeaderField::decode(0x7e, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(field, HeaderField::Unknown(0x7e, vec![1, 2, 3, 4, 5]));
        assert_eq!(field.encode().unwrap(), vec![1, 2, 3, 4, 5]);
    }
}
