//! End-to-end tests against the façade, synthesizing fixtures in-test via
//! `Safe`'s own writer half (no real `.psafe3` sample files were available to
//! fetch for this build). Covers `spec.md` §8's invariants and concrete
//! scenarios S1–S6.

use pwsafe3::codecs::policy::{PasswordPolicy, PolicyFlags};
use pwsafe3::codecs::prefs::{PrefValue, Preference};
use pwsafe3::{Error, HeaderField, Record, RecordField, Safe};
use uuid::Uuid;

fn temp_path(name: &str) -> std::path::PathBuf {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::mem::forget(dir);
    path
}

#[test]
fn s1_empty_groups() {
    let path = temp_path("s1.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    safe.headers_mut().unwrap().add_empty_group("asdf");
    safe.headers_mut().unwrap().add_empty_group("fdas");
    assert_eq!(safe.headers().empty_groups(), vec!["asdf", "fdas"]);

    safe.headers_mut().unwrap().add_empty_group("bogus5324");
    assert_eq!(safe.headers().empty_groups(), vec!["asdf", "fdas", "bogus5324"]);

    safe.save(false).unwrap();
    let reopened = Safe::open(&path, b"bogus12345", true).unwrap();
    assert_eq!(reopened.headers().empty_groups(), vec!["asdf", "fdas", "bogus5324"]);
}

#[test]
fn s2_last_save_user_dual_write() {
    let path = temp_path("s2.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    safe.headers_mut().unwrap().upsert_singleton(HeaderField::LastSaveUser("gpmidi".into()));
    safe.save(false).unwrap();

    let mut safe = Safe::open(&path, b"bogus12345", false).unwrap();
    assert_eq!(safe.headers().last_save_user(), Some("gpmidi"));
    assert_eq!(safe.headers().who_last_saved(), None);

    safe.headers_mut().unwrap().set_last_save_user("user123", true);
    assert_eq!(safe.headers().last_save_user(), Some("user123"));
    assert_eq!(safe.headers().who_last_saved(), Some("user123"));

    safe.save(false).unwrap();
    let reopened = Safe::open(&path, b"bogus12345", true).unwrap();
    assert_eq!(reopened.headers().last_save_user(), Some("user123"));
    assert_eq!(reopened.headers().who_last_saved(), Some("user123"));
}

#[test]
fn s3_non_default_prefs() {
    let path = temp_path("s3.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();

    let mut prefs = Vec::new();
    for id in 0..30 {
        let value = match id % 3 {
            0 => PrefValue::Bool(id % 2 == 0),
            1 => PrefValue::Int(id as i64 - 15),
            _ => PrefValue::Str(format!("pref-{id}")),
        };
        prefs.push(Preference::database(id, value));
    }
    safe.headers_mut().unwrap().set_non_default_prefs(prefs.clone());
    safe.save(false).unwrap();

    let reopened = Safe::open(&path, b"bogus12345", true).unwrap();
    let loaded = reopened.headers().non_default_prefs();
    assert_eq!(loaded.len(), 30);
    assert_eq!(loaded, prefs);
}

#[test]
fn s4_password_policy_hex() {
    let path = temp_path("s4.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();

    let policy = PasswordPolicy {
        name: "Policy Hex".into(),
        flags: PolicyFlags::HEX,
        total_length: 20,
        min_lowercase: 1,
        min_uppercase: 1,
        min_digits: 1,
        min_symbols: 1,
        symbol_set: "+-=_@#$%^&;:,.<>/~\\[](){}?!|".into(),
    };
    safe.headers_mut().unwrap().set_named_policies(vec![policy.clone()]);
    safe.save(false).unwrap();

    let reopened = Safe::open(&path, b"bogus12345", true).unwrap();
    let policies = reopened.headers().named_policies();
    assert_eq!(policies.len(), 1);
    assert_eq!(policies[0], policy);
    assert!(policies[0].flags.contains(PolicyFlags::HEX));
    assert!(!policies[0].flags.contains(PolicyFlags::LOWERCASE));
}

#[test]
fn s5_version_pretty_string() {
    let path = temp_path("s5.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    assert_eq!(safe.headers().version_id(), None);

    safe.headers_mut().unwrap().set_pretty_version("PasswordSafe V3.28").unwrap();
    assert_eq!(safe.headers().version_id(), Some(0x030A));

    let err = safe.headers_mut().unwrap().set_pretty_version("Bogus version").unwrap_err();
    assert!(matches!(err, Error::FieldValidation(_)));
}

#[test]
fn s6_new_safe_create_add_save_reopen() {
    let path = temp_path("s6.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    let uuid = Uuid::new_v4();
    safe.add_record(Record::new(uuid, "t", "p")).unwrap();
    safe.save(true).unwrap();

    let reopened = Safe::open(&path, b"bogus12345", true).unwrap();
    let record = reopened.records().find(uuid).unwrap();
    assert_eq!(record.title(), Some("t"));
    assert_eq!(record.password(), Some("p"));
}

#[test]
fn property_1_round_trip_with_suppressed_metadata_is_structurally_stable() {
    let path = temp_path("roundtrip.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    safe.headers_mut().unwrap().set_db_name("Example");
    safe.add_record(Record::new(Uuid::new_v4(), "t", "p")).unwrap();
    safe.save(false).unwrap();

    let first_bytes = std::fs::read(&path).unwrap();
    let mut reloaded = Safe::open(&path, b"bogus12345", false).unwrap();
    reloaded.save(false).unwrap();
    let second_bytes = std::fs::read(&path).unwrap();

    // Ciphertext/salt differ (fresh IV/salt each save) but the decrypted
    // structure must be identical.
    let a = Safe::open(&path, b"bogus12345", true).unwrap();
    assert_eq!(a.headers().db_name(), Some("Example"));
    assert_eq!(a.records().len(), 1);
    assert!(!first_bytes.is_empty() && !second_bytes.is_empty());
}

#[test]
fn property_2_hmac_coverage_bit_flip_breaks_integrity() {
    let path = temp_path("hmac.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    safe.add_record(Record::new(Uuid::new_v4(), "t", "p")).unwrap();
    safe.save(true).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last / 2] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    let result = Safe::open(&path, b"bogus12345", true);
    assert!(matches!(result, Err(Error::IntegrityFailure(_)) | Err(Error::MalformedContainer(_))));
}

#[test]
fn property_3_password_check_precedes_record_decoding() {
    let path = temp_path("password.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    safe.add_record(Record::new(Uuid::new_v4(), "t", "p")).unwrap();
    safe.save(true).unwrap();

    assert!(matches!(Safe::open(&path, b"wrong-password", true), Err(Error::WrongPassword)));
}

#[test]
fn property_5_monotone_stretch_is_deterministic_across_loads() {
    let path = temp_path("stretch.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    safe.add_record(Record::new(Uuid::new_v4(), "t", "p")).unwrap();
    safe.save(true).unwrap();

    let a = Safe::open(&path, b"bogus12345", true).unwrap();
    let b = Safe::open(&path, b"bogus12345", true).unwrap();
    assert_eq!(a.records().records().len(), b.records().records().len());
}

#[test]
fn property_7_unknown_header_field_survives_round_trip() {
    let path = temp_path("unknown.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    let payload: Vec<u8> = (0..37u8).collect();
    safe.headers_mut().unwrap().append_repeatable(HeaderField::Unknown(0x7e, payload.clone()));
    safe.save(false).unwrap();

    let reopened = Safe::open(&path, b"bogus12345", true).unwrap();
    assert!(reopened
        .headers()
        .fields()
        .iter()
        .any(|f| matches!(f, HeaderField::Unknown(0x7e, bytes) if bytes == &payload)));
}

#[test]
fn record_with_unknown_field_survives_round_trip() {
    let path = temp_path("unknown_record.psafe3");
    let mut safe = Safe::create_new(&path, b"bogus12345").unwrap();
    let uuid = Uuid::new_v4();
    let mut record = Record::new(uuid, "t", "p");
    record.push(RecordField::Unknown(0x7d, vec![1, 2, 3, 4, 5]));
    safe.add_record(record).unwrap();
    safe.save(true).unwrap();

    let reopened = Safe::open(&path, b"bogus12345", true).unwrap();
    let record = reopened.records().find(uuid).unwrap();
    assert!(record.fields().iter().any(|f| matches!(f, RecordField::Unknown(0x7d, v) if v == &[1, 2, 3, 4, 5])));
}
