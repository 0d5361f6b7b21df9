//! Error kinds produced by the core and façade.
//!
//! Mirrors `pwsafer::reader::Error` in shape (tag/password/header/io/mac
//! variants) but widened to the full kind list the format needs: a wrong
//! container tag and a bad HMAC are different failures from a bad password,
//! and lockfile/filesystem/validation failures need their own names too.

use std::io;

/// A specialized `Result` for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `H(P')` did not match the stored authenticator; the password is wrong.
    #[error("invalid password")]
    WrongPassword,

    /// HMAC mismatch, bad `EOF_TAG`, or bad `TAG` — the container failed to
    /// authenticate even though a password was accepted (or was never
    /// checked, e.g. a corrupted tag).
    #[error("integrity check failed: {0}")]
    IntegrityFailure(&'static str),

    /// Truncated TLV stream, a ciphertext length that is not a positive
    /// multiple of 16, a missing terminator, or a field length that
    /// overflows the remaining bytes.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// An unrecognized field type. Recoverable: the field is preserved as
    /// opaque bytes and this variant is never raised on a normal read; it
    /// exists for callers that want to reject unknown fields explicitly.
    #[error("unsupported field type {0:#04x}")]
    UnsupportedField(u8),

    /// A write was attempted on a safe opened read-only.
    #[error("safe is open read-only")]
    ReadOnly,

    /// Lockfile already held by a live process.
    #[error("database is already locked by {0}")]
    AlreadyLocked(String),

    /// This process already holds the lock (double-acquire).
    #[error("lock already acquired")]
    LockAlreadyAcquired,

    /// Lock release attempted but no lockfile was held.
    #[error("not locked")]
    NotLocked,

    /// Filesystem permission error distinct from a generic I/O error.
    #[error("access denied: {0}")]
    AccessDenied(io::Error),

    /// A UUID lookup (record, recent-entry, ...) found nothing.
    #[error("not found")]
    NotFound,

    /// A caller-supplied value failed field-specific validation (e.g. an
    /// unparseable pretty version string).
    #[error("invalid field value: {0}")]
    FieldValidation(String),

    /// Any other I/O error (short read, disk full, ...).
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn truncated(what: &str) -> Error {
        Error::MalformedContainer(format!("truncated stream while reading {what}"))
    }
}
