//! Read and write Password Safe v3 (`.psafe3`) database files.
//!
//! The core is the cryptographic envelope (key stretching, key unwrap/wrap,
//! Twofish-CBC body crypto, HMAC authentication), the block-aligned TLV
//! stream shared by headers and records, and the header/record object model.
//! [`Safe`] is the façade most callers want.

pub mod codecs;
pub mod envelope;
pub mod error;
pub mod header;
pub mod key;
pub mod lockfile;
pub mod primitives;
pub mod record;
mod safe;
pub mod secrets;
pub mod stream;

pub use error::{Error, Result};
pub use header::{HeaderField, HeaderSet};
pub use record::{Record, RecordField, RecordSet};
pub use safe::{Safe, APP_IDENTIFIER};
