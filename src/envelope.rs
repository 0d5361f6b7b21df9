//! The on-disk container: prologue, encrypted body, epilogue. Ties together
//! `key::stretch`, the ECB key wrap, and the CBC body cipher into
//! `open`/`seal` (`spec.md` §3, §4.6).
//!
//! Layout: `TAG(4) || SALT(32) || ITER(4 LE) || H(P')(32) || B1B2(32) ||
//! B3B4(32) || IV(16) || CIPHERTEXT(16n) || EOF_TAG(16) || HMAC(32)`.
//! Grounded on `third-party/pwsafer/src/{reader,writer}.rs`'s `prologue`
//! parsing and `finish()` writing, generalized so the HMAC is recomputed over
//! field *values* only (`stream::for_each_field_value_in_body`), matching
//! `spec.md`'s deliberate quirk rather than `reader.rs`'s byte-range HMAC.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hmac::Mac;
use rand::RngCore;
use std::io::{Cursor, Read, Write};

use crate::error::{Error, Result};
use crate::key;
use crate::primitives::{self, HmacSha256};
use crate::secrets::{SecretBuf, SecretBytes};

const TAG: &[u8; 4] = b"PWS3";
const EOF_TAG: &[u8; 16] = b"PWS3-EOFPWS3-EOF";

/// Everything recovered from a successfully-opened container: the
/// decrypted field stream plus the key material needed to re-seal it.
pub struct OpenedEnvelope {
    pub body: SecretBuf,
    pub salt: [u8; 32],
    pub iter: u32,
    pub key_k: SecretBytes,
    pub key_l: SecretBytes,
}

/// Parses and decrypts a whole container, checking the password hash and the
/// HMAC. Returns `Error::WrongPassword` or `Error::IntegrityFailure` as
/// appropriate; any structural problem is `Error::MalformedContainer`.
pub fn open(data: &[u8], password: &[u8]) -> Result<OpenedEnvelope> {
    let mut cursor = Cursor::new(data);

    let mut tag = [0u8; 4];
    cursor.read_exact(&mut tag).map_err(|_| Error::truncated("container tag"))?;
    if &tag != TAG {
        return Err(Error::IntegrityFailure("bad container tag"));
    }

    let mut salt = [0u8; 32];
    cursor.read_exact(&mut salt).map_err(|_| Error::truncated("salt"))?;

    let iter = cursor.read_u32::<LittleEndian>().map_err(|_| Error::truncated("iteration count"))?;
    if iter < key::MIN_ITERATIONS {
        return Err(Error::MalformedContainer("iteration count below minimum".into()));
    }

    let mut stored_hp = [0u8; 32];
    cursor.read_exact(&mut stored_hp).map_err(|_| Error::truncated("H(P')"))?;

    let mut wrapped_k = [0u8; 16];
    let mut wrapped_l = [0u8; 16];
    cursor.read_exact(&mut wrapped_k).map_err(|_| Error::truncated("wrapped K"))?;
    cursor.read_exact(&mut wrapped_l).map_err(|_| Error::truncated("wrapped L"))?;

    let mut iv = [0u8; 16];
    cursor.read_exact(&mut iv).map_err(|_| Error::truncated("IV"))?;

    let stretched = key::stretch(password, &salt, iter);
    let computed_hp = primitives::sha256(&stretched.borrow());
    if !primitives::ct_eq(&computed_hp, &stored_hp) {
        return Err(Error::WrongPassword);
    }

    let mut wrap_buf = [0u8; 32];
    wrap_buf[..16].copy_from_slice(&wrapped_k);
    wrap_buf[16..].copy_from_slice(&wrapped_l);
    primitives::ecb_decrypt_blocks(&stretched.borrow(), &mut wrap_buf)?;
    let key_k = SecretBytes::from_slice(&wrap_buf[..16]);
    let key_l = SecretBytes::from_slice(&wrap_buf[16..]);

    let remaining_start = cursor.position() as usize;
    let remaining = &data[remaining_start..];
    if remaining.len() < EOF_TAG.len() + 32 {
        return Err(Error::truncated("ciphertext/EOF tag/HMAC"));
    }
    let ciphertext_len = remaining.len() - EOF_TAG.len() - 32;
    if ciphertext_len % primitives::BLOCK_SIZE != 0 {
        return Err(Error::MalformedContainer("ciphertext length is not a multiple of 16".into()));
    }

    let ciphertext = &remaining[..ciphertext_len];
    let eof_tag = &remaining[ciphertext_len..ciphertext_len + EOF_TAG.len()];
    let stored_hmac = &remaining[ciphertext_len + EOF_TAG.len()..];

    if eof_tag != EOF_TAG {
        return Err(Error::IntegrityFailure("bad EOF tag"));
    }

    let mut plaintext = ciphertext.to_vec();
    primitives::cbc_decrypt(&key_k.borrow(), &iv, &mut plaintext)?;

    let mut mac = HmacSha256::new_from_slice(&key_l.borrow()).expect("HMAC accepts any key length");
    crate::stream::for_each_field_value_in_body(&plaintext, "body", |value| mac.update(value))?;
    mac.verify_slice(stored_hmac).map_err(|_| Error::IntegrityFailure("HMAC mismatch"))?;

    let mut body = SecretBuf::new();
    body.extend_from_slice(&plaintext);

    Ok(OpenedEnvelope {
        body,
        salt,
        iter,
        key_k,
        key_l,
    })
}

/// Encrypts `body` (the already-TLV-encoded header+record stream) and
/// writes a complete container, generating a fresh salt/K/L/IV and
/// re-deriving `P'` under `iter` rounds.
pub fn seal(body: &[u8], password: &[u8], iter: u32, rng: &mut impl RngCore) -> Result<Vec<u8>> {
    if body.len() % primitives::BLOCK_SIZE != 0 {
        return Err(Error::MalformedContainer("plaintext body is not block-aligned".into()));
    }

    let mut salt = [0u8; 32];
    rng.fill_bytes(&mut salt);

    let mut wrap_buf = [0u8; 32];
    rng.fill_bytes(&mut wrap_buf);
    let key_k = SecretBytes::from_slice(&wrap_buf[..16]);
    let key_l = SecretBytes::from_slice(&wrap_buf[16..]);

    let mut iv = [0u8; 16];
    rng.fill_bytes(&mut iv);

    let stretched = key::stretch(password, &salt, iter);
    let hp = primitives::sha256(&stretched.borrow());

    primitives::ecb_encrypt_blocks(&stretched.borrow(), &mut wrap_buf)?;

    let mut mac = HmacSha256::new_from_slice(&key_l.borrow()).expect("HMAC accepts any key length");
    crate::stream::for_each_field_value_in_body(body, "body", |value| mac.update(value))?;
    let hmac = mac.finalize().into_bytes();

    let mut ciphertext = body.to_vec();
    primitives::cbc_encrypt(&key_k.borrow(), &iv, &mut ciphertext)?;

    let mut out = Vec::with_capacity(4 + 32 + 4 + 32 + 32 + 16 + ciphertext.len() + 16 + 32);
    out.write_all(TAG).map_err(Error::Io)?;
    out.write_all(&salt).map_err(Error::Io)?;
    out.write_u32::<LittleEndian>(iter).map_err(Error::Io)?;
    out.write_all(&hp).map_err(Error::Io)?;
    out.write_all(&wrap_buf).map_err(Error::Io)?;
    out.write_all(&iv).map_err(Error::Io)?;
    out.write_all(&ciphertext).map_err(Error::Io)?;
    out.write_all(EOF_TAG).map_err(Error::Io)?;
    out.write_all(&hmac).map_err(Error::Io)?;

    Ok(out)
}
