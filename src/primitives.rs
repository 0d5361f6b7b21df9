//! Cryptographic building blocks: SHA-256, HMAC-SHA-256, and Twofish in the
//! two modes the envelope needs (ECB for the 32-byte key wrap, CBC for the
//! body). No padding is ever added here; callers own block alignment.
//!
//! Grounded on `third-party/pwsafer/src/{reader,writer}.rs`, which reach for
//! `sha2`, `hmac`, `twofish`, and the `cbc`/`block-padding` crate pair. The
//! ECB half is implemented the way `writer.rs` already does it: by hand, one
//! 16-byte block at a time through `BlockEncrypt`/`BlockDecrypt`, since the
//! two blocks being wrapped are independent and there is no chaining to get
//! wrong. `reader.rs` additionally pulls in the older `block_modes` crate for
//! its own ECB/CBC calls; that crate isn't in this package's dependency list
//! so both directions are unified here on the `cipher` 0.4 traits that
//! `writer.rs` and the `Cargo.toml` already commit to.

use block_padding::ZeroPadding;
use hmac::Hmac;
use sha2::{Digest, Sha256};
use twofish::cipher::crypto_common::generic_array::GenericArray;
use twofish::cipher::crypto_common::{KeyInit, KeyIvInit};
use twofish::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut};
use twofish::Twofish;

use crate::error::{Error, Result};

pub const BLOCK_SIZE: usize = 16;

pub type HmacSha256 = Hmac<Sha256>;
type TwofishCbcEnc = cbc::Encryptor<Twofish>;
type TwofishCbcDec = cbc::Decryptor<Twofish>;

/// `SHA256(data)`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA256(a || b)`, without needing to concatenate the inputs first.
pub fn sha256_concat(a: &[u8], b: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}

/// Constant-time comparison of two equal-length byte strings.
///
/// `spec.md` requires this for both the password-hash check and the HMAC
/// check. `hmac::Mac::verify_slice` already does this internally for the
/// HMAC side; this function gives the password-hash comparison the same
/// property, which the upstream `pwsafer::reader` does not (it compares with
/// a plain `!=` on byte slices).
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Encrypts exactly one 16-byte block in place under raw Twofish-ECB.
pub fn ecb_encrypt_block(key: &[u8], block: &mut [u8; BLOCK_SIZE]) -> Result<()> {
    let cipher = twofish_cipher(key)?;
    cipher.encrypt_block(GenericArray::from_mut_slice(block));
    Ok(())
}

/// Decrypts exactly one 16-byte block in place under raw Twofish-ECB.
pub fn ecb_decrypt_block(key: &[u8], block: &mut [u8; BLOCK_SIZE]) -> Result<()> {
    let cipher = twofish_cipher(key)?;
    cipher.decrypt_block(GenericArray::from_mut_slice(block));
    Ok(())
}

/// Encrypts every 16-byte chunk of `data` independently under Twofish-ECB.
///
/// Used only for the 32-byte `K`/`L` key wrap, where `data` is two
/// independent random blocks concatenated — never for anything where block
/// chaining would matter.
pub fn ecb_encrypt_blocks(key: &[u8], data: &mut [u8]) -> Result<()> {
    let cipher = twofish_cipher(key)?;
    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(())
}

/// Inverse of [`ecb_encrypt_blocks`].
pub fn ecb_decrypt_blocks(key: &[u8], data: &mut [u8]) -> Result<()> {
    let cipher = twofish_cipher(key)?;
    for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
    Ok(())
}

/// Encrypts `data` in place under Twofish-CBC. `data.len()` must already be
/// a positive multiple of 16; no padding is added.
pub fn cbc_encrypt(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<()> {
    let cipher = TwofishCbcEnc::new_from_slices(key, iv)
        .map_err(|_| Error::MalformedContainer("invalid CBC key/iv length".into()))?;
    let len = data.len();
    cipher
        .encrypt_padded_mut::<ZeroPadding>(data, len)
        .map_err(|_| Error::MalformedContainer("ciphertext length is not block-aligned".into()))?;
    Ok(())
}

/// Decrypts `data` in place under Twofish-CBC. `data.len()` must already be
/// a positive multiple of 16.
pub fn cbc_decrypt(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &mut [u8]) -> Result<()> {
    let cipher = TwofishCbcDec::new_from_slices(key, iv)
        .map_err(|_| Error::MalformedContainer("invalid CBC key/iv length".into()))?;
    cipher
        .decrypt_padded_mut::<ZeroPadding>(data)
        .map_err(|_| Error::MalformedContainer("ciphertext length is not block-aligned".into()))?;
    Ok(())
}

fn twofish_cipher(key: &[u8]) -> Result<Twofish> {
    Twofish::new_from_slice(key).map_err(|_| Error::MalformedContainer("invalid cipher key length".into()))
}
