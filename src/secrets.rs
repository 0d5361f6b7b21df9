//! Secret-hygiene helpers built on the `secrets` crate: fixed-size secret
//! byte strings for the password, stretched key `P'`, and the unwrapped
//! `K`/`L` keys, plus an appendable secret buffer for the decrypted body
//! (which is credential data — titles, usernames, passwords, notes — and
//! gets zeroized on drop just like the keys that protect it).
//!
//! `SecretBuf` below is `third-party/pwsafer/src/secrets_vec.rs::SecretBuffer`
//! carried over close to verbatim; it was already exactly the "appendable
//! `secrets::SecretVec`" this crate needs for the body buffer.

use secrets::SecretVec;
use std::ops::{Deref, DerefMut};

/// A fixed-length secret byte string, e.g. a 32-byte key or a password.
pub struct SecretBytes {
    inner: SecretVec<u8>,
}

impl SecretBytes {
    pub fn zero(len: usize) -> Self {
        SecretBytes {
            inner: SecretVec::zero(len),
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        let mut out = SecretVec::zero(data.len());
        out.borrow_mut().copy_from_slice(data);
        SecretBytes { inner: out }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    pub fn borrow(&self) -> impl Deref<Target = [u8]> + '_ {
        self.inner.borrow()
    }

    pub fn borrow_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.inner.borrow_mut()
    }

    pub fn as_array32(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.inner.borrow()[..32]);
        out
    }

    pub fn as_array16(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out.copy_from_slice(&self.inner.borrow()[..16]);
        out
    }
}

/// An appendable version of `secrets::SecretVec`, for accumulating the
/// decrypted field-value stream (and, on write, the plaintext to encrypt)
/// without ever letting a plain `Vec<u8>` hold credential bytes.
pub struct SecretBuf {
    inner: SecretVec<u8>,
    len: usize,
}

impl SecretBuf {
    pub fn new() -> Self {
        SecretBuf {
            inner: SecretVec::zero(0),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn extend_from_slice(&mut self, data: &[u8]) {
        if let Some(newlen) = self.needs_grow(data) {
            self.relocate(newlen);
        }

        let mut inner = self.inner.borrow_mut();
        let len = data.len();
        inner[self.len..][..len].copy_from_slice(data);
        self.len += len;
    }

    pub fn as_slice(&self) -> SecretView<'_> {
        SecretView {
            guard: Box::new(self.inner.borrow()),
            len: self.len,
        }
    }

    fn relocate(&mut self, newlen: usize) {
        let copy = self.inner.len().min(self.len);
        let mut new: SecretVec<u8> = SecretVec::zero(newlen);
        {
            let mut into = new.borrow_mut();
            let from = self.inner.borrow();
            into[..copy].copy_from_slice(&from[..copy]);
        }
        self.inner = new;
    }

    fn needs_grow(&self, data: &[u8]) -> Option<usize> {
        Self::needs_grow_to(self.inner.len(), self.len, data.len())
    }

    fn needs_grow_to(capacity: usize, len: usize, extra: usize) -> Option<usize> {
        let new_len = len.checked_add(extra).expect("capacity overflow");
        const GROWTH_FACTOR: usize = 2;

        if capacity >= new_len {
            return None;
        }

        let new_cap = capacity.checked_mul(GROWTH_FACTOR).expect("capacity overflow");
        Some(new_cap.max(32).max(new_len))
    }
}

impl Default for SecretBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// A view into a `SecretBuf`, truncated to its logical length (the backing
/// `SecretVec` may have spare capacity from growth).
pub struct SecretView<'a> {
    guard: Box<dyn Deref<Target = [u8]> + 'a>,
    len: usize,
}

impl Deref for SecretView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard[..self.len]
    }
}
