//! Buffers that hold sensitive bytes: the operator secret, derived keys and
//! decrypted plaintext.
//!
//! All three hold their bytes in [`Zeroizing`] buffers, so they are
//! overwritten on drop, and print as `[REDACTED]`.

use std::fmt;

use serde::Deserialize;
use sha2::digest::generic_array::GenericArray;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Operator-supplied shared secret used for key derivation.
///
/// Deserialises from a plain string so it can sit directly in
/// [`Config`](crate::config::Config).
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub struct Secret(Zeroizing<Vec<u8>>);

impl Secret {
    /// Takes ownership of the string's allocation without copying it.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into().into_bytes()))
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(u8::is_ascii_whitespace)
    }

    /// Derive the AES key: `SHA-256(secret)`.
    pub(crate) fn derive_key(&self) -> SymmetricKey {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        Sha256::new()
            .chain_update(self.0.as_slice())
            .finalize_into(GenericArray::from_mut_slice(&mut key[..]));
        SymmetricKey(key)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Fixed-size AES-256 key, scoped to a single encrypt or decrypt call.
pub(crate) struct SymmetricKey(Zeroizing<[u8; KEY_LEN]>);

impl SymmetricKey {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Decrypted UTF-8 text, typically a private key.
///
/// Only constructed from bytes already checked to be UTF-8.
pub struct Plaintext(Zeroizing<Vec<u8>>);

impl Plaintext {
    /// `None` if `bytes` is not UTF-8; the rejected bytes are wiped.
    pub(crate) fn from_utf8(bytes: Vec<u8>) -> Option<Self> {
        let plain = Self(Zeroizing::new(bytes));
        std::str::from_utf8(&plain.0).is_ok().then_some(plain)
    }

    /// Borrow the text. Keep the borrow short and never log it.
    pub fn expose(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Plaintext([REDACTED])")
    }
}
