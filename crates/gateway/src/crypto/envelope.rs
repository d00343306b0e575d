//! AES-256-GCM sealing of a UTF-8 string into an [`EncryptedEnvelope`].
//!
//! **Never reuse an IV under the same key.** GCM nonce reuse breaks both
//! confidentiality and authentication, so every [`EnvelopeCodec::encrypt`]
//! call draws a fresh 96-bit IV from the OS CSPRNG.

use std::{fmt, str::FromStr};

use aes_gcm::{
    aead::{AeadCore, AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::ServiceError;
use thiserror::Error;

use super::secret::{Plaintext, Secret, SymmetricKey};

/// Byte length of an AES-GCM IV (12 bytes = 96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Separator between the three base64 segments.
pub const DELIMITER: char = ':';

/// Errors produced by the envelope layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Wrong segment count, bad base64, wrong IV/tag length, or non-UTF-8 plaintext.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),

    /// The GCM tag did not verify.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// AES-GCM encryption failed.
    #[error("aead encryption failed")]
    EncryptionFailed,
}

impl From<CipherError> for ServiceError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::MalformedEnvelope(reason) => ServiceError::MalformedEnvelope(reason.into()),
            CipherError::AuthenticationFailed => ServiceError::AuthenticationFailed,
            CipherError::EncryptionFailed => ServiceError::Internal(err.to_string()),
        }
    }
}

/// A parsed envelope: IV, tag and ciphertext as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl fmt::Display for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{DELIMITER}{}",
            STANDARD.encode(self.iv),
            STANDARD.encode(self.tag),
            STANDARD.encode(&self.ciphertext),
        )
    }
}

impl FromStr for EncryptedEnvelope {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(DELIMITER).collect();
        let [iv, tag, ciphertext] = parts.as_slice() else {
            return Err(CipherError::MalformedEnvelope("expected three segments"));
        };

        let iv = decode_fixed::<IV_LEN>(iv, "iv is not base64", "iv has wrong length")?;
        let tag = decode_fixed::<TAG_LEN>(tag, "tag is not base64", "tag has wrong length")?;
        let ciphertext = STANDARD
            .decode(ciphertext)
            .map_err(|_| CipherError::MalformedEnvelope("ciphertext is not base64"))?;

        Ok(Self { iv, tag, ciphertext })
    }
}

fn decode_fixed<const N: usize>(
    segment: &str,
    not_base64: &'static str,
    wrong_length: &'static str,
) -> Result<[u8; N], CipherError> {
    let bytes = STANDARD
        .decode(segment)
        .map_err(|_| CipherError::MalformedEnvelope(not_base64))?;
    bytes
        .try_into()
        .map_err(|_| CipherError::MalformedEnvelope(wrong_length))
}

/// Encrypts and decrypts envelopes under a key derived from one secret.
///
/// The secret is injected at construction. The AES key is derived on every
/// call and dropped (zeroed) when the call returns.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    secret: Secret,
}

impl EnvelopeCodec {
    pub fn new(secret: Secret) -> Self {
        Self { secret }
    }

    /// Seal `plain_text` and return the envelope string.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::EncryptionFailed`] if the AEAD primitive fails,
    /// which does not happen for valid keys and inputs.
    pub fn encrypt(&self, plain_text: &str) -> Result<String, CipherError> {
        self.seal(plain_text.as_bytes()).map(|e| e.to_string())
    }

    /// Seal raw bytes into a structured [`EncryptedEnvelope`].
    pub fn seal(&self, plain: &[u8]) -> Result<EncryptedEnvelope, CipherError> {
        let key = self.secret.derive_key();
        let cipher = build_cipher(&key);

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut buffer = plain.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&nonce);
        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(&tag);

        Ok(EncryptedEnvelope {
            iv,
            tag: tag_bytes,
            ciphertext: buffer,
        })
    }

    /// Parse and open an envelope string.
    ///
    /// # Errors
    ///
    /// - [`CipherError::MalformedEnvelope`] for structural defects, checked
    ///   before any key is derived.
    /// - [`CipherError::AuthenticationFailed`] if the tag does not verify
    ///   (wrong secret, corrupted or tampered data).
    pub fn decrypt(&self, envelope: &str) -> Result<Plaintext, CipherError> {
        let parsed: EncryptedEnvelope = envelope.parse()?;
        self.open(&parsed)
    }

    /// Open an already-parsed envelope.
    pub fn open(&self, envelope: &EncryptedEnvelope) -> Result<Plaintext, CipherError> {
        let key = self.secret.derive_key();
        let cipher = build_cipher(&key);

        let mut buffer = envelope.ciphertext.clone();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&envelope.iv),
                b"",
                &mut buffer,
                Tag::from_slice(&envelope.tag),
            )
            .map_err(|_| CipherError::AuthenticationFailed)?;

        Plaintext::from_utf8(buffer).ok_or(CipherError::MalformedEnvelope("plaintext is not UTF-8"))
    }
}

fn build_cipher(key: &SymmetricKey) -> Aes256Gcm {
    Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn codec(secret: &str) -> EnvelopeCodec {
        EnvelopeCodec::new(Secret::new(secret))
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let c = codec("op-secret");
        let long = "x".repeat(4096);
        for text in ["", "a", "0x04a1b2c3d4e5f6", "ключ 🔑 with unicode", long.as_str()] {
            let envelope = c.encrypt(text).unwrap();
            assert_eq!(c.decrypt(&envelope).unwrap().expose(), text);
        }
    }

    #[test]
    fn concrete_scenario() {
        let envelope = codec("op-secret").encrypt("my-secret-key-data").unwrap();
        assert_eq!(envelope.matches(':').count(), 2);
        assert_eq!(
            codec("op-secret").decrypt(&envelope).unwrap().expose(),
            "my-secret-key-data"
        );
        assert!(matches!(
            codec("wrong-secret").decrypt(&envelope),
            Err(CipherError::AuthenticationFailed)
        ));
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let envelope = codec("k1").encrypt("secret").unwrap();
        for other in ["k2", "", "k1 ", "K1"] {
            assert!(matches!(
                codec(other).decrypt(&envelope),
                Err(CipherError::AuthenticationFailed)
            ));
        }
    }

    #[test]
    fn every_flipped_ciphertext_bit_is_detected() {
        let c = codec("op-secret");
        let sealed = c.seal(b"tamper me").unwrap();
        for byte in 0..sealed.ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered.ciphertext[byte] ^= 1 << bit;
                assert!(matches!(
                    c.open(&tampered),
                    Err(CipherError::AuthenticationFailed)
                ));
            }
        }
    }

    #[test]
    fn every_flipped_tag_bit_is_detected() {
        let c = codec("op-secret");
        let sealed = c.seal(b"tamper me").unwrap();
        for byte in 0..TAG_LEN {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered.tag[byte] ^= 1 << bit;
                let envelope = tampered.to_string();
                assert!(matches!(
                    c.decrypt(&envelope),
                    Err(CipherError::AuthenticationFailed)
                ));
            }
        }
    }

    #[test]
    fn flipped_iv_is_detected() {
        let c = codec("op-secret");
        let mut sealed = c.seal(b"tamper me").unwrap();
        sealed.iv[0] ^= 0x01;
        assert!(matches!(c.open(&sealed), Err(CipherError::AuthenticationFailed)));
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let c = codec("op-secret");
        let valid = c.encrypt("x").unwrap();
        let cases = [
            String::new(),
            "abc".to_owned(),
            "a:b".to_owned(),
            format!("{valid}:extra"),
            "::::".to_owned(),
        ];
        for case in cases {
            assert!(
                matches!(c.decrypt(&case), Err(CipherError::MalformedEnvelope(_))),
                "expected malformed for {case:?}"
            );
        }
    }

    #[test]
    fn bad_base64_is_malformed() {
        let c = codec("op-secret");
        let valid = c.encrypt("x").unwrap();
        let parts: Vec<&str> = valid.split(':').collect();
        for envelope in [
            format!("!!!:{}:{}", parts[1], parts[2]),
            format!("{}:%%%:{}", parts[0], parts[2]),
            format!("{}:{}:***", parts[0], parts[1]),
        ] {
            assert!(matches!(
                c.decrypt(&envelope),
                Err(CipherError::MalformedEnvelope(_))
            ));
        }
    }

    #[test]
    fn wrong_iv_or_tag_length_is_malformed() {
        let short = STANDARD.encode([0u8; 8]);
        let iv = STANDARD.encode([0u8; IV_LEN]);
        let tag = STANDARD.encode([0u8; TAG_LEN]);
        assert!(matches!(
            format!("{short}:{tag}:AAAA").parse::<EncryptedEnvelope>(),
            Err(CipherError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            format!("{iv}:{short}:AAAA").parse::<EncryptedEnvelope>(),
            Err(CipherError::MalformedEnvelope(_))
        ));
        assert!(format!("{iv}:{tag}:AAAA").parse::<EncryptedEnvelope>().is_ok());
    }

    #[test]
    fn ivs_are_unique_across_calls() {
        let c = codec("op-secret");
        let ivs: HashSet<String> = (0..10_000)
            .map(|_| {
                let envelope = c.encrypt("same plaintext").unwrap();
                envelope.split(':').next().unwrap().to_owned()
            })
            .collect();
        assert_eq!(ivs.len(), 10_000);
    }

    #[test]
    fn display_parse_round_trip() {
        let sealed = codec("op-secret").seal(b"hello").unwrap();
        let parsed: EncryptedEnvelope = sealed.to_string().parse().unwrap();
        assert_eq!(parsed, sealed);
    }

    #[test]
    fn decrypts_envelope_sealed_by_node_crypto() {
        // aes-256-gcm via Node's `crypto`, key = sha256("op-secret"),
        // iv = 000102030405060708090a0b.
        let envelope = "AAECAwQFBgcICQoL:1NQgPSmHlniN3YvepZ7kZA==:qxSLh/TrMQX+Izw9KIYEnIUd";
        assert_eq!(
            codec("op-secret").decrypt(envelope).unwrap().expose(),
            "my-secret-key-data"
        );
    }

    #[test]
    fn cipher_errors_map_to_service_errors() {
        assert!(matches!(
            ServiceError::from(CipherError::MalformedEnvelope("x")),
            ServiceError::MalformedEnvelope(_)
        ));
        assert!(matches!(
            ServiceError::from(CipherError::AuthenticationFailed),
            ServiceError::AuthenticationFailed
        ));
    }
}
