//! AES-256-GCM envelope encryption of private-key strings.
//!
//! This module has no HTTP or chain dependencies.
//! The operator secret is passed in by the caller; nothing here reads the
//! environment.
//!
//! # Envelope format
//!
//! ```text
//! <base64(iv)>:<base64(tag)>:<base64(ciphertext)>
//! ```
//!
//! Standard base64 alphabet with padding, which never contains `:`. The key is
//! `SHA-256(secret)`, derived per call.

pub mod envelope;
pub mod secret;

pub use envelope::EnvelopeCodec;
pub use secret::{Plaintext, Secret};
