// aimdg-core/src/signing.rs
// ============================================================================
// Module: Proof Token Signing
// Description: Keyed-MAC authentication for canonical decision record bytes.
// Purpose: Produce and verify the `proof_token` field of a `DecisionRecord`.
// Dependencies: hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! A `proof_token` is `key_id (1 byte) || tag`, where `tag` is an
//! HMAC-SHA256 MAC over the canonical bytes that precede the token in the
//! wire format (§6). The key-id byte lets a verifier pick the right key out
//! of a small ring without guessing, which is what makes key rotation
//! possible without breaking tokens signed under the previous key.
//!
//! The signing key is read-only after gateway start (§5): rotation replaces
//! the whole [`SigningKeyRing`] behind a new `Arc`, never mutates key bytes
//! in place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::hashing::hex_encode;

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by signing or verifying a proof token.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The configured key material could not be used to initialize HMAC
    /// (HMAC-SHA256 accepts any key length, so this is effectively
    /// unreachable in practice but kept explicit rather than unwrapped).
    #[error("invalid signing key material")]
    InvalidKey,
    /// The proof token was shorter than a key-id byte plus a full tag.
    #[error("proof token is truncated: {len} bytes")]
    Truncated {
        /// Observed token length in bytes.
        len: usize,
    },
    /// The token's key-id byte does not match any key in the ring.
    #[error("unknown signing key id: {key_id}")]
    UnknownKeyId {
        /// The unrecognized key-id byte.
        key_id: u8,
    },
    /// The MAC did not verify against the supplied bytes.
    #[error("proof token failed verification")]
    Invalid,
}

// ============================================================================
// SECTION: Signing Key
// ============================================================================

/// A single keyed-MAC signing key, identified by a one-byte key id.
#[derive(Clone)]
pub struct SigningKey {
    key_id: u8,
    secret: Vec<u8>,
}

impl SigningKey {
    /// Creates a signing key from raw secret bytes.
    #[must_use]
    pub fn new(key_id: u8, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id,
            secret: secret.into(),
        }
    }

    /// Returns the key-id byte used to select this key during verification.
    #[must_use]
    pub const fn key_id(&self) -> u8 {
        self.key_id
    }
}

// ============================================================================
// SECTION: Signing Key Ring
// ============================================================================

/// An immutable set of signing keys: one current key used for new tokens,
/// plus any number of retired keys still accepted for verification during a
/// rotation window.
#[derive(Clone)]
pub struct SigningKeyRing {
    current: SigningKey,
    retired: Vec<SigningKey>,
}

impl SigningKeyRing {
    /// Creates a key ring with a single current key and no retired keys.
    #[must_use]
    pub fn new(current: SigningKey) -> Self {
        Self {
            current,
            retired: Vec::new(),
        }
    }

    /// Returns a new ring with `next` as the current key and the previous
    /// current key moved into the retired set, so tokens signed before
    /// rotation still verify.
    #[must_use]
    pub fn rotate(&self, next: SigningKey) -> Self {
        let mut retired = self.retired.clone();
        retired.push(self.current.clone());
        Self {
            current: next,
            retired,
        }
    }

    fn find(&self, key_id: u8) -> Option<&SigningKey> {
        if self.current.key_id == key_id {
            return Some(&self.current);
        }
        self.retired.iter().find(|key| key.key_id == key_id)
    }

    /// Computes `key_id || HMAC-SHA256(key, message)` using the current key.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::InvalidKey`] if HMAC initialization fails.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        let mut mac = HmacSha256::new_from_slice(&self.current.secret)
            .map_err(|_err| SigningError::InvalidKey)?;
        mac.update(message);
        let tag = mac.finalize().into_bytes();
        let mut token = Vec::with_capacity(1 + tag.len());
        token.push(self.current.key_id);
        token.extend_from_slice(&tag);
        Ok(token)
    }

    /// Verifies `token` as a proof over `message`, selecting the key by the
    /// token's leading key-id byte.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Truncated`] if the token is too short,
    /// [`SigningError::UnknownKeyId`] if no key in the ring matches the
    /// token's key-id byte, or [`SigningError::Invalid`] if the MAC does
    /// not match.
    pub fn verify(&self, message: &[u8], token: &[u8]) -> Result<(), SigningError> {
        if token.len() < 33 {
            return Err(SigningError::Truncated { len: token.len() });
        }
        let key_id = token[0];
        let tag = &token[1..];
        let key = self.find(key_id).ok_or(SigningError::UnknownKeyId { key_id })?;
        let mut mac =
            HmacSha256::new_from_slice(&key.secret).map_err(|_err| SigningError::InvalidKey)?;
        mac.update(message);
        let expected = mac.finalize().into_bytes();
        if expected.ct_eq(tag).unwrap_u8() == 1 {
            Ok(())
        } else {
            Err(SigningError::Invalid)
        }
    }
}

/// Formats a proof token as a lowercase hex string for logging/debugging.
#[must_use]
pub fn proof_token_hex(token: &[u8]) -> String {
    hex_encode(token)
}
