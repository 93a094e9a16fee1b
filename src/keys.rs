//! Key utilities
//!
//! Stateless helpers over an engine's [`KeyPrimitives`]. Keys travel as
//! standard padded base64 (44 characters for 32 bytes), the same form
//! `wg genkey` prints.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

use crate::engine::{KeyPrimitives, KEY_LEN};
use crate::error::KeyError;

// ============================================================================
// Key Generation Functions
// ============================================================================

/// Generate a new raw private key
///
/// Returns 32 random bytes, clamped for X25519.
pub fn generate_secret_key<K: KeyPrimitives + ?Sized>(keys: &K) -> [u8; KEY_LEN] {
    keys.secret_key()
}

/// Generate a new private key as base64
///
/// # Example
///
/// ```
/// use wg_bridge::engine::BoringtunEngine;
/// use wg_bridge::keys::generate_secret_key_base64;
///
/// let private_key = generate_secret_key_base64(&BoringtunEngine::new());
/// assert_eq!(private_key.len(), 44);
/// assert!(private_key.ends_with('='));
/// ```
pub fn generate_secret_key_base64<K: KeyPrimitives + ?Sized>(keys: &K) -> String {
    keys.key_to_base64(&keys.secret_key())
}

/// Derive the base64 public key for a raw private key
///
/// # Arguments
///
/// * `private_key` - raw private key bytes
///
/// # Errors
///
/// Returns `KeyError::InvalidKeyLength` unless `private_key` is exactly 32
/// bytes.
pub fn public_key_from<K: KeyPrimitives + ?Sized>(
    keys: &K,
    private_key: &[u8],
) -> Result<String, KeyError> {
    let secret = <[u8; KEY_LEN]>::try_from(private_key)
        .map_err(|_| KeyError::InvalidKeyLength(private_key.len()))?;
    Ok(keys.key_to_base64(&keys.public_key(&secret)))
}

/// Derive the base64 public key for a base64 private key
///
/// # Errors
///
/// Returns `KeyError::InvalidBase64` if the input does not decode and
/// `KeyError::InvalidKeyLength` if it decodes to anything but 32 bytes.
///
/// # Example
///
/// ```
/// use wg_bridge::engine::BoringtunEngine;
/// use wg_bridge::keys::{generate_secret_key_base64, public_key_from_base64};
///
/// let engine = BoringtunEngine::new();
/// let private_key = generate_secret_key_base64(&engine);
/// let public_key = public_key_from_base64(&engine, &private_key).unwrap();
/// assert_eq!(public_key.len(), 44);
/// ```
pub fn public_key_from_base64<K: KeyPrimitives + ?Sized>(
    keys: &K,
    private_key: &str,
) -> Result<String, KeyError> {
    let bytes = BASE64
        .decode(private_key.trim())
        .map_err(|e| KeyError::InvalidBase64(e.to_string()))?;
    public_key_from(keys, &bytes)
}

/// Base64 private/public key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

/// Generate a fresh key pair
pub fn generate_key_pair<K: KeyPrimitives + ?Sized>(keys: &K) -> KeyPair {
    let secret = keys.secret_key();
    KeyPair {
        private_key: keys.key_to_base64(&secret),
        public_key: keys.key_to_base64(&keys.public_key(&secret)),
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Whether `key` is base64 that decodes to a 32-byte X25519 key
///
/// Never fails; anything malformed is simply `false`.
pub fn is_valid_base64_x25519_key<K: KeyPrimitives + ?Sized>(keys: &K, key: &str) -> bool {
    keys.check_base64_key(key)
}

/// Host-facing name for [`is_valid_base64_x25519_key`]
pub fn check_base64_encoded_x25519_key<K: KeyPrimitives + ?Sized>(keys: &K, key: &str) -> bool {
    is_valid_base64_x25519_key(keys, key)
}

/// Whether raw bytes form a usable key
///
/// The bytes are encoded and run through the same validator as string
/// keys, so the two checks can never disagree.
pub fn check_valid_key_bytes<K: KeyPrimitives + ?Sized>(keys: &K, key: &[u8]) -> bool {
    keys.check_base64_key(&BASE64.encode(key))
}
