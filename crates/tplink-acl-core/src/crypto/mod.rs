//! Cryptographic primitives used by the router protocol.
//!
//! - [`rsa_key`]: RSA public keys handed out by the router, PKCS#1 v1.5
//!   encryption and block-size aware chunking
//! - [`aes_cbc`]: the client-generated AES-128-CBC session key
//!
//! The remaining helpers are thin wrappers over `md-5`, `hex` and `base64`
//! that map failures into [`Error`].

pub mod aes_cbc;
pub mod rsa_key;

pub use aes_cbc::AesSessionKey;
pub use rsa_key::RsaKey;

use base64::{Engine, engine::general_purpose::STANDARD};
use md5::{Digest, Md5};

use crate::error::Error;

/// Compute MD5 hash and return as hex string.
pub fn md5_hex(data: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Base64 encode bytes.
pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Base64 decode string.
pub fn base64_decode(data: &str) -> Result<Vec<u8>, Error> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| Error::Protocol(format!("Base64 decode failed: {}", e)))
}
