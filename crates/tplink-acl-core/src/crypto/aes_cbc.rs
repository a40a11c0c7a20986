//! AES-128-CBC session key shared between client and router.
//!
//! The client invents the key, sends it to the router inside the RSA
//! encrypted login signature, and from then on both sides encrypt request
//! and response bodies with it (PKCS#7 padding).
//!
//! Like the router's web front end, the key and IV are each 16 ASCII hex
//! digits. Those characters are what goes into the signature (`k=`, `i=`)
//! and, taken byte for byte, are also the raw AES key and IV.

use std::fmt;

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::RngCore;

use crate::error::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Key and IV length in bytes.
pub const KEY_LEN: usize = 16;

/// A client-generated AES-128-CBC key and IV.
#[derive(Clone, PartialEq, Eq)]
pub struct AesSessionKey {
    key: [u8; KEY_LEN],
    iv: [u8; KEY_LEN],
}

impl AesSessionKey {
    /// Generates a fresh random key and IV.
    pub fn generate() -> Self {
        Self {
            key: random_hex_block(),
            iv: random_hex_block(),
        }
    }

    /// Builds a key from explicit key and IV strings of 16 ASCII characters.
    ///
    /// # Example
    ///
    /// ```
    /// use tplink_acl_core::crypto::AesSessionKey;
    ///
    /// let key = AesSessionKey::from_parts("0123456789abcdef", "fedcba9876543210").unwrap();
    /// let ciphertext = key.encrypt(b"operation=read");
    /// assert_eq!(key.decrypt(&ciphertext).unwrap(), b"operation=read");
    /// ```
    pub fn from_parts(key: &str, iv: &str) -> Result<Self, Error> {
        Ok(Self {
            key: ascii_block(key, "key")?,
            iv: ascii_block(iv, "IV")?,
        })
    }

    /// The key as sent in the login signature.
    pub fn key_text(&self) -> &str {
        // Both constructors only admit ASCII.
        std::str::from_utf8(&self.key).unwrap_or_default()
    }

    /// The IV as sent in the login signature.
    pub fn iv_text(&self) -> &str {
        std::str::from_utf8(&self.iv).unwrap_or_default()
    }

    /// Encrypts `plaintext` with PKCS#7 padding.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes128CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypts `ciphertext` and strips the PKCS#7 padding.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| {
                Error::Protocol(format!(
                    "AES decrypt failed on {} bytes of ciphertext: {}",
                    ciphertext.len(),
                    e
                ))
            })
    }
}

// Implement Debug manually to avoid exposing key material
impl fmt::Debug for AesSessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesSessionKey")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

fn random_hex_block() -> [u8; KEY_LEN] {
    let mut raw = [0u8; KEY_LEN / 2];
    rand::rng().fill_bytes(&mut raw);

    let mut block = [0u8; KEY_LEN];
    block.copy_from_slice(hex::encode(raw).as_bytes());
    block
}

fn ascii_block(text: &str, what: &str) -> Result<[u8; KEY_LEN], Error> {
    if !text.is_ascii() {
        return Err(Error::Crypto(format!("AES {} must be ASCII", what)));
    }
    text.as_bytes().try_into().map_err(|_| {
        Error::Crypto(format!(
            "AES {} must be {} characters, got {}",
            what,
            KEY_LEN,
            text.len()
        ))
    })
}
