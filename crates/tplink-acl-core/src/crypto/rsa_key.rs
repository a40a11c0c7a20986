//! RSA public keys supplied by the router.
//!
//! The router hands out two keys per session, each as a pair of hex strings
//! `[modulus, exponent]`: one for encrypting the admin password and one for
//! encrypting request signatures. Both are used with PKCS#1 v1.5 padding,
//! matching the router's JavaScript front end.
//!
//! The signature key is small (512 bits), so longer plaintexts must be split
//! into blocks of at most [`RsaKey::max_chunk_len`] bytes and encrypted one
//! block at a time.

use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey, rand_core::OsRng, traits::PublicKeyParts};

use crate::error::Error;

/// Bytes consumed by PKCS#1 v1.5 encryption padding in every block.
const PKCS1_PADDING_LEN: usize = 11;

/// An RSA public key received from the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKey {
    inner: RsaPublicKey,
}

impl RsaKey {
    /// Builds a key from the router's hex encoded modulus and exponent.
    ///
    /// # Example
    ///
    /// ```
    /// use tplink_acl_core::crypto::RsaKey;
    ///
    /// // 512-bit modulus as served by the router's login?form=auth endpoint
    /// let modulus = "D1E79FF135D14E342D76185C23024E6DEAD4D6EC2C317A526C811E83538EA4E5\
    ///                ED8E1B0EEE5CE26E3C1B6A5F1FE11FA804F28B7E8821CA90AFA5B2F300DF99FD";
    /// let key = RsaKey::from_hex(modulus, "010001").unwrap();
    /// assert_eq!(key.size(), 64);
    /// assert_eq!(key.max_chunk_len(), 53);
    /// ```
    pub fn from_hex(modulus: &str, exponent: &str) -> Result<Self, Error> {
        let n = BigUint::parse_bytes(modulus.trim().as_bytes(), 16)
            .ok_or_else(|| Error::Crypto(format!("RSA modulus is not hex: {:?}", modulus)))?;
        let e = BigUint::parse_bytes(exponent.trim().as_bytes(), 16)
            .ok_or_else(|| Error::Crypto(format!("RSA exponent is not hex: {:?}", exponent)))?;

        let inner =
            RsaPublicKey::new(n, e).map_err(|e| Error::Crypto(format!("invalid RSA key: {}", e)))?;
        Ok(Self { inner })
    }

    /// Modulus size in bytes; every ciphertext block has exactly this length.
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    /// Largest plaintext that fits into a single encrypted block.
    pub fn max_chunk_len(&self) -> usize {
        self.size().saturating_sub(PKCS1_PADDING_LEN)
    }

    /// Encrypts a single block.
    ///
    /// Fails if `plaintext` is longer than [`max_chunk_len`](Self::max_chunk_len).
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self.inner
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| Error::Crypto(format!("RSA encrypt failed: {}", e)))
    }

    /// Encrypts a single block and returns the ciphertext as lowercase hex.
    pub fn encrypt_hex(&self, plaintext: &[u8]) -> Result<String, Error> {
        self.encrypt(plaintext).map(hex::encode)
    }

    /// Encrypts `plaintext` block by block and concatenates the hex ciphertexts.
    ///
    /// The plaintext is split every [`max_chunk_len`](Self::max_chunk_len)
    /// bytes; only the final block may be shorter. The router decrypts in the
    /// same segmentation, so block order is preserved.
    pub fn encrypt_chunked_hex(&self, plaintext: &[u8]) -> Result<String, Error> {
        let chunk_len = self.max_chunk_len();
        if chunk_len == 0 {
            return Err(Error::Crypto(format!(
                "RSA key of {} bytes is too small to encrypt anything",
                self.size()
            )));
        }

        let mut out = String::with_capacity(plaintext.len().div_ceil(chunk_len) * self.size() * 2);
        for chunk in plaintext.chunks(chunk_len) {
            out.push_str(&self.encrypt_hex(chunk)?);
        }
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn from_public(inner: RsaPublicKey) -> Self {
        Self { inner }
    }
}
