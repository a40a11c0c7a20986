//! Request signatures.
//!
//! Every encrypted request carries a `sign` field: a short `key=value`
//! string, RSA encrypted with the router's auth key. It binds the request to
//! the session (through the credential digest) and to this particular body
//! (through the sequence number plus the body length). On login it also
//! delivers the AES session key to the router.
//!
//! ```text
//! login:  k=<aes key>&i=<aes iv>&h=<md5(admin + password)>&s=<seq + len>
//! other:  h=<md5(admin + password)>&s=<seq + len>
//! ```
//!
//! `len` is the length in characters of the base64 encoded ciphertext of
//! the request the signature travels with.

use crate::{
    crypto::{AesSessionKey, RsaKey},
    error::Error,
};

/// The router's signing key together with its sequence counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthKey {
    /// RSA key used to encrypt the signing string.
    pub key: RsaKey,
    /// Sequence number handed out by the router alongside the key.
    pub sequence: u64,
}

/// Builds the plaintext signing string.
///
/// `aes_key` is only passed for the login request.
pub fn signing_string(
    credential_digest: &str,
    sequence: u64,
    body_len: usize,
    aes_key: Option<&AesSessionKey>,
) -> String {
    let counter = sequence + body_len as u64;
    match aes_key {
        Some(aes) => format!(
            "k={}&i={}&h={}&s={}",
            aes.key_text(),
            aes.iv_text(),
            credential_digest,
            counter
        ),
        None => format!("h={}&s={}", credential_digest, counter),
    }
}

/// Builds and encrypts the signature for a request body of `body_len`
/// base64 characters.
pub fn sign(
    auth: &AuthKey,
    credential_digest: &str,
    body_len: usize,
    aes_key: Option<&AesSessionKey>,
) -> Result<String, Error> {
    let plain = signing_string(credential_digest, auth.sequence, body_len, aes_key);
    auth.key.encrypt_chunked_hex(plain.as_bytes())
}

#[cfg(test)]
mod tests {
    use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey, rand_core::OsRng};

    use super::*;

    const DIGEST: &str = "e3274be5c857fb42ab72d786e281b4b8";

    #[test]
    fn test_signing_string_plain_request() {
        let s = signing_string(DIGEST, 1000, 44, None);
        assert_eq!(s, format!("h={}&s=1044", DIGEST));
    }

    #[test]
    fn test_signing_string_login_includes_aes_key() {
        let aes = AesSessionKey::from_parts("0011223344556677", "8899aabbccddeeff").unwrap();
        let s = signing_string(DIGEST, 7, 3, Some(&aes));
        assert_eq!(
            s,
            format!("k=0011223344556677&i=8899aabbccddeeff&h={}&s=10", DIGEST)
        );
    }

    #[test]
    fn test_sign_login_spans_two_blocks() {
        let private = RsaPrivateKey::new(&mut OsRng, 512).unwrap();
        let auth = AuthKey {
            key: RsaKey::from_public(RsaPublicKey::from(&private)),
            sequence: 123_456_789,
        };
        let aes = AesSessionKey::generate();

        let signature = sign(&auth, DIGEST, 64, Some(&aes)).unwrap();
        let plain = signing_string(DIGEST, auth.sequence, 64, Some(&aes));
        let expected_blocks = plain.len().div_ceil(53);
        // 84 characters: one full block of 53 plus 31
        assert_eq!(plain.len(), 84);
        assert_eq!(expected_blocks, 2);
        assert_eq!(signature.len(), expected_blocks * 128);

        let mut decrypted = Vec::new();
        for block in signature.as_bytes().chunks(128) {
            let raw = hex::decode(block).unwrap();
            decrypted.extend(private.decrypt(Pkcs1v15Encrypt, &raw).unwrap());
        }
        assert_eq!(String::from_utf8(decrypted).unwrap(), plain);
    }

    #[test]
    fn test_sign_plain_request_fits_one_block() {
        let private = RsaPrivateKey::new(&mut OsRng, 512).unwrap();
        let auth = AuthKey {
            key: RsaKey::from_public(RsaPublicKey::from(&private)),
            sequence: 5,
        };
        // "h=" + 32 hex digits + "&s=29" is 39 characters
        let signature = sign(&auth, DIGEST, 24, None).unwrap();
        assert_eq!(signature.len(), 128);
    }
}
