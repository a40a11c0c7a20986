//! The encrypted request/response envelope.
//!
//! Authenticated requests never carry their fields in the clear. The
//! plaintext form is AES encrypted and base64 encoded into `data`, and a
//! [signature](crate::signature) goes alongside in `sign`:
//!
//! ```text
//! sign=<hex RSA blocks>&data=<base64 AES ciphertext>
//! ```
//!
//! The router answers with `{"data": "<base64 AES ciphertext>"}`, which
//! decrypts to the actual JSON response.

use serde_json::Value;

use crate::{
    crypto::{AesSessionKey, base64_decode, base64_encode},
    error::Error,
    signature::{AuthKey, sign},
    transport::{encode_form, parse_body},
};

/// A sealed request, ready to be form encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Hex encoded RSA signature.
    pub sign: String,
    /// Base64 encoded AES ciphertext of the plaintext form.
    pub data: String,
}

impl Envelope {
    /// Encrypts `plaintext` and signs it.
    ///
    /// Pass `login = true` for the login request so the signature carries the
    /// AES key and IV to the router.
    pub fn seal(
        plaintext: &str,
        aes: &AesSessionKey,
        auth: &AuthKey,
        credential_digest: &str,
        login: bool,
    ) -> Result<Self, Error> {
        let data = base64_encode(&aes.encrypt(plaintext.as_bytes()));
        let sign = sign(auth, credential_digest, data.len(), login.then_some(aes))?;
        Ok(Self { sign, data })
    }

    /// The request body, `sign` first.
    pub fn to_form(&self) -> String {
        encode_form(&[("sign", self.sign.as_str()), ("data", self.data.as_str())])
    }
}

/// Decrypts a parsed outer response.
///
/// When the outer response has no string `data` field it was never
/// encrypted (the router answers stale sessions in the clear) and is
/// returned unchanged. A payload that decrypts to something other than JSON
/// is wrapped as `{"data": "<text>"}`.
pub fn open(outer: Value, aes: &AesSessionKey) -> Result<Value, Error> {
    let Some(data) = outer.get("data").and_then(Value::as_str) else {
        tracing::debug!("response is not encrypted");
        return Ok(outer);
    };

    let ciphertext = base64_decode(data)?;
    let plain = aes.decrypt(&ciphertext)?;
    Ok(parse_body(&String::from_utf8_lossy(&plain)))
}

#[cfg(test)]
mod tests {
    use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey, rand_core::OsRng};
    use serde_json::json;

    use super::*;
    use crate::crypto::RsaKey;

    const DIGEST: &str = "e3274be5c857fb42ab72d786e281b4b8";

    fn auth_key() -> (RsaPrivateKey, AuthKey) {
        let private = RsaPrivateKey::new(&mut OsRng, 512).unwrap();
        let auth = AuthKey {
            key: RsaKey::from_public(RsaPublicKey::from(&private)),
            sequence: 500,
        };
        (private, auth)
    }

    fn decrypt_sign(private: &RsaPrivateKey, sign: &str) -> String {
        let plain: Vec<u8> = sign
            .as_bytes()
            .chunks(128)
            .flat_map(|block| {
                private
                    .decrypt(Pkcs1v15Encrypt, &hex::decode(block).unwrap())
                    .unwrap()
            })
            .collect();
        String::from_utf8(plain).unwrap()
    }

    fn seal_response(aes: &AesSessionKey, body: &str) -> Value {
        json!({ "data": base64_encode(&aes.encrypt(body.as_bytes())) })
    }

    #[test]
    fn test_seal_signs_over_ciphertext_length() {
        let (private, auth) = auth_key();
        let aes = AesSessionKey::generate();

        let envelope = Envelope::seal("operation=load", &aes, &auth, DIGEST, false).unwrap();
        let ciphertext = base64_decode(&envelope.data).unwrap();
        assert_eq!(aes.decrypt(&ciphertext).unwrap(), b"operation=load");

        let sign = decrypt_sign(&private, &envelope.sign);
        assert_eq!(
            sign,
            format!("h={}&s={}", DIGEST, 500 + envelope.data.len())
        );
    }

    #[test]
    fn test_seal_login_carries_aes_key() {
        let (private, auth) = auth_key();
        let aes = AesSessionKey::generate();

        let envelope = Envelope::seal("operation=login", &aes, &auth, DIGEST, true).unwrap();
        let sign = decrypt_sign(&private, &envelope.sign);
        assert!(sign.starts_with(&format!("k={}&i={}&", aes.key_text(), aes.iv_text())));
    }

    #[test]
    fn test_to_form_escapes_base64() {
        let envelope = Envelope {
            sign: "abcd".into(),
            data: "a+b/c=".into(),
        };
        assert_eq!(envelope.to_form(), "sign=abcd&data=a%2Bb%2Fc%3D");
    }

    #[test]
    fn test_open_decrypts_json() {
        let aes = AesSessionKey::generate();
        let outer = seal_response(&aes, r#"{"success":true,"data":{"enable":"on"}}"#);
        let inner = open(outer, &aes).unwrap();
        assert_eq!(inner["success"], true);
        assert_eq!(inner["data"]["enable"], "on");
    }

    #[test]
    fn test_open_wraps_non_json_payload() {
        let aes = AesSessionKey::generate();
        let outer = seal_response(&aes, "internal error");
        assert_eq!(open(outer, &aes).unwrap(), json!({"data": "internal error"}));
    }

    #[test]
    fn test_open_passes_through_unencrypted_response() {
        let aes = AesSessionKey::generate();
        let outer = json!({"success": false, "errorcode": "timeout"});
        assert_eq!(open(outer.clone(), &aes).unwrap(), outer);
    }

    #[test]
    fn test_open_rejects_bad_base64() {
        let aes = AesSessionKey::generate();
        let err = open(json!({"data": "%%%"}), &aes).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
