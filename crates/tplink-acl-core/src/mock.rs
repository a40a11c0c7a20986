//! In-memory router used by the client tests.
//!
//! [`MockRouter`] implements [`Transport`] and plays the router's side of
//! the protocol for real: it hands out RSA keys it holds the private halves
//! of, decrypts and checks every signature, decrypts the password, and keeps
//! a block list that the client can edit.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rsa::{
    Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey, rand_core::OsRng, traits::PublicKeyParts,
};
use serde_json::{Value, json};

use crate::{
    config::ADMIN_USERNAME,
    crypto::{AesSessionKey, base64_decode, base64_encode, md5_hex},
    error::Error,
    transport::{HttpResponse, Transport},
};

pub const PASSWORD: &str = "correct horse";
pub const TOKEN: &str = "0123456789abcdef";
pub const SEQUENCE: u64 = 918_273;

/// One request the router accepted, after decryption.
#[derive(Debug, Clone)]
pub struct Received {
    pub endpoint: String,
    pub form: String,
    /// Plaintext form fields in the order sent.
    pub fields: Vec<(String, String)>,
}

impl Received {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct State {
    token: Option<String>,
    aes: Option<AesSessionKey>,
    blocked: Vec<(String, String)>,
    connected: Vec<(String, String)>,
    led_on: bool,
    handshakes: usize,
    received: Vec<Received>,
    /// `(endpoint?form, Cookie header)` for every request, logins included.
    cookies: Vec<(String, Option<String>)>,
}

pub struct MockRouter {
    password_key: RsaPrivateKey,
    auth_key: RsaPrivateKey,
    password: String,
    login_delay: Duration,
    key_fetch_failure: Option<Duration>,
    garbled: bool,
    state: Mutex<State>,
}

impl MockRouter {
    pub fn new() -> Self {
        Self {
            password_key: RsaPrivateKey::new(&mut OsRng, 512).unwrap(),
            auth_key: RsaPrivateKey::new(&mut OsRng, 512).unwrap(),
            password: PASSWORD.to_string(),
            login_delay: Duration::ZERO,
            key_fetch_failure: None,
            garbled: false,
            state: Mutex::new(State {
                led_on: true,
                ..Default::default()
            }),
        }
    }

    /// Delays each login answer, so concurrent callers overlap.
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    /// Makes every password key fetch time out after `delay`, as if the
    /// router stopped answering.
    pub fn with_failing_key_fetch(mut self, delay: Duration) -> Self {
        self.key_fetch_failure = Some(delay);
        self
    }

    /// Answers every authenticated request with a non-JSON payload.
    pub fn with_garbled_responses(mut self) -> Self {
        self.garbled = true;
        self
    }

    pub fn with_blocked(self, entries: &[(&str, &str)]) -> Self {
        self.state.lock().unwrap().blocked = owned(entries);
        self
    }

    pub fn with_connected(self, entries: &[(&str, &str)]) -> Self {
        self.state.lock().unwrap().connected = owned(entries);
        self
    }

    pub fn handshakes(&self) -> usize {
        self.state.lock().unwrap().handshakes
    }

    pub fn blocked_macs(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.blocked.iter().map(|(mac, _)| mac.clone()).collect()
    }

    pub fn led_on(&self) -> bool {
        self.state.lock().unwrap().led_on
    }

    /// Authenticated requests received so far, excluding logins.
    pub fn received(&self) -> Vec<Received> {
        self.state.lock().unwrap().received.clone()
    }

    /// `Cookie` header of every request, in order, keyed by `endpoint?form`.
    pub fn cookies_sent(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().cookies.clone()
    }

    /// Requests that changed router state.
    pub fn mutations(&self) -> Vec<Received> {
        self.received()
            .into_iter()
            .filter(|r| {
                matches!(
                    r.field("operation"),
                    Some("block" | "remove" | "write")
                )
            })
            .collect()
    }

    /// Makes the router forget the session, as after a timeout.
    pub fn expire_session(&self) {
        self.state.lock().unwrap().token = None;
    }

    fn key_json(key: &RsaPrivateKey) -> Value {
        let public = RsaPublicKey::from(key);
        json!([
            hex::encode_upper(public.n().to_bytes_be()),
            hex::encode_upper(public.e().to_bytes_be())
        ])
    }

    fn digest(&self) -> String {
        md5_hex(&format!("{}{}", ADMIN_USERNAME, self.password))
    }

    fn decrypt_sign(&self, sign: &str) -> HashMap<String, String> {
        let block_hex = self.auth_key.size() * 2;
        let plain: Vec<u8> = sign
            .as_bytes()
            .chunks(block_hex)
            .flat_map(|block| {
                self.auth_key
                    .decrypt(Pkcs1v15Encrypt, &hex::decode(block).unwrap())
                    .unwrap()
            })
            .collect();
        String::from_utf8(plain)
            .unwrap()
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn seal(aes: &AesSessionKey, body: &str) -> String {
        json!({ "data": base64_encode(&aes.encrypt(body.as_bytes())) }).to_string()
    }

    async fn login(&self, outer: &[(String, String)]) -> String {
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }

        let sign = self.decrypt_sign(form_value(outer, "sign"));
        let data = form_value(outer, "data");
        let aes = AesSessionKey::from_parts(&sign["k"], &sign["i"]).unwrap();
        let fields = decrypt_fields(&aes, data);

        let expected_counter = (SEQUENCE + data.len() as u64).to_string();
        assert_eq!(sign["s"], expected_counter, "login signature sequence");
        assert_eq!(form_value(&fields, "operation"), "login");
        assert_eq!(form_value(&fields, "confirm"), "true");

        let password = self
            .password_key
            .decrypt(
                Pkcs1v15Encrypt,
                &hex::decode(form_value(&fields, "password")).unwrap(),
            )
            .unwrap();

        let mut state = self.state.lock().unwrap();
        state.handshakes += 1;

        if sign["h"] != self.digest() || password != self.password.as_bytes() {
            state.token = None;
            return Self::seal(
                &aes,
                r#"{"success":false,"errorcode":"login failed","data":{"failureCount":1}}"#,
            );
        }

        state.token = Some(TOKEN.to_string());
        state.aes = Some(aes.clone());
        Self::seal(
            &aes,
            &json!({"success": true, "data": {"stok": TOKEN}}).to_string(),
        )
    }

    fn authenticated(&self, token: &str, endpoint: &str, form: &str, outer: &[(String, String)]) -> String {
        let mut state = self.state.lock().unwrap();
        if state.token.as_deref() != Some(token) {
            return json!({"success": false, "errorcode": "timeout"}).to_string();
        }
        let aes = state.aes.clone().unwrap();

        let sign = self.decrypt_sign(form_value(outer, "sign"));
        let data = form_value(outer, "data");
        assert_eq!(sign["h"], self.digest(), "signature digest");
        assert_eq!(
            sign["s"],
            (SEQUENCE + data.len() as u64).to_string(),
            "signature sequence"
        );
        assert!(!sign.contains_key("k"), "AES key only travels on login");

        let fields = decrypt_fields(&aes, data);
        state.received.push(Received {
            endpoint: endpoint.to_string(),
            form: form.to_string(),
            fields: fields.clone(),
        });

        if self.garbled {
            return Self::seal(&aes, "<html>Internal Server Error</html>");
        }

        let reply = match (endpoint, form, form_value(&fields, "operation")) {
            ("admin/access_control", "black_list", "load") => {
                json!({"success": true, "data": device_json(&state.blocked)})
            }
            ("admin/access_control", "black_list", "remove") => {
                let index: usize = form_value(&fields, "index").parse().unwrap();
                if index < state.blocked.len() {
                    state.blocked.remove(index);
                    json!({"success": true, "data": {}})
                } else {
                    json!({"success": false, "errorcode": "index out of range"})
                }
            }
            ("admin/access_control", "black_devices", "load") => {
                json!({"success": true, "data": device_json(&state.connected)})
            }
            ("admin/access_control", "black_devices", "block") => {
                let decoded = urlencoding::decode(form_value(&fields, "data")).unwrap();
                let entries: Vec<Value> = serde_json::from_str(&decoded).unwrap();
                for entry in entries {
                    assert_eq!(entry["host"], "NOT HOST");
                    let mac = entry["mac"].as_str().unwrap().to_string();
                    let name = state
                        .connected
                        .iter()
                        .find(|(m, _)| m.eq_ignore_ascii_case(&mac))
                        .map(|(_, n)| n.clone())
                        .unwrap_or_else(|| "Unknown".to_string());
                    state.blocked.push((mac, name));
                }
                json!({"success": true, "data": {}})
            }
            ("admin/ledgeneral", "setting", "read") => {
                let enable = if state.led_on { "on" } else { "off" };
                json!({"success": true, "data": {"enable": enable}})
            }
            ("admin/ledgeneral", "setting", "write") => {
                assert_eq!(form_value(&fields, "led_status"), "toggle");
                state.led_on = !state.led_on;
                json!({"success": true, "data": {}})
            }
            ("admin/system", "logout", "write") => {
                state.token = None;
                json!({"success": true, "data": {}})
            }
            other => json!({"success": false, "errorcode": format!("unknown request {:?}", other)}),
        };

        Self::seal(&aes, &reply.to_string())
    }
}

#[async_trait]
impl Transport for MockRouter {
    async fn post(
        &self,
        path: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> Result<HttpResponse, Error> {
        let rest = path
            .strip_prefix("/cgi-bin/luci/;stok=")
            .expect("LuCI path");
        let (token, rest) = rest.split_once('/').expect("token segment");
        let (endpoint, form) = rest.split_once("?form=").expect("form parameter");
        let outer = parse_form(body);

        self.state
            .lock()
            .unwrap()
            .cookies
            .push((format!("{}?{}", endpoint, form), cookie.map(str::to_string)));

        let body = match (endpoint, form) {
            ("login", "keys") => {
                if let Some(delay) = self.key_fetch_failure {
                    tokio::time::sleep(delay).await;
                    return Err(Error::Timeout("no response from mock-router".into()));
                }
                assert_eq!(form_value(&outer, "operation"), "read");
                json!({"success": true, "data": {
                    "password": Self::key_json(&self.password_key)
                }})
                .to_string()
            }
            ("login", "auth") => {
                assert_eq!(form_value(&outer, "operation"), "read");
                json!({"success": true, "data": {
                    "key": Self::key_json(&self.auth_key),
                    "seq": SEQUENCE
                }})
                .to_string()
            }
            ("login", "login") => self.login(&outer).await,
            _ => self.authenticated(token, endpoint, form, &outer),
        };

        Ok(HttpResponse {
            set_cookies: vec!["sysauth=mock; path=/cgi-bin/luci".to_string()],
            body,
        })
    }
}

fn owned(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(mac, name)| (mac.to_string(), name.to_string()))
        .collect()
}

fn device_json(entries: &[(String, String)]) -> Value {
    if entries.is_empty() {
        return json!({});
    }
    entries
        .iter()
        .map(|(mac, name)| json!({"mac": mac, "name": name}))
        .collect()
}

fn parse_form(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            (
                urlencoding::decode(k).unwrap().into_owned(),
                urlencoding::decode(v).unwrap().into_owned(),
            )
        })
        .collect()
}

fn form_value<'a>(fields: &'a [(String, String)], name: &str) -> &'a str {
    fields
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .unwrap_or_else(|| panic!("missing form field {:?}", name))
}

/// Decrypts an envelope's `data` into plaintext fields, without unescaping.
fn decrypt_fields(aes: &AesSessionKey, data: &str) -> Vec<(String, String)> {
    let plain = aes.decrypt(&base64_decode(data).unwrap()).unwrap();
    String::from_utf8(plain)
        .unwrap()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
