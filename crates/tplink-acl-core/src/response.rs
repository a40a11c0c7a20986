//! Typed views of router responses.
//!
//! Every RPC answers with the same outer shape once decrypted:
//!
//! ```json
//! {"success": true, "data": { ... }}
//! {"success": false, "errorcode": "...", "data": { ... }}
//! ```
//!
//! [`expect_success`] checks the flag and hands back `data`; the structs
//! below describe what `data` looks like for each endpoint.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tplink_acl_core::response::{device_list, expect_success};
//!
//! let response = json!({
//!     "success": true,
//!     "data": [{"mac": "AA-BB-CC-DD-EE-FF", "name": "laptop"}]
//! });
//! let data = expect_success("load blocked list", &response).unwrap();
//! let devices = device_list(data).unwrap();
//! assert_eq!(devices[0].mac, "AA-BB-CC-DD-EE-FF");
//! ```

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::Error;

/// `login?form=keys`: the RSA key used to encrypt the admin password.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordKeyData {
    /// `[modulus, exponent]`, both hex.
    pub password: Vec<String>,
}

/// `login?form=auth`: the RSA key used for signatures and its sequence.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthKeyData {
    /// `[modulus, exponent]`, both hex.
    pub key: Vec<String>,

    /// Signature sequence number.
    #[serde(deserialize_with = "deserialize_sequence")]
    pub seq: u64,
}

/// `login?form=login`: the session token.
#[derive(Clone, Deserialize)]
pub struct LoginData {
    pub stok: String,
}

/// `admin/ledgeneral?form=setting`: LED state.
#[derive(Debug, Clone, Deserialize)]
pub struct LedSetting {
    /// `"on"` or `"off"`.
    #[serde(default)]
    pub enable: String,
}

impl LedSetting {
    /// Returns true if the LEDs are on.
    pub fn is_on(&self) -> bool {
        self.enable == "on"
    }
}

/// A device as listed by the router, either blocked or connected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceRecord {
    /// MAC address exactly as the router reports it.
    pub mac: String,

    /// Hostname, when the router knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Returns the `data` field of a successful response.
///
/// A response whose `success` is anything other than `true` becomes
/// [`Error::Rejected`] carrying the full response text.
pub fn expect_success<'a>(operation: &'static str, response: &'a Value) -> Result<&'a Value, Error> {
    if response.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(response.get("data").unwrap_or(&Value::Null));
    }

    tracing::warn!(operation, errorcode = ?response.get("errorcode"), "router rejected request");
    Err(Error::Rejected {
        operation,
        response: response.to_string(),
    })
}

/// Deserializes the `data` of a response into `T`.
pub fn parse_data<T: DeserializeOwned>(operation: &'static str, data: &Value) -> Result<T, Error> {
    T::deserialize(data)
        .map_err(|e| Error::ParseError(format!("unexpected {} response: {}", operation, e)))
}

/// Parses a device listing.
///
/// The router sends an array of records, or an empty object when there is
/// nothing to list.
pub fn device_list(data: &Value) -> Result<Vec<DeviceRecord>, Error> {
    match data {
        Value::Array(_) => parse_data("device list", data),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::ParseError(format!(
            "expected a device list, got {}",
            other
        ))),
    }
}

/// Splits a `[modulus, exponent]` pair.
pub fn key_pair<'a>(what: &str, parts: &'a [String]) -> Result<(&'a str, &'a str), Error> {
    match parts {
        [modulus, exponent, ..] => Ok((modulus.as_str(), exponent.as_str())),
        _ => Err(Error::Protocol(format!(
            "{} key has {} parts, expected modulus and exponent",
            what,
            parts.len()
        ))),
    }
}

/// Accept the sequence as a JSON number or a numeric string.
fn deserialize_sequence<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sequence {
        Number(u64),
        Text(String),
    }

    match Sequence::deserialize(deserializer)? {
        Sequence::Number(n) => Ok(n),
        Sequence::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
