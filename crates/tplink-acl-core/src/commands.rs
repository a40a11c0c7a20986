//! Router endpoints and request bodies.
//!
//! Each [`Rpc`] names an endpoint, its `form` query parameter and a short
//! human readable operation name used in errors and logs. The field
//! builders return the plaintext form fields in the order the router's web
//! front end sends them.

use serde::Serialize;

use crate::{error::Error, mac::MacAddress};

/// One router endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rpc {
    /// Path below `stok=<token>/`.
    pub endpoint: &'static str,
    /// Value of the `form` query parameter.
    pub form: &'static str,
    /// Operation name for logs and [`Error::Rejected`].
    pub operation: &'static str,
}

/// Fetch the RSA key for password encryption (unencrypted).
pub const PASSWORD_KEY: Rpc = Rpc {
    endpoint: "login",
    form: "keys",
    operation: "fetch password key",
};

/// Fetch the RSA signing key and sequence number (unencrypted).
pub const AUTH_KEY: Rpc = Rpc {
    endpoint: "login",
    form: "auth",
    operation: "fetch auth key",
};

/// Log in and obtain the session token.
pub const LOGIN: Rpc = Rpc {
    endpoint: "login",
    form: "login",
    operation: "login",
};

/// Load or remove entries of the blocked list.
pub const BLOCKED_LIST: Rpc = Rpc {
    endpoint: "admin/access_control",
    form: "black_list",
    operation: "load blocked list",
};

/// Remove an entry from the blocked list by index.
pub const UNBLOCK: Rpc = Rpc {
    operation: "unblock device",
    ..BLOCKED_LIST
};

/// Block a device.
pub const BLOCK: Rpc = Rpc {
    endpoint: "admin/access_control",
    form: "black_devices",
    operation: "block device",
};

/// List devices currently connected (same form as [`BLOCK`]).
pub const CONNECTED_DEVICES: Rpc = Rpc {
    operation: "load connected devices",
    ..BLOCK
};

/// Read or toggle the LED setting.
pub const LED: Rpc = Rpc {
    endpoint: "admin/ledgeneral",
    form: "setting",
    operation: "led setting",
};

/// End the session on the router.
pub const LOGOUT: Rpc = Rpc {
    endpoint: "admin/system",
    form: "logout",
    operation: "logout",
};

/// Placeholder hostname the router's web UI sends when blocking by MAC.
pub const BLOCK_HOST_PLACEHOLDER: &str = "NOT HOST";

/// Form fields, in order.
pub type Fields = Vec<(&'static str, String)>;

/// `operation=<op>` on its own.
pub fn operation(op: &'static str) -> Fields {
    vec![("operation", op.to_string())]
}

/// Login fields with the RSA encrypted password.
///
/// `confirm=true` forces the login even when another administrator session
/// is active.
pub fn login(encrypted_password: &str) -> Fields {
    vec![
        ("operation", "login".to_string()),
        ("password", encrypted_password.to_string()),
        ("confirm", "true".to_string()),
    ]
}

#[derive(Serialize)]
struct BlockEntry<'a> {
    mac: &'a str,
    host: &'a str,
}

/// The URL encoded `data` value of a block request.
///
/// ```
/// use tplink_acl_core::{MacAddress, commands::block_payload};
///
/// let mac = MacAddress::parse("AA-BB-CC-DD-EE-FF").unwrap();
/// assert_eq!(
///     block_payload(&mac).unwrap(),
///     "%5B%7B%22mac%22%3A%22AA-BB-CC-DD-EE-FF%22%2C%22host%22%3A%22NOT%20HOST%22%7D%5D"
/// );
/// ```
pub fn block_payload(mac: &MacAddress) -> Result<String, Error> {
    let entries = [BlockEntry {
        mac: mac.as_str(),
        host: BLOCK_HOST_PLACEHOLDER,
    }];
    let json = serde_json::to_string(&entries)?;
    Ok(urlencoding::encode(&json).into_owned())
}

/// Block request fields.
pub fn block(mac: &MacAddress) -> Result<Fields, Error> {
    Ok(vec![
        ("operation", "block".to_string()),
        ("data", block_payload(mac)?),
    ])
}

/// Remove the blocked list entry at `index`.
///
/// The `key` value is ignored by the router but must be present.
pub fn unblock(index: usize) -> Fields {
    vec![
        ("key", "anything".to_string()),
        ("index", index.to_string()),
        ("operation", "remove".to_string()),
    ]
}

/// Toggle the LEDs.
pub fn led_toggle() -> Fields {
    vec![
        ("operation", "write".to_string()),
        ("led_status", "toggle".to_string()),
    ]
}

/// Joins fields as `key=value&key=value` without any escaping.
///
/// This is the plaintext that gets encrypted; values that need escaping
/// (the block payload) arrive already encoded.
pub fn plaintext(fields: &[(&str, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
