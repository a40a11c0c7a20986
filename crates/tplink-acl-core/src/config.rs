//! Router connection settings.
//!
//! [`RouterConfig`] carries what the client needs to reach and authenticate
//! against a router: its address, the admin password and the per-request
//! timeout.
//!
//! # Security
//!
//! The password is stored using [`SecretString`] from the `secrecy` crate to
//! prevent accidental logging or display. It is only exposed inside the crate
//! while building the login request.

use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::crypto::md5_hex;

/// Name of the router's only administrator account.
///
/// The web interface never asks for a username; it is always `admin`.
pub const ADMIN_USERNAME: &str = "admin";

/// Default timeout applied to every HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for connecting to a router.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tplink_acl_core::RouterConfig;
///
/// let config = RouterConfig::new("192.168.0.1", "hunter2")
///     .with_timeout(Duration::from_secs(3));
/// assert_eq!(config.host, "192.168.0.1");
/// assert!(!format!("{:?}", config).contains("hunter2"));
/// ```
#[derive(Clone)]
pub struct RouterConfig {
    /// Router hostname or IP address, optionally with `:port`.
    pub host: String,
    /// Timeout for each HTTP request.
    pub timeout: Duration,
    password: SecretString,
}

impl RouterConfig {
    /// Creates a configuration with the default timeout.
    pub fn new(host: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timeout: DEFAULT_TIMEOUT,
            password: SecretString::from(password.into()),
        }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }

    /// MD5 of the admin username followed by the password, hex encoded.
    ///
    /// Only used inside request signatures, never sent as a login credential.
    pub(crate) fn credential_digest(&self) -> String {
        md5_hex(&format!("{}{}", ADMIN_USERNAME, self.expose_password()))
    }
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("host", &self.host)
            .field("timeout", &self.timeout)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RouterConfig::new("10.0.0.1", "pw");
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.expose_password(), "pw");
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = RouterConfig::new("10.0.0.1", "secret123");
        let debug = format!("{:?}", config);
        assert!(debug.contains("10.0.0.1"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret123"));
    }

    #[test]
    fn test_credential_digest_prefixes_admin() {
        let config = RouterConfig::new("10.0.0.1", "password");
        assert_eq!(config.credential_digest(), md5_hex("adminpassword"));
        // md5("adminpassword")
        assert_eq!(
            config.credential_digest(),
            "e3274be5c857fb42ab72d786e281b4b8"
        );
    }
}
