//! Error types for tplink-acl-core.
//!
//! This module defines the error types returned by the library. Variants are
//! grouped by where the failure happened: the network, the router protocol,
//! authentication, or the login guard.

use thiserror::Error;

/// Error type for tplink-acl-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The request did not complete within the transport timeout.
    #[error("request timed out, verify the IP address of the router: {0}")]
    Timeout(String),

    /// The router address could not be reached at all.
    #[error("router unreachable, verify the IP address of the router: {0}")]
    HostUnreachable(String),

    /// Connection to the router failed for another reason.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// I/O error while talking to the router.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Protocol error (malformed HTTP, undecodable envelope, missing fields).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Failed to parse a router response into the expected shape.
    #[error("parse error: {0}")]
    ParseError(String),

    /// The router answered with `success: false`.
    #[error("{operation} rejected by router: {response}")]
    Rejected {
        /// The operation that was attempted.
        operation: &'static str,
        /// The raw decrypted response, kept for diagnostics.
        response: String,
    },

    /// The login request was refused, most likely because of a wrong password.
    #[error("authentication failed (probably wrong password): {0}")]
    AuthenticationFailed(String),

    /// Waited too long for another task's login to finish.
    #[error("login timed out waiting for a concurrent login to finish")]
    LoginTimedOut,

    /// RSA key construction or encryption failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// A MAC address supplied by the caller is malformed.
    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
}

impl Error {
    /// Returns `true` for failures that a fresh `connect()` cannot fix.
    ///
    /// Callers retrying operations should stop on these instead of looping.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::AuthenticationFailed(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseError(err.to_string())
    }
}
