//! Core library for managing the access control list of TP-Link routers.
//!
//! This crate speaks the encrypted admin API of TP-Link routers' LuCI based
//! web interface (Archer series and similar) and exposes the access control
//! features as async methods: list, block and unblock devices by MAC address.
//!
//! # Overview
//!
//! The router's web API is reached over plain HTTP, so it protects requests
//! itself:
//!
//! 1. The client fetches two RSA public keys from the router, one for the
//!    admin password and one for request signatures
//! 2. It invents an AES-128-CBC session key and logs in, sending the
//!    RSA encrypted password and, inside the signature, the AES key
//! 3. The router answers with a session token (`stok`) that goes into every
//!    later request URL
//! 4. From then on every request body is AES encrypted and signed, and every
//!    response body is AES encrypted
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tplink_acl_core::{RouterClient, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tplink_acl_core::Error> {
//!     let config = RouterConfig::new("192.168.0.1", "admin password")
//!         .with_timeout(Duration::from_secs(5));
//!     let client = RouterClient::new(config);
//!
//!     client.connect().await?;
//!     println!("blocked: {:?}", client.get_blocked_devices().await?);
//!
//!     if client.unblock_device("AA-BB-CC-DD-EE-FF").await? {
//!         println!("unblocked");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`client`]: [`RouterClient`], the entry point
//! - [`transport`]: HTTP and the [`Transport`](transport::Transport) seam
//! - [`envelope`], [`signature`], [`crypto`]: the encryption layers
//! - [`commands`], [`response`]: request fields and response shapes

pub mod client;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod mac;
pub mod response;
pub mod session;
pub mod signature;
pub mod transport;

#[cfg(test)]
mod mock;

pub use client::RouterClient;
pub use config::{ADMIN_USERNAME, DEFAULT_TIMEOUT, RouterConfig};
pub use error::Error;
pub use mac::MacAddress;
pub use response::DeviceRecord;
pub use session::LOGIN_WAIT_TIMEOUT;
pub use transport::{HttpTransport, Transport};

/// The version of the tplink-acl-core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
