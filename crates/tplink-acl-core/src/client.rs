//! High-level router client.
//!
//! [`RouterClient`] owns the session and exposes the router's access control
//! features as async methods. Every method that needs an authenticated
//! session logs in first when there is none.
//!
//! # Example
//!
//! ```no_run
//! use tplink_acl_core::{RouterClient, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tplink_acl_core::Error> {
//!     let client = RouterClient::new(RouterConfig::new("192.168.0.1", "hunter2"));
//!     client.connect().await?;
//!
//!     client.block_device("AA-BB-CC-DD-EE-FF").await?;
//!     for mac in client.get_blocked_devices().await? {
//!         println!("{}", mac);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    commands::{self, Fields, Rpc},
    config::RouterConfig,
    crypto::{AesSessionKey, RsaKey},
    envelope::{self, Envelope},
    error::Error,
    mac::MacAddress,
    response::{self, AuthKeyData, DeviceRecord, LedSetting, LoginData, PasswordKeyData},
    session::{LOGIN_WAIT_TIMEOUT, LoginGate, LoginOutcome, Session},
    signature::AuthKey,
    transport::{HttpTransport, Transport, encode_form, luci_path, parse_body},
};

/// Client for one router.
///
/// The client is `Send + Sync`; share it behind an `Arc` to use it from
/// several tasks. Only logins are serialized, see [`connect`](Self::connect).
pub struct RouterClient<T: Transport = HttpTransport> {
    config: RouterConfig,
    transport: T,
    session: Mutex<Session>,
    login_gate: LoginGate,
}

impl RouterClient<HttpTransport> {
    /// Creates a client that talks HTTP to `config.host`.
    pub fn new(config: RouterConfig) -> Self {
        let transport = HttpTransport::new(config.host.clone(), config.timeout);
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> RouterClient<T> {
    /// Creates a client over a custom transport.
    pub fn with_transport(config: RouterConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            session: Mutex::new(Session::default()),
            login_gate: LoginGate::new(),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Router host this client talks to.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Returns true if a session token is held locally.
    ///
    /// This does not contact the router; see
    /// [`get_logged_in_status`](Self::get_logged_in_status) for that.
    pub fn is_authenticated(&self) -> bool {
        self.lock_session().is_authenticated()
    }

    // The session is never held across an await, so a poisoned lock only
    // means a panic elsewhere; the data is still consistent.
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Logs in to the router.
    ///
    /// Safe to call from several tasks at once: only one login handshake
    /// runs, and callers that find a login already in progress wait for it
    /// to finish (up to [`LOGIN_WAIT_TIMEOUT`]) and share its outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::AuthenticationFailed`] if the router refuses the password
    /// - [`Error::LoginTimedOut`] if a concurrent login took too long
    /// - transport and protocol errors from the handshake requests; a caller
    ///   that waited on someone else's failed handshake gets
    ///   [`Error::ConnectionFailed`]
    pub async fn connect(&self) -> Result<(), Error> {
        let Some(mut guard) = self.login_gate.try_acquire() else {
            debug!("login already in progress, waiting");
            return self.login_gate.wait(LOGIN_WAIT_TIMEOUT).await;
        };

        let result = self.login().await;
        guard.finish(LoginOutcome::of(&result));
        result
    }

    async fn login(&self) -> Result<(), Error> {
        let host = self.host();
        debug!(host, "starting login");

        self.lock_session().reset(self.config.credential_digest());

        let keys: PasswordKeyData = self.fetch_plain(commands::PASSWORD_KEY).await?;
        let (n, e) = response::key_pair("password", &keys.password)?;
        let password_key = RsaKey::from_hex(n, e)?;

        let auth: AuthKeyData = self.fetch_plain(commands::AUTH_KEY).await?;
        let (n, e) = response::key_pair("auth", &auth.key)?;
        let auth_key = AuthKey {
            key: RsaKey::from_hex(n, e)?,
            sequence: auth.seq,
        };
        debug!(sequence = auth.seq, "received signing key");

        let encrypted_password = password_key.encrypt_hex(self.config.expose_password().as_bytes())?;

        {
            let mut session = self.lock_session();
            session.password_key = Some(password_key);
            session.auth_key = Some(auth_key);
            session.aes_key = Some(AesSessionKey::generate());
        }

        let response = self
            .post_encrypted(commands::LOGIN, &commands::login(&encrypted_password), true)
            .await?;

        let data = match response::expect_success(commands::LOGIN.operation, &response) {
            Ok(data) => data,
            Err(_) => {
                warn!(host, "login refused");
                let detail = response.get("data").unwrap_or(&response).to_string();
                return Err(Error::AuthenticationFailed(detail));
            }
        };

        let login: LoginData = response::parse_data(commands::LOGIN.operation, data)?;
        if login.stok.is_empty() {
            return Err(Error::AuthenticationFailed("router returned an empty token".into()));
        }

        self.lock_session().token = Some(login.stok);
        info!(host, "logged in");
        Ok(())
    }

    /// Logs in if there is no session yet.
    async fn ensure_connected(&self) -> Result<(), Error> {
        if self.is_authenticated() {
            return Ok(());
        }

        self.connect().await?;

        // A logout can land between the login and this check
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(Error::Protocol("no session after login".into()))
        }
    }

    /// Unencrypted request used by the two key fetches.
    async fn fetch_plain<D: serde::de::DeserializeOwned>(&self, rpc: Rpc) -> Result<D, Error> {
        let (path, cookie) = {
            let session = self.lock_session();
            (
                luci_path(session.token_segment(), rpc.endpoint, rpc.form),
                session.cookies.header_value(),
            )
        };
        debug!(endpoint = rpc.endpoint, form = rpc.form, "plain request");

        let body = encode_form(&[("operation", "read")]);
        let response = self.transport.post(&path, &body, cookie.as_deref()).await?;
        self.lock_session().cookies.absorb_all(&response.set_cookies);

        let value = parse_body(&response.body);
        let data = response::expect_success(rpc.operation, &value)?;
        response::parse_data(rpc.operation, data)
    }

    /// Sends `fields` inside an encrypted envelope and returns the decrypted
    /// response, without judging `success`.
    async fn post_encrypted(&self, rpc: Rpc, fields: &Fields, login: bool) -> Result<Value, Error> {
        let plaintext = commands::plaintext(fields);

        let (path, body, cookie, aes) = {
            let session = self.lock_session();
            let aes = session
                .aes_key
                .clone()
                .ok_or_else(|| Error::Protocol("no AES session key, login first".into()))?;
            let auth = session
                .auth_key
                .as_ref()
                .ok_or_else(|| Error::Protocol("no signing key, login first".into()))?;

            let envelope =
                Envelope::seal(&plaintext, &aes, auth, &session.credential_digest, login)?;
            (
                luci_path(session.token_segment(), rpc.endpoint, rpc.form),
                envelope.to_form(),
                session.cookies.header_value(),
                aes,
            )
        };
        debug!(
            endpoint = rpc.endpoint,
            form = rpc.form,
            bytes = body.len(),
            "encrypted request"
        );

        let response = self.transport.post(&path, &body, cookie.as_deref()).await?;
        self.lock_session().cookies.absorb_all(&response.set_cookies);

        envelope::open(parse_body(&response.body), &aes)
    }

    /// Authenticated request; returns `data` of a successful response.
    async fn call(&self, rpc: Rpc, fields: &Fields) -> Result<Value, Error> {
        self.ensure_connected().await?;
        let response = self.post_encrypted(rpc, fields, false).await?;
        response::expect_success(rpc.operation, &response).cloned()
    }

    async fn blocked_records(&self) -> Result<Vec<DeviceRecord>, Error> {
        let data = self
            .call(commands::BLOCKED_LIST, &commands::operation("load"))
            .await?;
        response::device_list(&data)
    }

    /// MAC addresses on the blocked list, in router order.
    ///
    /// Addresses are returned exactly as the router reports them.
    pub async fn get_blocked_devices(&self) -> Result<Vec<String>, Error> {
        let records = self.blocked_records().await?;
        debug!(count = records.len(), "loaded blocked list");
        Ok(records.into_iter().map(|r| r.mac).collect())
    }

    /// Adds a device to the blocked list.
    ///
    /// `mac` must be six hex octets separated by `:` or `-`; it is sent to
    /// the router as written.
    pub async fn block_device(&self, mac: &str) -> Result<(), Error> {
        let mac = MacAddress::parse(mac)?;
        self.call(commands::BLOCK, &commands::block(&mac)?).await?;
        info!(mac = %mac, "device blocked");
        Ok(())
    }

    /// Removes a device from the blocked list.
    ///
    /// Returns `Ok(false)` without changing anything if the device is not
    /// blocked. MAC addresses are compared by value, so `aa:bb:..` matches a
    /// router entry `AA-BB-..`.
    ///
    /// The router removes entries by position. The position is looked up
    /// right before the removal, but another client editing the list in
    /// between can still shift it and cause the wrong entry to be removed.
    pub async fn unblock_device(&self, mac: &str) -> Result<bool, Error> {
        let mac = MacAddress::parse(mac)?;
        let records = self.blocked_records().await?;

        let Some(index) = records.iter().position(|r| mac.matches(&r.mac)) else {
            debug!(mac = %mac, "device not blocked, nothing to do");
            return Ok(false);
        };

        self.call(commands::UNBLOCK, &commands::unblock(index))
            .await?;
        info!(mac = %mac, index, "device unblocked");
        Ok(true)
    }

    /// Checks with the router whether the session is still valid.
    ///
    /// Returns `false` without a request when no token is held, and `false`
    /// when the router rejects the session. Network errors are returned.
    pub async fn get_logged_in_status(&self) -> Result<bool, Error> {
        if !self.is_authenticated() {
            return Ok(false);
        }

        match self
            .post_encrypted(commands::LED, &commands::operation("read"), false)
            .await
        {
            Ok(response) => Ok(response.get("success").and_then(Value::as_bool) == Some(true)),
            Err(e @ (Error::Timeout(_)
            | Error::HostUnreachable(_)
            | Error::ConnectionFailed(_)
            | Error::IoError(_))) => Err(e),
            Err(e) => {
                debug!(error = %e, "session check failed");
                Ok(false)
            }
        }
    }

    /// Devices the router currently sees on the network.
    pub async fn get_connected_devices(&self) -> Result<Vec<DeviceRecord>, Error> {
        let data = self
            .call(commands::CONNECTED_DEVICES, &commands::operation("load"))
            .await?;
        response::device_list(&data)
    }

    /// Returns true if the router's LEDs are on.
    pub async fn get_led_status(&self) -> Result<bool, Error> {
        let data = self.call(commands::LED, &commands::operation("read")).await?;
        let setting: LedSetting = response::parse_data(commands::LED.operation, &data)?;
        Ok(setting.is_on())
    }

    /// Switches the LEDs on or off.
    ///
    /// The router only offers a toggle, so the current state is read first
    /// and nothing is sent if it already matches.
    pub async fn set_led_status(&self, on: bool) -> Result<(), Error> {
        if self.get_led_status().await? == on {
            debug!(on, "LED already in requested state");
            return Ok(());
        }

        self.call(commands::LED, &commands::led_toggle()).await?;
        info!(on, "LED toggled");
        Ok(())
    }

    /// Ends the session on the router.
    ///
    /// Returns whether the router accepted the logout. The local token is
    /// dropped only when it did. Without a session this is a no-op returning
    /// `false`.
    pub async fn logout(&self) -> Result<bool, Error> {
        if !self.is_authenticated() {
            return Ok(false);
        }

        let response = self
            .post_encrypted(commands::LOGOUT, &commands::operation("write"), false)
            .await?;
        let accepted = response.get("success").and_then(Value::as_bool) == Some(true);

        if accepted {
            self.lock_session().token = None;
            info!(host = self.host(), "logged out");
        } else {
            warn!(host = self.host(), "logout rejected");
        }
        Ok(accepted)
    }
}

impl<T: Transport> std::fmt::Debug for RouterClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterClient")
            .field("config", &self.config)
            .field("session", &*self.lock_session())
            .finish_non_exhaustive()
    }
}
