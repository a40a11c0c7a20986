//! Per-client session state and the login gate.
//!
//! A [`Session`] holds everything the client learned during login: the
//! token, both RSA keys, the AES session key and the cookies. It is reset at
//! the start of every login.
//!
//! [`LoginGate`] makes sure only one login handshake runs at a time. The
//! task that wins the gate logs in; everyone else waits for the gate to
//! open again instead of starting a handshake of their own, and then gets
//! the outcome of that login.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

use crate::{
    crypto::{AesSessionKey, RsaKey},
    error::Error,
    signature::AuthKey,
    transport::CookieJar,
};

/// How long a caller waits for someone else's login before giving up.
pub const LOGIN_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// What the client knows about its current session.
#[derive(Default)]
pub struct Session {
    pub(crate) token: Option<String>,
    pub(crate) password_key: Option<RsaKey>,
    pub(crate) auth_key: Option<AuthKey>,
    pub(crate) credential_digest: String,
    pub(crate) aes_key: Option<AesSessionKey>,
    pub(crate) cookies: CookieJar,
}

impl Session {
    /// Drops the token and keys, keeping cookies.
    pub(crate) fn reset(&mut self, credential_digest: String) {
        self.token = None;
        self.password_key = None;
        self.auth_key = None;
        self.aes_key = None;
        self.credential_digest = credential_digest;
    }

    /// Returns true once a non-empty token is held.
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Token as it appears in request URLs, empty before login.
    pub(crate) fn token_segment(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }
}

// Token and AES key grant access to the router
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("password_key", &self.password_key.is_some())
            .field("auth_key", &self.auth_key.as_ref().map(|k| k.sequence))
            .field("aes_key", &self.aes_key.is_some())
            .field("cookies", &self.cookies)
            .finish()
    }
}

/// How a login that held the gate ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A token was stored.
    Succeeded,
    /// The router refused the credentials.
    Refused,
    /// The handshake broke off: transport error, bad reply, or cancellation.
    Failed,
}

impl LoginOutcome {
    pub fn of(result: &Result<(), Error>) -> Self {
        match result {
            Ok(()) => LoginOutcome::Succeeded,
            Err(e) if e.is_authentication() => LoginOutcome::Refused,
            Err(_) => LoginOutcome::Failed,
        }
    }

    /// What a caller that waited on this login gets back.
    fn for_waiter(self) -> Result<(), Error> {
        match self {
            LoginOutcome::Succeeded => Ok(()),
            LoginOutcome::Refused => Err(Error::AuthenticationFailed(
                "concurrent login was refused by the router".into(),
            )),
            LoginOutcome::Failed => Err(Error::ConnectionFailed(
                "concurrent login did not complete".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct GateState {
    /// Bumped on every acquire; a guard only reopens its own generation.
    generation: u64,
    busy: bool,
    last: Option<LoginOutcome>,
}

/// Single-flight guard around the login handshake.
#[derive(Debug)]
pub struct LoginGate {
    state: watch::Sender<GateState>,
}

impl LoginGate {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(GateState::default()),
        }
    }

    /// Claims the gate if no login is in progress.
    ///
    /// The gate reopens when the returned guard is dropped, including when
    /// the login future is cancelled. Call [`LoginGuard::finish`] first so
    /// waiters learn how the login went.
    pub fn try_acquire(&self) -> Option<LoginGuard<'_>> {
        let mut generation = 0;
        let acquired = self.state.send_if_modified(|state| {
            if state.busy {
                return false;
            }
            state.generation += 1;
            state.busy = true;
            generation = state.generation;
            true
        });
        acquired.then_some(LoginGuard {
            gate: self,
            generation,
            outcome: LoginOutcome::Failed,
        })
    }

    /// Waits until the gate is open and returns the outcome of the login
    /// that held it.
    ///
    /// A refused login gives [`Error::AuthenticationFailed`]; any other
    /// failure gives [`Error::ConnectionFailed`]. After `limit` the gate is
    /// forced open and [`Error::LoginTimedOut`] is returned, so a stuck login
    /// cannot wedge the client forever.
    pub async fn wait(&self, limit: Duration) -> Result<(), Error> {
        let mut rx = self.state.subscribe();
        let waited_on = rx.borrow().generation;

        let last = match timeout(limit, rx.wait_for(|state| !state.busy)).await {
            Ok(Ok(state)) => state.last,
            // The sender lives in self, so the channel cannot close here
            Ok(Err(_)) => None,
            Err(_) => {
                tracing::warn!(?limit, "gave up waiting for login, resetting gate");
                self.state.send_if_modified(|state| {
                    if state.busy && state.generation == waited_on {
                        state.busy = false;
                        state.last = Some(LoginOutcome::Failed);
                        true
                    } else {
                        false
                    }
                });
                return Err(Error::LoginTimedOut);
            }
        };

        last.map_or(Ok(()), LoginOutcome::for_waiter)
    }

    /// Returns true while a login holds the gate.
    pub fn is_busy(&self) -> bool {
        self.state.borrow().busy
    }
}

impl Default for LoginGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the login gate closed; opens it on drop.
///
/// A guard whose gate was forced open by a timed-out waiter no longer owns
/// the gate, and dropping it leaves any newer login alone.
#[derive(Debug)]
pub struct LoginGuard<'a> {
    gate: &'a LoginGate,
    generation: u64,
    outcome: LoginOutcome,
}

impl LoginGuard<'_> {
    /// Records how the login ended, for the callers waiting on it.
    pub fn finish(&mut self, outcome: LoginOutcome) {
        self.outcome = outcome;
    }
}

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        let (generation, outcome) = (self.generation, self.outcome);
        self.gate.state.send_if_modified(|state| {
            if state.busy && state.generation == generation {
                state.busy = false;
                state.last = Some(outcome);
                true
            } else {
                false
            }
        });
    }
}
