//! Transport layer for talking to the router's web administration API.
//!
//! The router exposes its admin API under LuCI at
//! `http://<host>/cgi-bin/luci/;stok=<token>/<endpoint>?form=<form>`. Every
//! call is a form encoded POST; responses are JSON, except when they are not,
//! so bodies are always read as text first.
//!
//! - [`HttpTransport`]: HTTP/1.1 over a plain TCP socket
//! - [`Transport`]: the seam the client talks through, so tests can swap in
//!   an in-memory router
//!
//! Cookie handling lives here too: [`CookieJar`] collects `Set-Cookie`
//! values and renders the `Cookie` header for later requests.

pub mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::Error;

/// Raw HTTP response as seen by the client.
///
/// The status code is not part of it: the router answers errors in the
/// body, and bodies are read whatever the status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Every `Set-Cookie` header value, in the order received.
    pub set_cookies: Vec<String>,
    /// Response body decoded as (lossy) UTF-8.
    pub body: String,
}

/// Trait for router transports.
///
/// Implementations send a single form encoded POST and hand back the raw
/// response. Timeouts are the implementation's responsibility.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Posts `body` to `path` (which includes the query string).
    ///
    /// # Arguments
    ///
    /// * `path` - Request target, e.g. `/cgi-bin/luci/;stok=/login?form=keys`
    /// * `body` - `application/x-www-form-urlencoded` body
    /// * `cookie` - Value for the `Cookie` header, if any cookies are held
    async fn post(
        &self,
        path: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> Result<HttpResponse, Error>;
}

/// Builds the LuCI request target for an endpoint.
///
/// The session token is embedded as a path segment and is empty before
/// login.
///
/// ```
/// use tplink_acl_core::transport::luci_path;
///
/// assert_eq!(
///     luci_path("", "login", "keys"),
///     "/cgi-bin/luci/;stok=/login?form=keys"
/// );
/// assert_eq!(
///     luci_path("abc123", "admin/access_control", "black_list"),
///     "/cgi-bin/luci/;stok=abc123/admin/access_control?form=black_list"
/// );
/// ```
pub fn luci_path(token: &str, endpoint: &str, form: &str) -> String {
    format!("/cgi-bin/luci/;stok={}/{}?form={}", token, endpoint, form)
}

/// Serializes fields as an `application/x-www-form-urlencoded` body,
/// keeping the given order.
pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parses a response body as JSON, wrapping anything else as `{"data": text}`.
pub fn parse_body(text: &str) -> Value {
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            tracing::debug!(len = text.len(), "response is not JSON, wrapping as data");
            json!({ "data": text })
        }
    }
}

/// Cookies accumulated from `Set-Cookie` headers.
///
/// Names keep their first-seen order; a later cookie with the same name
/// replaces the value in place.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one `Set-Cookie` header value into the jar.
    ///
    /// Only `name=value` up to the first `;` is kept; attributes such as
    /// `Path` or `HttpOnly` are dropped. Values without `=` are ignored.
    pub fn absorb(&mut self, set_cookie: &str) {
        let pair = set_cookie.split(';').next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        match self.cookies.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.trim().to_string(),
            None => self
                .cookies
                .push((name.to_string(), value.trim().to_string())),
        }
    }

    /// Folds every header of a response into the jar.
    pub fn absorb_all<'a>(&mut self, set_cookies: impl IntoIterator<Item = &'a String>) {
        for cookie in set_cookies {
            self.absorb(cookie);
        }
    }

    /// Returns `true` if no cookies have been received.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Renders the `Cookie` request header value, or `None` when empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

// Cookie values are session credentials
impl std::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.cookies.iter().map(|(n, _)| n))
            .finish()
    }
}
