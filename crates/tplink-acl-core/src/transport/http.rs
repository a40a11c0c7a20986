//! HTTP transport for the router's LuCI admin API.
//!
//! # Note on HTTP Implementation
//!
//! Requests are written by hand over a `TcpStream` rather than through an
//! HTTP client library. The router only needs a handful of HTTP/1.1
//! features, it is picky about the exact header set its own web front end
//! sends, and this keeps `Set-Cookie` handling fully under our control.
//! Each request uses its own connection (`Connection: close`).

use std::borrow::Cow;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{
    config::DEFAULT_TIMEOUT,
    error::Error,
    transport::{HttpResponse, Transport},
};

/// Default HTTP port of the admin interface.
pub const DEFAULT_PORT: u16 = 80;

/// Upper bound on a response we are willing to buffer.
const MAX_RESPONSE_LEN: usize = 4 * 1024 * 1024;

const ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
const CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";
const USER_AGENT: &str = concat!("tplink-acl/", env!("CARGO_PKG_VERSION"));

/// Transport that speaks HTTP/1.1 to the router.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tplink_acl_core::transport::{HttpTransport, Transport, luci_path};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let transport = HttpTransport::new("192.168.0.1", Duration::from_secs(5));
///     let response = transport
///         .post(&luci_path("", "login", "keys"), "operation=read", None)
///         .await?;
///     println!("{}", response.body);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    host: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a new transport.
    ///
    /// # Arguments
    ///
    /// * `host` - Router hostname or IP address, optionally with `:port`
    /// * `timeout` - Timeout for a whole request/response exchange
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            timeout,
        }
    }

    /// Socket address to connect to, adding the default port if missing.
    ///
    /// A bare IPv6 literal such as `fe80::1` has no port and gets bracketed.
    fn addr(&self) -> String {
        let host = self.host.as_str();
        if let Ok(ip) = host.parse::<IpAddr>() {
            return SocketAddr::new(ip, DEFAULT_PORT).to_string();
        }
        if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            return format!("[{}]:{}", inner, DEFAULT_PORT);
        }
        if host.contains(':') {
            host.to_string()
        } else {
            format!("{}:{}", host, DEFAULT_PORT)
        }
    }

    /// Value of the `Host` header; IPv6 literals must be bracketed there.
    fn host_header(&self) -> Cow<'_, str> {
        match self.host.parse::<Ipv6Addr>() {
            Ok(_) => Cow::Owned(format!("[{}]", self.host)),
            Err(_) => Cow::Borrowed(self.host.as_str()),
        }
    }

    fn build_request(&self, path: &str, body: &str, cookie: Option<&str>) -> Vec<u8> {
        // Title-case headers, mirroring what the router's web UI sends
        let mut request = format!(
            "POST {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Accept: {}\r\n\
             User-Agent: {}\r\n\
             Content-Type: {}\r\n\
             X-Requested-With: XMLHttpRequest\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n",
            path,
            self.host_header(),
            ACCEPT,
            USER_AGENT,
            CONTENT_TYPE,
            body.len()
        );

        if let Some(cookie_value) = cookie {
            request.push_str(&format!("Cookie: {}\r\n", cookie_value));
        }

        request.push_str("\r\n");

        let mut bytes = request.into_bytes();
        bytes.extend_from_slice(body.as_bytes());
        bytes
    }

    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, Error> {
        let addr = self.addr();
        debug!(addr = %addr, "connecting");

        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| connect_error(&addr, e))?;

        stream
            .write_all(request)
            .await
            .map_err(|e| Error::IoError(format!("Write failed: {}", e)))?;

        let mut response = Vec::with_capacity(4096);
        let mut buf = [0u8; 4096];

        loop {
            let n = stream
                .read(&mut buf)
                .await
                .map_err(|e| Error::IoError(format!("Read failed: {}", e)))?;

            if n == 0 {
                break;
            }

            response.extend_from_slice(&buf[..n]);

            if response.len() > MAX_RESPONSE_LEN {
                return Err(Error::Protocol(format!(
                    "Response too large: more than {} bytes",
                    MAX_RESPONSE_LEN
                )));
            }

            if is_complete(&response) {
                break;
            }
        }

        Ok(response)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new("192.168.0.1", DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        path: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> Result<HttpResponse, Error> {
        let request = self.build_request(path, body, cookie);
        debug!(host = %self.host, path, bytes = request.len(), "sending request");

        let raw = timeout(self.timeout, self.exchange(&request))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "no response from {} within {:?}",
                    self.host, self.timeout
                ))
            })??;

        let response = parse_response(&raw)?;
        debug!(
            bytes = response.body.len(),
            cookies = response.set_cookies.len(),
            "received response"
        );
        Ok(response)
    }
}

fn connect_error(addr: &str, err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::HostUnreachable | ErrorKind::NetworkUnreachable => {
            Error::HostUnreachable(format!("{}: {}", addr, err))
        }
        ErrorKind::TimedOut => Error::Timeout(format!("{}: {}", addr, err)),
        _ => Error::ConnectionFailed(format!("Connection to {} failed: {}", addr, err)),
    }
}

/// Parses a complete raw HTTP response.
fn parse_response(raw: &[u8]) -> Result<HttpResponse, Error> {
    let header_end = find_header_end(raw)
        .ok_or_else(|| Error::Protocol("Invalid HTTP response: no header end".into()))?;

    let headers = String::from_utf8_lossy(&raw[..header_end]);
    let status = parse_status_code(&headers)
        .ok_or_else(|| Error::Protocol("Invalid HTTP response: no status code".into()))?;
    if (200..300).contains(&status) {
        debug!(status, "response status");
    } else {
        warn!(status, "router answered with an error status, reading body anyway");
    }

    let mut body = raw[header_end + 4..].to_vec();
    if is_chunked(&headers) {
        body = decode_chunked(&body)?;
    } else if let Some(len) = parse_content_length(&headers) {
        body.truncate(len);
    }

    Ok(HttpResponse {
        set_cookies: parse_set_cookies(&headers),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Whether enough bytes have arrived to stop reading before EOF.
fn is_complete(data: &[u8]) -> bool {
    let Some(header_end) = find_header_end(data) else {
        return false;
    };
    let headers = String::from_utf8_lossy(&data[..header_end]);
    let body = &data[header_end + 4..];

    if is_chunked(&headers) {
        return body.ends_with(b"0\r\n\r\n");
    }
    match parse_content_length(&headers) {
        Some(len) => body.len() >= len,
        None => false,
    }
}

/// Find the position of "\r\n\r\n" in the response (end of headers).
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse the HTTP status code from the response headers.
fn parse_status_code(headers: &str) -> Option<u16> {
    headers
        .lines()
        .next()?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

fn header_values<'a>(headers: &'a str, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    headers.lines().skip(1).filter_map(move |line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then_some(value.trim())
    })
}

/// Parse the Content-Length header value.
fn parse_content_length(headers: &str) -> Option<usize> {
    header_values(headers, "content-length")
        .next()?
        .parse()
        .ok()
}

fn is_chunked(headers: &str) -> bool {
    header_values(headers, "transfer-encoding").any(|v| v.eq_ignore_ascii_case("chunked"))
}

/// Collect every Set-Cookie header value.
fn parse_set_cookies(headers: &str) -> Vec<String> {
    header_values(headers, "set-cookie")
        .map(str::to_string)
        .collect()
}

/// Decode a `Transfer-Encoding: chunked` body.
fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(data.len());
    loop {
        let line_end = data
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or_else(|| Error::Protocol("Invalid chunked body: missing size line".into()))?;
        let size_line = String::from_utf8_lossy(&data[..line_end]);
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16).map_err(|_| {
            Error::Protocol(format!("Invalid chunked body: bad chunk size {:?}", size_hex))
        })?;

        data = &data[line_end + 2..];
        if size == 0 {
            return Ok(out);
        }
        if data.len() < size {
            return Err(Error::Protocol("Invalid chunked body: truncated chunk".into()));
        }
        out.extend_from_slice(&data[..size]);
        data = data.get(size + 2..).unwrap_or_default();
    }
}
