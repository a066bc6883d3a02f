//! Wire-style dumps of requests and responses for diagnostic logging.

use hyper::{HeaderMap, Request};
use std::fmt;

/// Renders a message head, and optionally its body, roughly as it appears on the wire.
pub struct Dump<'a> {
    start_line: String,
    headers: &'a HeaderMap,
    body: Option<&'a [u8]>,
}

impl<'a> Dump<'a> {
    pub fn request<B>(request: &'a Request<B>) -> Self {
        Self {
            start_line: format!(
                "{} {} {:?}",
                request.method(),
                request.uri(),
                request.version()
            ),
            headers: request.headers(),
            body: None,
        }
    }

    pub fn request_parts(parts: &'a http::request::Parts) -> Self {
        Self {
            start_line: format!("{} {} {:?}", parts.method, parts.uri, parts.version),
            headers: &parts.headers,
            body: None,
        }
    }

    pub fn response_parts(parts: &'a http::response::Parts) -> Self {
        Self {
            start_line: format!("{:?} {}", parts.version, parts.status),
            headers: &parts.headers,
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: &'a [u8]) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.start_line)?;
        for (name, value) in self.headers {
            write!(f, "{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()))?;
        }
        f.write_str("\r\n")?;
        if let Some(body) = self.body {
            f.write_str(&String::from_utf8_lossy(body))?;
        }
        Ok(())
    }
}
