//! Error types for font source attempts.
//!
//! Font failures never escape [`crate::FontResolver::resolve`]; they are
//! recorded in the resolution trace and logged.

use core::fmt;

/// Failure class for a single font source attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontErrorKind {
    /// Transport-level failure (DNS, connect, TLS, read).
    Network,
    /// The attempt exceeded its timeout.
    Timeout,
    /// The server answered with a non-success status.
    Status(u16),
    /// The payload could not be decoded into font bytes.
    Payload,
    /// The decoded bytes are not a usable font.
    InvalidFont,
    /// The fetcher has no transport for this source.
    Unavailable,
}

impl fmt::Display for FontErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Timeout => f.write_str("timeout"),
            Self::Status(code) => write!(f, "status {}", code),
            Self::Payload => f.write_str("payload"),
            Self::InvalidFont => f.write_str("invalid font"),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Structured error for one font source attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontError {
    /// Failure class.
    pub kind: FontErrorKind,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Source URL, when known.
    pub url: Option<Box<str>>,
}

impl FontError {
    /// Build an error of the given kind.
    pub fn new(kind: FontErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into().into_boxed_str(),
            url: None,
        }
    }

    /// Attach the source URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into().into_boxed_str());
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FontErrorKind::Network, "FONT_FETCH_NETWORK", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FontErrorKind::Timeout, "FONT_FETCH_TIMEOUT", message)
    }

    pub fn status(code: u16) -> Self {
        Self::new(
            FontErrorKind::Status(code),
            "FONT_FETCH_STATUS",
            format!("unexpected HTTP status {}", code),
        )
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::new(FontErrorKind::Payload, "FONT_PAYLOAD", message)
    }

    pub fn invalid_font(message: impl Into<String>) -> Self {
        Self::new(FontErrorKind::InvalidFont, "FONT_INVALID", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FontErrorKind::Unavailable, "FONT_FETCH_UNAVAILABLE", message)
    }
}

impl fmt::Display for FontError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.kind, self.code, self.message)?;
        if let Some(url) = self.url.as_deref() {
            write!(f, " [url={}]", url)?;
        }
        Ok(())
    }
}

impl std::error::Error for FontError {}
