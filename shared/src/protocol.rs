//! Line protocol types
//!
//! Every exchange is one request line answered by exactly one response line.
//! Fields are separated by a single TAB:
//! ```text
//! VERSION                  ->  OK\t<version>      | ERR\t<reason>
//! BIND\t<base64 tar.gz>    ->  OK                 | ERR\t<reason>
//! UNBIND                   ->  OK                 | ERR\t<reason>
//! ```

use std::fmt;
use thiserror::Error;

/// Errors raised while parsing a response line
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty response line")]
    EmptyResponse,

    #[error("Unknown response status: {0}")]
    UnknownStatus(String),
}

/// Request verbs understood by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    Version,
    Bind,
    Unbind,
    /// Anything else, kept verbatim for logging
    Unknown(String),
}

impl Verb {
    pub fn parse(token: &str) -> Self {
        match token {
            "VERSION" => Verb::Version,
            "BIND" => Verb::Bind,
            "UNBIND" => Verb::Unbind,
            other => Verb::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Verb::Version => "VERSION",
            Verb::Bind => "BIND",
            Verb::Unbind => "UNBIND",
            Verb::Unknown(token) => token,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    /// Opaque argument, empty for verbs that take none
    pub arg: String,
}

impl Command {
    pub fn version() -> Self {
        Self {
            verb: Verb::Version,
            arg: String::new(),
        }
    }

    pub fn bind(payload: impl Into<String>) -> Self {
        Self {
            verb: Verb::Bind,
            arg: payload.into(),
        }
    }

    pub fn unbind() -> Self {
        Self {
            verb: Verb::Unbind,
            arg: String::new(),
        }
    }

    /// Parse a request line (terminator already removed).
    /// The line is split on the first TAB; the rest is the argument.
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let (verb, arg) = match line.split_once('\t') {
            Some((verb, arg)) => (verb, arg),
            None => (line, ""),
        };

        Self {
            verb: Verb::parse(verb),
            arg: arg.to_string(),
        }
    }

    /// Render the request line without terminator
    pub fn to_line(&self) -> String {
        if self.arg.is_empty() {
            self.verb.as_str().to_string()
        } else {
            format!("{}\t{}", self.verb, self.arg)
        }
    }
}

/// Stable failure reasons sent to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    ChecksumFailed,
    InternalError,
    UnsupportedCommand,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::ChecksumFailed => "Checksum failed",
            ErrorReason::InternalError => "Internal error",
            ErrorReason::UnsupportedCommand => "Unsupported command",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(Option<String>),
    /// Failure message as received; the device only sends [`ErrorReason`] strings
    Err(String),
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(None)
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Response::Ok(Some(message.into()))
    }

    pub fn error(reason: ErrorReason) -> Self {
        Response::Err(reason.as_str().to_string())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Message carried by the response, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Response::Ok(message) => message.as_deref(),
            Response::Err(message) => Some(message),
        }
    }

    /// Parse a response line (terminator already removed)
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return Err(ProtocolError::EmptyResponse);
        }

        let (status, message) = match line.split_once('\t') {
            Some((status, message)) => (status, Some(message.to_string())),
            None => (line, None),
        };

        match status {
            "OK" => Ok(Response::Ok(message.filter(|m| !m.is_empty()))),
            "ERR" => Ok(Response::Err(message.unwrap_or_default())),
            other => Err(ProtocolError::UnknownStatus(other.to_string())),
        }
    }

    /// Render the response line without terminator
    pub fn to_line(&self) -> String {
        match self {
            Response::Ok(None) => "OK".to_string(),
            Response::Ok(Some(message)) => format!("OK\t{}", message),
            Response::Err(message) => format!("ERR\t{}", message),
        }
    }
}
