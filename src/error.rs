use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Transport-level failure (connect error, timeout, TLS).
    Http(reqwest::Error),
    /// Vendor answered with a non-200 status.
    Status { status: u16, body: String },
    /// Login rejected or login response unusable.
    Auth(String),
    /// A single device's payload could not be decoded.
    Parse { device: String, reason: String },
    UnsupportedAttribute(String),
    /// A known control attribute was given a value of the wrong shape.
    InvalidValue { attribute: String, value: String },
    UnknownDevice(String),
    /// Control call answered with something other than the empty object.
    ControlRejected(String),
    /// Top-level vendor response missing an expected shape.
    Protocol(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status { status, body } => write!(f, "request failed with status {status}: {body}"),
            Error::Auth(msg) => write!(f, "authentication failed: {msg}"),
            Error::Parse { device, reason } => write!(f, "failed to decode device {device}: {reason}"),
            Error::UnsupportedAttribute(attr) => write!(f, "unsupported control attribute: {attr}"),
            Error::InvalidValue { attribute, value } => {
                write!(f, "invalid value for {attribute}: {value}")
            }
            Error::UnknownDevice(mac) => write!(f, "unknown device: {mac}"),
            Error::ControlRejected(body) => write!(f, "control not acknowledged: {body}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
