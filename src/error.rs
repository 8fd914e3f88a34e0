//! Unified error type.

use std::fmt;

/// Boxed error returned by handlers and middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by ferrule's fallible operations.
///
/// Registration errors are synchronous and leave the router untouched.
/// Dispatch errors describe what happened to one request only.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The handler source carried no handler at all.
    #[error("route handler is neither a handler nor a callable")]
    InvalidHandlerKind,

    /// The matching engine has no tree for this method.
    #[error("method `{0}` cannot be routed")]
    UnsupportedMethod(String),

    /// Only raised when the router rejects duplicate registrations.
    #[error("route {method} `{path}` is already registered")]
    DuplicateRoute { method: String, path: String },

    #[error("invalid route `{path}`: {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    /// Chaining a middleware onto an already-registered handler failed.
    #[error("failed to attach middleware to {route}: {reason}")]
    MiddlewareAttach { route: String, reason: String },

    /// A handler panicked and no error handler took over.
    #[error("handler fault: {0}")]
    HandlerFault(Fault),

    /// A handler completed but reported a failure.
    #[error("handler returned an error: {0}")]
    HandlerReturned(#[source] BoxError),

    #[error("http: {0}")]
    Http(#[from] http::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("server closed")]
    ServerClosed,

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("render: {0}")]
    Render(String),
}

/// A recovered handler panic.
///
/// Holds the panic payload rendered as text; `&str` and `String` payloads are
/// kept verbatim, anything else becomes `"unknown panic"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    message: String,
}

impl Fault {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_owned()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_keeps_str_and_string_payloads() {
        let f = Fault::from_payload(Box::new("boom"));
        assert_eq!(f.message(), "boom");

        let f = Fault::from_payload(Box::new(String::from("kaboom")));
        assert_eq!(f.to_string(), "kaboom");

        let f = Fault::from_payload(Box::new(42_u32));
        assert_eq!(f.message(), "unknown panic");
    }
}
