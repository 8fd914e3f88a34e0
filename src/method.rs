//! HTTP method as a typed enum.
//!
//! The nine RFC 9110 methods carry routes. `PROPFIND` (WebDAV) and `PURGE`
//! (nginx / Varnish cache invalidation) are recognised so that registering
//! them fails loudly instead of silently never matching; see
//! [`Method::is_routable`]. Any other method string never matches a route and
//! falls through to the default handler.

use std::fmt;
use std::str::FromStr;

/// A known HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
    /// WebDAV, RFC 4918.
    Propfind,
    Purge,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect  => "CONNECT",
            Self::Delete   => "DELETE",
            Self::Get      => "GET",
            Self::Head     => "HEAD",
            Self::Options  => "OPTIONS",
            Self::Patch    => "PATCH",
            Self::Post     => "POST",
            Self::Put      => "PUT",
            Self::Trace    => "TRACE",
            Self::Propfind => "PROPFIND",
            Self::Purge    => "PURGE",
        }
    }

    /// Whether the matching engine keeps a tree for this method.
    pub fn is_routable(self) -> bool {
        !matches!(self, Self::Propfind | Self::Purge)
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CONNECT"  => Self::Connect,
            "DELETE"   => Self::Delete,
            "GET"      => Self::Get,
            "HEAD"     => Self::Head,
            "OPTIONS"  => Self::Options,
            "PATCH"    => Self::Patch,
            "POST"     => Self::Post,
            "PUT"      => Self::Put,
            "TRACE"    => Self::Trace,
            "PROPFIND" => Self::Propfind,
            "PURGE"    => Self::Purge,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = ();

    fn try_from(m: &http::Method) -> Result<Self, Self::Error> {
        m.as_str().parse()
    }
}
