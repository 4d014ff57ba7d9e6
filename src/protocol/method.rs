//! HTTP method token.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolErrorKind, TrackingError};

/// An HTTP request method.
///
/// Standard methods get their own variant; any other valid token is kept
/// verbatim in [`Method::Extension`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Trace,
    Connect,
    Extension(String),
}

impl Method {
    /// The method as it appears on the request line.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Extension(token) => token,
        }
    }

    /// Lowercased method name, used as the fallback handler method label.
    pub fn lowercase(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl FromStr for Method {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            // RFC 9110 token characters
            token
                if !token.is_empty()
                    && token
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)) =>
            {
                Method::Extension(token.to_string())
            }
            other => {
                return Err(TrackingError::Protocol {
                    kind: ProtocolErrorKind::InvalidMethod {
                        method: other.to_string(),
                    },
                })
            }
        };
        Ok(method)
    }
}

impl TryFrom<String> for Method {
    type Error = TrackingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_methods() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert_eq!(Method::Patch.lowercase(), "patch");
    }

    #[test]
    fn test_parse_extension_method_kept_verbatim() {
        let method: Method = "PROPFIND".parse().unwrap();
        assert_eq!(method, Method::Extension("PROPFIND".to_string()));
        assert_eq!(method.as_str(), "PROPFIND");
    }

    #[test]
    fn test_parse_invalid_method() {
        assert!("".parse::<Method>().is_err());
        assert!("GE T".parse::<Method>().is_err());
    }

    #[test]
    fn test_method_serializes_as_string() {
        let json = serde_json::to_string(&Method::Post).unwrap();
        assert_eq!(json, "\"POST\"");
        let parsed: Method = serde_json::from_str("\"OPTIONS\"").unwrap();
        assert_eq!(parsed, Method::Options);
    }
}
