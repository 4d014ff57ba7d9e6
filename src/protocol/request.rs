//! Inbound request envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::method::Method;

/// The principal attached to a request by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    /// An unauthenticated caller.
    Anonymous,
    /// An authenticated user.
    User {
        /// Stable identifier of the user.
        id: String,
        /// Displayable username.
        username: String,
    },
}

impl Principal {
    /// Create an authenticated principal.
    pub fn user(id: impl Into<String>, username: impl Into<String>) -> Self {
        Principal::User {
            id: id.into(),
            username: username.into(),
        }
    }

    /// Whether this principal is anonymous.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }
}

/// An HTTP request as seen by an endpoint.
///
/// The fronting proxy fills in `forwarded_for` (the `X-Forwarded-For`
/// header value) and `remote_addr` (the raw connection address); both may be
/// comma-separated lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Unique identifier for the request.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// HTTP method.
    pub method: Method,

    /// Request path, without query string.
    pub path: String,

    /// Host the request was addressed to.
    #[serde(default)]
    pub host: String,

    /// Value of the forwarding header, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_for: Option<String>,

    /// Direct connection address, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,

    /// Decoded query parameters.
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,

    /// Authenticated principal slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
}

impl HttpRequest {
    /// Create a request with no headers, parameters or principal.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            host: String::new(),
            forwarded_for: None,
            remote_addr: None,
            query_params: BTreeMap::new(),
            principal: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn with_forwarded_for(mut self, value: impl Into<String>) -> Self {
        self.forwarded_for = Some(value.into());
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}
