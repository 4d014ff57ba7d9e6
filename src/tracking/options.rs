//! Per-endpoint interceptor options.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::HandlerOverrides;
use crate::error::TrackingError;
use crate::protocol::{HttpRequest, HttpResponse, Method};

use super::redact::{RedactionSentinel, DEFAULT_REDACTION_SENTINEL};

/// Custom decision of whether a request/response pair is logged.
pub type ShouldLogFn = Arc<dyn Fn(&HttpRequest, &HttpResponse) -> bool + Send + Sync>;

/// Which HTTP methods are logged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoggingMethods {
    /// Every method is logged.
    #[default]
    All,
    /// Only the listed methods are logged.
    Only(HashSet<Method>),
}

impl LoggingMethods {
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            LoggingMethods::All => true,
            LoggingMethods::Only(methods) => methods.contains(method),
        }
    }
}

/// Options that tune how one endpoint is tracked.
///
/// The sentinel is kept unvalidated here; building an
/// [`Interceptor`](super::Interceptor) rejects a non-string sentinel.
#[derive(Clone)]
pub struct InterceptorOptions {
    pub(crate) logging_methods: LoggingMethods,
    pub(crate) sensitive_fields: HashSet<String>,
    pub(crate) redaction_sentinel: Value,
    pub(crate) should_log: Option<ShouldLogFn>,
}

impl InterceptorOptions {
    /// Log every method, redact only the built-in keys.
    pub fn new() -> Self {
        Self {
            logging_methods: LoggingMethods::All,
            sensitive_fields: HashSet::new(),
            redaction_sentinel: Value::String(DEFAULT_REDACTION_SENTINEL.to_string()),
            should_log: None,
        }
    }

    /// Restrict logging to `methods`.
    pub fn logging_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.logging_methods = LoggingMethods::Only(methods.into_iter().collect());
        self
    }

    /// Add keys to redact on top of the built-in set.
    pub fn sensitive_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sensitive_fields
            .extend(fields.into_iter().map(|f| f.as_ref().to_lowercase()));
        self
    }

    /// Override the redaction sentinel.
    pub fn redaction_sentinel(mut self, sentinel: impl Into<Value>) -> Self {
        self.redaction_sentinel = sentinel.into();
        self
    }

    /// Replace the method-based decision with custom logic.
    pub fn should_log<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&HttpRequest, &HttpResponse) -> bool + Send + Sync + 'static,
    {
        self.should_log = Some(Arc::new(predicate));
        self
    }

    /// Apply overrides from the settings file.
    pub fn with_overrides(mut self, overrides: &HandlerOverrides) -> Result<Self, TrackingError> {
        if let Some(methods) = &overrides.logging_methods {
            let methods = methods
                .iter()
                .map(|m| m.to_ascii_uppercase().parse::<Method>())
                .collect::<Result<HashSet<_>, _>>()
                .map_err(|e| TrackingError::config(format!("logging_methods: {}", e)))?;
            self.logging_methods = LoggingMethods::Only(methods);
        }
        self = self.sensitive_fields(&overrides.sensitive_fields);
        if let Some(sentinel) = &overrides.redaction_sentinel {
            self.redaction_sentinel = sentinel.clone();
        }
        Ok(self)
    }

    pub(crate) fn validated_sentinel(&self) -> Result<RedactionSentinel, TrackingError> {
        RedactionSentinel::try_from(self.redaction_sentinel.clone())
    }
}

impl Default for InterceptorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InterceptorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorOptions")
            .field("logging_methods", &self.logging_methods)
            .field("sensitive_fields", &self.sensitive_fields)
            .field("redaction_sentinel", &self.redaction_sentinel)
            .field("should_log", &self.should_log.as_ref().map(|_| "<custom>"))
            .finish()
    }
}
