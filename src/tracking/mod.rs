//! Request tracking module.
//!
//! Normalizes client addresses, redacts sensitive fields, extracts record
//! metadata and persists one [`LogRecord`] per logged request.

mod clock;
pub mod extract;
mod interceptor;
mod ip;
mod literal;
mod options;
mod record;
mod redact;
mod store;

pub use clock::{Clock, SystemClock};
pub use interceptor::{format_error_trace, Interceptor};
pub use ip::normalize_ip;
pub use literal::{parse_literal, MAX_LITERAL_DEPTH};
pub use options::{InterceptorOptions, LoggingMethods, ShouldLogFn};
pub use record::{LogRecord, RecordLimits, ANONYMOUS_LABEL, MAX_METHOD_LENGTH};
pub use redact::{
    decode_structured, FieldRedactor, RedactionSentinel, BASE_SENSITIVE_FIELDS,
    DEFAULT_REDACTION_SENTINEL,
};
pub use store::{JsonLinesStore, LogStore, MemoryStore, NullStore};
