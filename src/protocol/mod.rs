//! Wire protocol module.
//!
//! Defines the request/response envelopes exchanged with the fronting proxy
//! and the message framing used on the socket.
//!
//! ## Wire Format
//!
//! Messages are newline-delimited JSON:
//! ```text
//! {"method":"GET","path":"/echo/","query_params":{"a":"1"}}\n
//! ```

mod method;
mod request;
mod response;
mod wire;

pub use method::Method;
pub use request::{HttpRequest, Principal};
pub use response::{HttpResponse, ResponseBody};
pub use wire::{
    read_frame, read_frame_with_timeout, write_frame, write_frame_with_timeout,
    DEFAULT_MAX_FRAME_SIZE,
};
