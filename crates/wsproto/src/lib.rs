//! Minimal text-message channel protocol (RFC 6455 subset).
//!
//! Pure, I/O-free building blocks for the observer channel:
//!
//! - [`frame`]: encode/decode of single-frame messages with the three
//!   payload length classes (7-bit, 16-bit, 64-bit escape) and client masking
//! - [`handshake`]: parsing of the HTTP upgrade request and computation of
//!   the `Sec-WebSocket-Accept` token and `101 Switching Protocols` response
//!
//! Not supported: fragmentation, compression, sub-protocols, extensions and
//! control-frame replies.
//!
//! # Example
//!
//! ```
//! use wsproto::{frame, handshake};
//!
//! let accept = handshake::accept_key("dGhlIHNhbXBsZSBub25jZQ==");
//! assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
//!
//! let wire = frame::encode(br#"{"type":"initial_status"}"#);
//! assert_eq!(wire[0], 0x81);
//! assert_eq!(&frame::decode(&wire).unwrap()[..], br#"{"type":"initial_status"}"#);
//! ```

pub mod frame;
pub mod handshake;
pub mod types;

pub use frame::{Frame, apply_mask, decode, encode};
pub use handshake::{Handshake, accept_key, negotiate};
pub use types::{FrameError, HandshakeError, Opcode};
