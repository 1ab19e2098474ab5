//! Protocol constants, opcodes and error types.

use thiserror::Error;

/// Magic GUID appended to the client key before hashing (RFC 6455 section 1.3).
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// FIN flag in the first header byte.
pub const FIN_BIT: u8 = 0x80;

/// RSV1..RSV3 bits in the first header byte.
pub const RSV_BITS: u8 = 0x70;

/// MASK flag in the second header byte.
pub const MASK_BIT: u8 = 0x80;

/// 7-bit length value announcing a 16-bit extended length.
pub const LEN_16_ESCAPE: u8 = 126;

/// 7-bit length value announcing a 64-bit extended length.
pub const LEN_64_ESCAPE: u8 = 127;

/// Largest payload carried in the 7-bit length field.
pub const MAX_SHORT_PAYLOAD: usize = 125;

/// Largest payload carried in the 16-bit extended length.
pub const MAX_MEDIUM_PAYLOAD: usize = u16::MAX as usize;

/// Frame opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    /// Wire value of the opcode
    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Opcode::Continuation),
            0x1 => Ok(Opcode::Text),
            0x2 => Ok(Opcode::Binary),
            0x8 => Ok(Opcode::Close),
            0x9 => Ok(Opcode::Ping),
            0xA => Ok(Opcode::Pong),
            _ => Err(FrameError::Invalid("reserved opcode")),
        }
    }
}

/// Frame decoding failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The buffer holds a prefix of a frame; `needed` more bytes complete the
    /// next header field or the payload.
    #[error("incomplete frame: {needed} more byte(s) needed")]
    Incomplete { needed: usize },

    /// The bytes cannot start a frame this codec accepts.
    #[error("invalid frame: {0}")]
    Invalid(&'static str),
}

/// Upgrade negotiation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("request is not valid UTF-8 text")]
    Malformed,

    #[error("malformed request line")]
    BadRequestLine,

    #[error("request is not a websocket upgrade")]
    NotUpgrade,

    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_wire_values() {
        for op in [
            Opcode::Continuation,
            Opcode::Text,
            Opcode::Binary,
            Opcode::Close,
            Opcode::Ping,
            Opcode::Pong,
        ] {
            assert_eq!(Opcode::try_from(op.as_u8()), Ok(op));
        }
    }

    #[test]
    fn test_reserved_opcode_rejected() {
        assert_eq!(
            Opcode::try_from(0x3),
            Err(FrameError::Invalid("reserved opcode"))
        );
    }
}
