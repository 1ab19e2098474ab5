//! Frame format and parsing.
//!
//! RFC 6455 Section 5.2 - Base Framing Protocol
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```
//!
//! The 64-bit length form is only accepted when the upper 32 bits are zero.

use crate::types::{
    FIN_BIT, FrameError, LEN_16_ESCAPE, LEN_64_ESCAPE, MASK_BIT, MAX_MEDIUM_PAYLOAD,
    MAX_SHORT_PAYLOAD, Opcode, RSV_BITS,
};
use bytes::{BufMut, Bytes, BytesMut};

/// A single decoded (or to-be-encoded) frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag
    pub fin: bool,

    /// Frame opcode
    pub opcode: Opcode,

    /// Masking key, present iff the MASK bit is set
    pub mask_key: Option<[u8; 4]>,

    /// Payload in clear (already unmasked after parsing)
    pub payload: Bytes,

    /// Bytes occupied by the header on the wire
    header_len: usize,
}

impl Frame {
    /// Create an unmasked, final text frame (server to client)
    pub fn text(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            fin: true,
            opcode: Opcode::Text,
            mask_key: None,
            header_len: header_len(payload.len(), false),
            payload,
        }
    }

    /// Create a masked, final text frame (client to server)
    pub fn masked_text(payload: impl Into<Bytes>, mask_key: [u8; 4]) -> Self {
        let payload = payload.into();
        Self {
            fin: true,
            opcode: Opcode::Text,
            mask_key: Some(mask_key),
            header_len: header_len(payload.len(), true),
            payload,
        }
    }

    /// Whether the frame carries a masking key
    pub fn is_masked(&self) -> bool {
        self.mask_key.is_some()
    }

    /// Total number of bytes this frame occupies on the wire
    pub fn wire_len(&self) -> usize {
        self.header_len + self.payload.len()
    }

    /// Parse one frame from the front of `data`.
    ///
    /// Trailing bytes beyond [`Frame::wire_len`] are left untouched; callers
    /// buffering a stream consume `wire_len()` bytes and parse again.
    pub fn parse(data: &[u8]) -> Result<Self, FrameError> {
        ensure(data, 2)?;

        let first = data[0];
        let second = data[1];

        if first & RSV_BITS != 0 {
            return Err(FrameError::Invalid("reserved bits set"));
        }

        let fin = first & FIN_BIT != 0;
        let opcode = Opcode::try_from(first & 0x0F)?;
        let masked = second & MASK_BIT != 0;

        let mut offset = 2;
        let payload_len = match second & 0x7F {
            LEN_16_ESCAPE => {
                ensure(data, offset + 2)?;
                let len = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
                offset += 2;
                len
            }
            LEN_64_ESCAPE => {
                ensure(data, offset + 8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&data[offset..offset + 8]);
                let len = u64::from_be_bytes(raw);
                if len > u32::MAX as u64 {
                    return Err(FrameError::Invalid("payload length exceeds 32 bits"));
                }
                offset += 8;
                len as usize
            }
            len => len as usize,
        };

        let mask_key = if masked {
            ensure(data, offset + 4)?;
            let key = [
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ];
            offset += 4;
            Some(key)
        } else {
            // Non-conforming clients may send in clear; accept the payload as-is.
            None
        };

        ensure(data, offset + payload_len)?;

        let mut payload = BytesMut::from(&data[offset..offset + payload_len]);
        if let Some(key) = mask_key {
            apply_mask(&mut payload, key);
        }

        Ok(Self {
            fin,
            opcode,
            mask_key,
            payload: payload.freeze(),
            header_len: offset,
        })
    }

    /// Serialize the frame, masking the payload when a key is present
    pub fn to_bytes(&self) -> Bytes {
        let len = self.payload.len();
        let mut buf = BytesMut::with_capacity(self.wire_len());

        let fin = if self.fin { FIN_BIT } else { 0 };
        buf.put_u8(fin | self.opcode.as_u8());

        let mask = if self.mask_key.is_some() { MASK_BIT } else { 0 };
        if len <= MAX_SHORT_PAYLOAD {
            buf.put_u8(mask | len as u8);
        } else if len <= MAX_MEDIUM_PAYLOAD {
            buf.put_u8(mask | LEN_16_ESCAPE);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(mask | LEN_64_ESCAPE);
            buf.put_u32(0);
            buf.put_u32(len as u32);
        }

        match self.mask_key {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask(&mut buf[start..], key);
            }
            None => buf.put_slice(&self.payload),
        }

        buf.freeze()
    }
}

/// Encode `payload` as a single unmasked, final text frame
pub fn encode(payload: &[u8]) -> Bytes {
    Frame::text(Bytes::copy_from_slice(payload)).to_bytes()
}

/// Decode the first frame in `data` and return its payload in clear
pub fn decode(data: &[u8]) -> Result<Bytes, FrameError> {
    Frame::parse(data).map(|frame| frame.payload)
}

/// XOR `data` in place with `key[i mod 4]`; applying it twice is the identity
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

fn header_len(payload_len: usize, masked: bool) -> usize {
    let extended = if payload_len <= MAX_SHORT_PAYLOAD {
        0
    } else if payload_len <= MAX_MEDIUM_PAYLOAD {
        2
    } else {
        8
    };
    2 + extended + if masked { 4 } else { 0 }
}

fn ensure(data: &[u8], len: usize) -> Result<(), FrameError> {
    if data.len() < len {
        Err(FrameError::Incomplete {
            needed: len - data.len(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    #[test]
    fn test_encode_length_classes() {
        let short = encode(&[b'a'; 125]);
        assert_eq!(&short[..2], &[0x81, 125]);
        assert_eq!(short.len(), 2 + 125);

        let medium = encode(&[b'a'; 126]);
        assert_eq!(&medium[..4], &[0x81, 126, 0x00, 126]);
        assert_eq!(medium.len(), 4 + 126);

        let medium_max = encode(&vec![b'a'; 65535]);
        assert_eq!(&medium_max[..4], &[0x81, 126, 0xff, 0xff]);

        let long = encode(&vec![b'a'; 65536]);
        assert_eq!(&long[..10], &[0x81, 127, 0, 0, 0, 0, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(long.len(), 10 + 65536);
    }

    #[test]
    fn test_decode_rfc_masked_hello() {
        // RFC 6455 section 5.7: single-frame masked text "Hello"
        let wire = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
        let frame = Frame::parse(&wire).unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.mask_key, Some(KEY));
        assert_eq!(&frame.payload[..], b"Hello");
        assert_eq!(frame.wire_len(), wire.len());
    }

    #[test]
    fn test_decode_unmasked_payload_in_clear() {
        let wire = [0x81, 0x05, b'H', b'e', b'l', b'l', b'o'];
        assert_eq!(&decode(&wire).unwrap()[..], b"Hello");
    }

    #[test]
    fn test_masked_round_trip_boundaries() {
        for len in [0usize, 1, 125, 126, 65535, 65536] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let wire = Frame::masked_text(payload.clone(), KEY).to_bytes();
            let frame = Frame::parse(&wire).unwrap();
            assert_eq!(&frame.payload[..], &payload[..], "length {}", len);
            assert_eq!(frame.wire_len(), wire.len());
        }
    }

    #[test]
    fn test_incomplete_header_and_payload() {
        assert_eq!(decode(&[]), Err(FrameError::Incomplete { needed: 2 }));
        assert_eq!(decode(&[0x81]), Err(FrameError::Incomplete { needed: 1 }));
        // 16-bit length escape without the length bytes
        assert_eq!(decode(&[0x81, 0xfe]), Err(FrameError::Incomplete { needed: 2 }));
        // Mask key cut short
        assert_eq!(
            decode(&[0x81, 0x85, 0x37, 0xfa]),
            Err(FrameError::Incomplete { needed: 2 })
        );
        // Payload cut short
        let wire = Frame::masked_text(&b"Hello"[..], KEY).to_bytes();
        assert_eq!(
            decode(&wire[..wire.len() - 2]),
            Err(FrameError::Incomplete { needed: 2 })
        );
    }

    #[test]
    fn test_invalid_frames() {
        assert_eq!(
            decode(&[0xc1, 0x00]),
            Err(FrameError::Invalid("reserved bits set"))
        );
        assert_eq!(decode(&[0x83, 0x00]), Err(FrameError::Invalid("reserved opcode")));
        let oversized = [0x81, 0x7f, 0, 0, 0, 1, 0, 0, 0, 0];
        assert_eq!(
            decode(&oversized),
            Err(FrameError::Invalid("payload length exceeds 32 bits"))
        );
    }

    #[test]
    fn test_parse_leaves_trailing_bytes() {
        let mut wire = Frame::masked_text(&b"first"[..], KEY).to_bytes().to_vec();
        let first_len = wire.len();
        wire.extend_from_slice(&Frame::masked_text(&b"second"[..], KEY).to_bytes());

        let first = Frame::parse(&wire).unwrap();
        assert_eq!(first.wire_len(), first_len);
        let second = Frame::parse(&wire[first.wire_len()..]).unwrap();
        assert_eq!(&second.payload[..], b"second");
    }

    #[test]
    fn test_apply_mask_is_involution() {
        let mut data = b"status payload".to_vec();
        apply_mask(&mut data, KEY);
        assert_ne!(&data[..], b"status payload");
        apply_mask(&mut data, KEY);
        assert_eq!(&data[..], b"status payload");
    }
}
