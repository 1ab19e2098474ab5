//! Opening handshake (RFC 6455 Section 4.2).
//!
//! Only the server side is implemented: an HTTP/1.1 `GET` carrying
//! `Upgrade: websocket` and `Sec-WebSocket-Key` is answered with a literal
//! `101 Switching Protocols`. Sub-protocols and extensions are never echoed.

use crate::types::{HandshakeError, WEBSOCKET_GUID};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha1::{Digest, Sha1};

/// Header block terminator
const REQUEST_END: &[u8] = b"\r\n\r\n";

/// Outcome of a successful negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Request path as sent by the client
    pub path: String,

    /// Computed `Sec-WebSocket-Accept` value
    pub accept: String,

    /// Complete response to write back to the client
    pub response: String,
}

/// Compute `base64(sha1(key + GUID))`
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.trim().as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Build the `101 Switching Protocols` response for an accept token
pub fn response(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept
    )
}

/// Length of the request head (including the blank line) if `buf` holds one
pub fn request_len(buf: &[u8]) -> Option<usize> {
    buf.windows(REQUEST_END.len())
        .position(|window| window == REQUEST_END)
        .map(|pos| pos + REQUEST_END.len())
}

/// Validate an upgrade request and produce the handshake response
pub fn negotiate(request: &[u8]) -> Result<Handshake, HandshakeError> {
    let text = std::str::from_utf8(request).map_err(|_| HandshakeError::Malformed)?;
    let mut lines = text.split("\r\n");

    let request_line = lines.next().ok_or(HandshakeError::BadRequestLine)?;
    let mut parts = request_line.split_whitespace();
    let (method, path, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(version)) => (method, path, version),
        _ => return Err(HandshakeError::BadRequestLine),
    };
    if !version.starts_with("HTTP/") {
        return Err(HandshakeError::BadRequestLine);
    }
    if method != "GET" {
        return Err(HandshakeError::NotUpgrade);
    }

    let mut key = None;
    let mut upgrade = false;
    for line in lines.take_while(|line| !line.is_empty()) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.eq_ignore_ascii_case("sec-websocket-key") {
            key = Some(value.trim());
        } else if name.eq_ignore_ascii_case("upgrade") {
            upgrade = value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("websocket"));
        }
    }

    if !upgrade {
        return Err(HandshakeError::NotUpgrade);
    }
    let key = match key {
        Some(key) if !key.is_empty() => key,
        _ => return Err(HandshakeError::MissingKey),
    };

    let accept = accept_key(key);
    Ok(Handshake {
        path: path.to_string(),
        response: response(&accept),
        accept,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

    fn request(headers: &str) -> Vec<u8> {
        format!("GET /ws HTTP/1.1\r\nHost: localhost:8080\r\n{}\r\n", headers).into_bytes()
    }

    #[test]
    fn test_accept_key_rfc_vector() {
        assert_eq!(accept_key(SAMPLE_KEY), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert_eq!(accept_key("  dGhlIHNhbXBsZSBub25jZQ==  "), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_negotiate_literal_response() {
        let req = request(&format!(
            "Upgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n",
            SAMPLE_KEY
        ));
        let handshake = negotiate(&req).unwrap();
        assert_eq!(handshake.path, "/ws");
        assert_eq!(handshake.accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
        assert_eq!(
            handshake.response,
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
        );
    }

    #[test]
    fn test_header_names_case_insensitive() {
        let req = request(&format!(
            "upgrade: WebSocket\r\nconnection: upgrade\r\nsec-websocket-key:{}\r\n",
            SAMPLE_KEY
        ));
        assert_eq!(negotiate(&req).unwrap().accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_missing_key() {
        let req = request("Upgrade: websocket\r\nConnection: Upgrade\r\n");
        assert_eq!(negotiate(&req), Err(HandshakeError::MissingKey));

        let req = request("Upgrade: websocket\r\nSec-WebSocket-Key:   \r\n");
        assert_eq!(negotiate(&req), Err(HandshakeError::MissingKey));
    }

    #[test]
    fn test_not_an_upgrade() {
        let req = request(&format!("Sec-WebSocket-Key: {}\r\n", SAMPLE_KEY));
        assert_eq!(negotiate(&req), Err(HandshakeError::NotUpgrade));

        let post = format!(
            "POST / HTTP/1.1\r\nUpgrade: websocket\r\nSec-WebSocket-Key: {}\r\n\r\n",
            SAMPLE_KEY
        );
        assert_eq!(negotiate(post.as_bytes()), Err(HandshakeError::NotUpgrade));
    }

    #[test]
    fn test_malformed_requests() {
        assert_eq!(negotiate(b"\xff\xfe\r\n\r\n"), Err(HandshakeError::Malformed));
        assert_eq!(negotiate(b"GET\r\n\r\n"), Err(HandshakeError::BadRequestLine));
        assert_eq!(negotiate(b"GET / FTP\r\n\r\n"), Err(HandshakeError::BadRequestLine));
    }

    #[test]
    fn test_request_len() {
        let req = request("Upgrade: websocket\r\n");
        assert_eq!(request_len(&req), Some(req.len()));
        assert_eq!(request_len(&req[..req.len() - 1]), None);

        let mut with_frame = req.clone();
        with_frame.extend_from_slice(&[0x81, 0x80, 1, 2, 3, 4]);
        assert_eq!(request_len(&with_frame), Some(req.len()));
    }
}
