//! Reachability probes.

use crate::types::{ProbeConfig, ProbeOutcome};
use std::time::Instant;
use tracing::debug;

/// Blocking reachability probe.
///
/// Implementations must bound every call by their own timeouts; callers
/// never cancel an in-flight probe.
#[cfg_attr(test, mockall::automock)]
pub trait Probe {
    /// Issue one request against `url`
    fn probe(&self, url: &str) -> ProbeOutcome;
}

/// HTTP probe issuing `HEAD` requests.
///
/// Redirects are followed and TLS certificates are not verified.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    /// Create a new HTTP probe
    pub fn new(config: &ProbeConfig) -> common::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .danger_accept_invalid_certs(true)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(common::Error::healthcheck)?;

        Ok(Self { client })
    }
}

impl Probe for HttpProbe {
    fn probe(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();

        match self.client.head(url).send() {
            Ok(response) => {
                let duration = start.elapsed();
                let status = response.status().as_u16();
                debug!(url = %url, status, duration_ms = duration.as_millis(), "HTTP probe completed");
                ProbeOutcome::response(status, duration)
            }
            Err(e) if e.is_timeout() => {
                let duration = start.elapsed();
                debug!(url = %url, "HTTP probe timed out");
                ProbeOutcome::failure(duration, format!("Request timed out: {}", e))
            }
            Err(e) => {
                let duration = start.elapsed();
                debug!(url = %url, error = %e, "HTTP probe failed");
                ProbeOutcome::failure(duration, format!("HTTP request failed: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn quick_config() -> ProbeConfig {
        ProbeConfig {
            connect_timeout: Duration::from_millis(200),
            timeout: Duration::from_millis(500),
            ..ProbeConfig::default()
        }
    }

    /// Serve a single canned HTTP response on an ephemeral port
    fn one_shot_server(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!("{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_http_probe_connection_refused() {
        let probe = HttpProbe::new(&quick_config()).unwrap();
        let outcome = probe.probe("http://127.0.0.1:1/");
        assert_eq!(outcome.http_status, None);
        assert!(outcome.error.is_some());
        assert!(!outcome.is_reachable());
    }

    #[test]
    fn test_http_probe_success() {
        let url = one_shot_server("HTTP/1.1 204 No Content");
        let probe = HttpProbe::new(&quick_config()).unwrap();
        let outcome = probe.probe(&url);
        assert_eq!(outcome.http_status, Some(204));
        assert!(outcome.is_reachable());
    }

    #[test]
    fn test_http_probe_server_error_not_reachable() {
        let url = one_shot_server("HTTP/1.1 503 Service Unavailable");
        let probe = HttpProbe::new(&quick_config()).unwrap();
        let outcome = probe.probe(&url);
        assert_eq!(outcome.http_status, Some(503));
        assert!(outcome.error.is_none());
        assert!(!outcome.is_reachable());
    }
}
