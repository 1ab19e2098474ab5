//! Broadcast behavior with writers that fail.

use status_server::ConnectionRegistry;
use std::io::{self, Write};

/// Writer that records data, or fails every write when `broken`
#[derive(Debug, Default)]
struct TestWriter {
    broken: bool,
    written: Vec<u8>,
}

impl Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.broken {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn registry(k: usize, broken: Option<usize>) -> ConnectionRegistry<TestWriter> {
    let mut registry = ConnectionRegistry::new();
    for i in 0..k {
        let writer = TestWriter {
            broken: broken == Some(i),
            ..Default::default()
        };
        let id = registry.add(writer, None);
        registry.get_mut(id).unwrap().handshake_complete = true;
    }
    registry
}

#[test]
fn test_broadcast_delivers_to_all() {
    let mut registry = registry(4, None);
    let report = registry.broadcast(b"\x81\x02{}");

    assert_eq!(report.delivered, 4);
    assert!(report.failed.is_empty());
    for id in registry.ids() {
        assert_eq!(registry.get(id).unwrap().stream.written, b"\x81\x02{}");
    }
}

#[test]
fn test_failed_write_removes_only_that_observer() {
    let mut registry = registry(4, Some(1));
    let report = registry.broadcast(b"payload");

    assert_eq!(report.delivered, 3);
    assert_eq!(report.failed, vec![2]);
    assert_eq!(registry.len(), 3);
    assert!(!registry.contains(2));
    assert_eq!(registry.ids(), vec![1, 3, 4]);

    // The next broadcast reaches the survivors only
    let report = registry.broadcast(b"again");
    assert_eq!(report.delivered, 3);
    assert!(report.failed.is_empty());
}

#[test]
fn test_broadcast_to_empty_registry() {
    let mut registry: ConnectionRegistry<TestWriter> = ConnectionRegistry::new();
    let report = registry.broadcast(b"payload");
    assert_eq!(report.delivered, 0);
    assert!(report.failed.is_empty());
}

/// Non-blocking writer whose send buffer holds `capacity` bytes
struct FullWriter {
    capacity: usize,
    written: usize,
}

impl Write for FullWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.capacity - self.written;
        if room == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = room.min(buf.len());
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_full_send_buffer_drops_observer() {
    let mut registry = ConnectionRegistry::new();
    for capacity in [1024, 10] {
        let id = registry.add(FullWriter { capacity, written: 0 }, None);
        registry.get_mut(id).unwrap().handshake_complete = true;
    }

    // Partial write, then WouldBlock
    let report = registry.broadcast(&[0u8; 64]);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, vec![2]);
    assert_eq!(registry.ids(), vec![1]);
}
