//! Connected observers, kept in registration order.

use bytes::BytesMut;
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Registry-assigned observer identifier, never reused
pub type ObserverId = u64;

/// One accepted client connection
#[derive(Debug)]
pub struct Observer<S = TcpStream> {
    pub id: ObserverId,
    pub stream: S,
    pub peer: Option<SocketAddr>,

    /// Set once the `101 Switching Protocols` response has been written
    pub handshake_complete: bool,

    /// Bytes read but not yet consumed (request head or partial frames)
    pub inbound: BytesMut,

    pub accepted_at: Instant,
}

impl<S> Observer<S> {
    fn new(id: ObserverId, stream: S, peer: Option<SocketAddr>) -> Self {
        Self {
            id,
            stream,
            peer,
            handshake_complete: false,
            inbound: BytesMut::new(),
            accepted_at: Instant::now(),
        }
    }
}

/// Result of a broadcast
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Observers the data was written to
    pub delivered: usize,

    /// Observers whose write failed; already removed from the registry
    pub failed: Vec<ObserverId>,
}

/// Ordered set of observers owned by the reactor
#[derive(Debug)]
pub struct ConnectionRegistry<S = TcpStream> {
    observers: Vec<Observer<S>>,
    next_id: ObserverId,
}

impl<S> Default for ConnectionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ConnectionRegistry<S> {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a freshly accepted stream; the handshake is still pending
    pub fn add(&mut self, stream: S, peer: Option<SocketAddr>) -> ObserverId {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.push(Observer::new(id, stream, peer));
        id
    }

    /// Remove an observer. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: ObserverId) -> Option<Observer<S>> {
        let index = self.observers.iter().position(|o| o.id == id)?;
        Some(self.observers.remove(index))
    }

    pub fn get(&self, id: ObserverId) -> Option<&Observer<S>> {
        self.observers.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ObserverId) -> Option<&mut Observer<S>> {
        self.observers.iter_mut().find(|o| o.id == id)
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Observers that completed the upgrade
    pub fn upgraded_count(&self) -> usize {
        self.observers.iter().filter(|o| o.handshake_complete).count()
    }

    /// Ids of upgraded observers, in registration order.
    ///
    /// The returned list is a copy, so the registry may be mutated while it
    /// is iterated.
    pub fn snapshot(&self) -> Vec<ObserverId> {
        self.observers
            .iter()
            .filter(|o| o.handshake_complete)
            .map(|o| o.id)
            .collect()
    }

    /// Ids of every registered observer, upgraded or not
    pub fn ids(&self) -> Vec<ObserverId> {
        self.observers.iter().map(|o| o.id).collect()
    }

    /// Observers still waiting for their upgrade request after `timeout`
    pub fn expired_handshakes(&self, timeout: Duration) -> Vec<ObserverId> {
        self.observers
            .iter()
            .filter(|o| !o.handshake_complete && o.accepted_at.elapsed() >= timeout)
            .map(|o| o.id)
            .collect()
    }
}

impl<S: Write> ConnectionRegistry<S> {
    /// Write `data` in full to one observer.
    ///
    /// On a non-blocking stream a full send buffer surfaces as
    /// `WouldBlock`, possibly after a partial write.
    pub fn send(&mut self, id: ObserverId, data: &[u8]) -> io::Result<()> {
        let observer = self
            .get_mut(id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "observer not registered"))?;
        observer.stream.write_all(data)?;
        observer.stream.flush()
    }

    /// Write `data` to every upgraded observer.
    ///
    /// A failed write removes only that observer.
    pub fn broadcast(&mut self, data: &[u8]) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for id in self.snapshot() {
            match self.send(id, data) {
                Ok(()) => report.delivered += 1,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    warn!(observer = id, "Observer not reading, dropping");
                    self.remove(id);
                    report.failed.push(id);
                }
                Err(e) => {
                    warn!(observer = id, error = %e, "Write failed, dropping observer");
                    self.remove(id);
                    report.failed.push(id);
                }
            }
        }
        debug!(
            delivered = report.delivered,
            failed = report.failed.len(),
            bytes = data.len(),
            "Broadcast complete"
        );
        report
    }
}
