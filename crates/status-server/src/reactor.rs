//! Single-threaded event loop.
//!
//! One thread owns the listening socket, every observer socket, the
//! connection registry and the health tracker. Each [`Reactor::turn`]:
//!
//! 1. waits up to `poll_timeout` for readiness on the listener and observers
//! 2. accepts at most one pending connection
//! 3. drains every ready observer (upgrade request or client frames)
//! 4. drops observers that never completed the upgrade
//! 5. runs a forced sweep if an observer asked for one
//! 6. runs a scheduled sweep once `sweep_interval` has elapsed
//!
//! Probes run synchronously inside the loop; a slow target delays delivery
//! to every observer. Observer sockets are non-blocking, so an observer that
//! stops reading is dropped instead of stalling the loop.

use crate::messages::{ObserverCommand, ServerMessage};
use crate::notifier::Notifier;
use crate::readiness::{LISTENER, PollReadiness, Readiness, Token};
use crate::registry::{ConnectionRegistry, ObserverId};
use crate::types::{ReactorState, ServerConfig, SweepKind};
use bytes::Buf;
use healthcheck::{HealthTracker, Probe};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::fd::AsRawFd;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use wsproto::{Frame, FrameError, Opcode};

/// Upper bound of an upgrade request head
const MAX_HANDSHAKE_SIZE: usize = 8 * 1024;

/// What a read from an observer produced
enum ReadOutcome {
    Data,
    Nothing,
    Closed,
    Failed(io::Error),
}

/// Status server event loop
pub struct Reactor<P, R = PollReadiness> {
    config: ServerConfig,
    listener: TcpListener,
    readiness: R,
    registry: ConnectionRegistry,
    tracker: HealthTracker<P>,
    notifier: Notifier,
    state: ReactorState,
    last_sweep: Option<Instant>,
    force_requested: bool,
}

impl<P: Probe> Reactor<P, PollReadiness> {
    /// Bind the listener and build a reactor using `poll(2)`
    pub fn bind(config: ServerConfig, probe: P) -> common::Result<Self> {
        Self::with_readiness(config, probe, PollReadiness::new())
    }
}

impl<P: Probe, R: Readiness> Reactor<P, R> {
    /// Bind the listener and build a reactor on top of `readiness`
    pub fn with_readiness(config: ServerConfig, probe: P, mut readiness: R) -> common::Result<Self> {
        let listener = bind_listener(&config.listen_addr, config.backlog)?;
        readiness.register(LISTENER, listener.as_raw_fd())?;

        let notifier = Notifier::new(
            config.console_mode,
            config.still_down_every,
            config.sweep_interval,
        );
        let tracker = HealthTracker::new(probe, config.targets.clone());

        info!(
            addr = %config.listen_addr,
            targets = tracker.len(),
            interval_secs = config.sweep_interval.as_secs(),
            mode = ?config.console_mode,
            "Status server bound"
        );

        Ok(Self {
            config,
            listener,
            readiness,
            registry: ConnectionRegistry::new(),
            tracker,
            notifier,
            state: ReactorState::Idle,
            last_sweep: None,
            force_requested: false,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> ReactorState {
        self.state
    }

    pub fn tracker(&self) -> &HealthTracker<P> {
        &self.tracker
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Whether the baseline pass has run
    pub fn is_initialized(&self) -> bool {
        self.last_sweep.is_some()
    }

    /// Baseline pass: record every target's status without alerts.
    ///
    /// The first scheduled sweep follows one interval later.
    pub fn initialize(&mut self) {
        self.state = ReactorState::Probing;
        let snapshot = self.tracker.baseline();
        let up = snapshot
            .values()
            .filter(|s| **s == healthcheck::Status::Up)
            .count();
        info!(targets = snapshot.len(), up, "Baseline established");
        self.last_sweep = Some(Instant::now());
        self.state = ReactorState::Idle;
    }

    /// Run until a fatal error
    pub fn run(&mut self) -> common::Result<()> {
        if !self.is_initialized() {
            self.initialize();
        }
        info!(addr = %self.config.listen_addr, "Waiting for observers");

        loop {
            if let Err(e) = self.turn() {
                self.state = ReactorState::Terminated;
                error!(error = %e, "Event loop failed");
                return Err(e);
            }
        }
    }

    /// Run one iteration of the loop
    pub fn turn(&mut self) -> common::Result<()> {
        if !self.is_initialized() {
            self.initialize();
        }

        self.state = ReactorState::Idle;
        let ready = self.readiness.wait(self.config.poll_timeout)?;

        for token in ready {
            if token == LISTENER {
                self.state = ReactorState::Accepting;
                self.accept();
            } else {
                self.state = ReactorState::Draining;
                self.drain(token.0);
            }
        }

        for id in self.registry.expired_handshakes(self.config.handshake_timeout) {
            debug!(observer = id, "Upgrade not completed in time");
            self.drop_observer(id);
        }

        if std::mem::take(&mut self.force_requested) {
            self.sweep(SweepKind::Forced);
        }

        if self.sweep_due() {
            self.sweep(SweepKind::Scheduled);
        }

        self.state = ReactorState::Idle;
        Ok(())
    }

    /// Run a forced sweep now, outside the interval schedule
    pub fn force_sweep(&mut self) {
        self.sweep(SweepKind::Forced);
    }

    fn sweep_due(&self) -> bool {
        self.last_sweep
            .is_some_and(|last| last.elapsed() >= self.config.sweep_interval)
    }

    fn sweep(&mut self, kind: SweepKind) {
        self.state = ReactorState::Probing;
        if kind == SweepKind::Forced {
            info!(observers = self.registry.upgraded_count(), "Manual check requested");
        }
        debug!(kind = ?kind, targets = self.tracker.len(), "Sweep started");

        for index in 0..self.tracker.len() {
            let Some(event) = self.tracker.check_at(index) else {
                continue;
            };
            self.notifier.report(&event, kind);
            for message in ServerMessage::for_event(&event) {
                self.broadcast(&message);
            }
        }

        // Forced sweeps leave the schedule untouched
        if kind == SweepKind::Scheduled {
            self.last_sweep = Some(Instant::now());
        }
        self.state = ReactorState::Idle;
    }

    fn broadcast(&mut self, message: &ServerMessage) {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "Failed to encode message");
                return;
            }
        };

        let report = self.registry.broadcast(&frame);
        for id in report.failed {
            self.readiness.deregister(Token(id));
        }
    }

    fn accept(&mut self) {
        let (stream, peer) = match self.listener.accept() {
            Ok(pair) => pair,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                return;
            }
        };

        if let Err(e) = self.configure_stream(&stream) {
            warn!(peer = %peer, error = %e, "Failed to configure accepted socket");
            return;
        }

        let fd = stream.as_raw_fd();
        let id = self.registry.add(stream, Some(peer));
        if let Err(e) = self.readiness.register(Token(id), fd) {
            warn!(observer = id, error = %e, "Failed to watch accepted socket");
            self.registry.remove(id);
            return;
        }
        debug!(observer = id, peer = %peer, "Connection accepted");
    }

    fn configure_stream(&self, stream: &TcpStream) -> io::Result<()> {
        // Writes never wait: a full send buffer drops the observer
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)
    }

    fn drain(&mut self, id: ObserverId) {
        let mut chunk = vec![0u8; self.config.read_chunk_size];

        let outcome = match self.registry.get_mut(id) {
            Some(observer) => match observer.stream.read(&mut chunk) {
                Ok(0) => ReadOutcome::Closed,
                Ok(n) => {
                    observer.inbound.extend_from_slice(&chunk[..n]);
                    ReadOutcome::Data
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    ReadOutcome::Nothing
                }
                Err(e) => ReadOutcome::Failed(e),
            },
            None => {
                self.readiness.deregister(Token(id));
                return;
            }
        };

        match outcome {
            ReadOutcome::Data => {}
            ReadOutcome::Nothing => return,
            ReadOutcome::Closed => {
                self.drop_observer(id);
                return;
            }
            ReadOutcome::Failed(e) => {
                debug!(observer = id, error = %e, "Read failed");
                self.drop_observer(id);
                return;
            }
        }

        let upgraded = self
            .registry
            .get(id)
            .is_some_and(|observer| observer.handshake_complete);
        if upgraded {
            self.process_frames(id);
        } else {
            self.advance_handshake(id);
        }
    }

    fn advance_handshake(&mut self, id: ObserverId) {
        let Some(observer) = self.registry.get_mut(id) else {
            return;
        };

        let Some(len) = wsproto::handshake::request_len(&observer.inbound) else {
            if observer.inbound.len() > MAX_HANDSHAKE_SIZE {
                debug!(observer = id, size = observer.inbound.len(), "Upgrade request too large");
                self.drop_observer(id);
            }
            return;
        };

        let head = observer.inbound.split_to(len);
        let handshake = match wsproto::negotiate(&head) {
            Ok(handshake) => handshake,
            Err(e) => {
                debug!(observer = id, error = %e, "Upgrade rejected");
                self.drop_observer(id);
                return;
            }
        };

        if let Err(e) = self.registry.send(id, handshake.response.as_bytes()) {
            debug!(observer = id, error = %e, "Failed to send upgrade response");
            self.drop_observer(id);
            return;
        }

        let peer = match self.registry.get_mut(id) {
            Some(observer) => {
                observer.handshake_complete = true;
                observer.peer
            }
            None => return,
        };

        let initial = ServerMessage::InitialStatus {
            servers: self.tracker.snapshot(),
        };
        let sent = initial
            .to_frame()
            .and_then(|frame| Ok(self.registry.send(id, &frame)?));
        if let Err(e) = sent {
            debug!(observer = id, error = %e, "Failed to send initial status");
            self.drop_observer(id);
            return;
        }

        info!(
            observer = id,
            peer = ?peer,
            path = %handshake.path,
            active = self.registry.upgraded_count(),
            "Observer connected"
        );

        // Frames may have arrived together with the request head
        self.process_frames(id);
    }

    fn process_frames(&mut self, id: ObserverId) {
        loop {
            let Some(observer) = self.registry.get_mut(id) else {
                return;
            };
            if observer.inbound.is_empty() {
                return;
            }

            let frame = match Frame::parse(&observer.inbound) {
                Ok(frame) => frame,
                Err(FrameError::Incomplete { needed }) => {
                    if observer.inbound.len() + needed > self.config.max_buffer_size {
                        warn!(observer = id, needed, "Frame exceeds buffer limit, discarding input");
                        observer.inbound.clear();
                    }
                    return;
                }
                Err(FrameError::Invalid(reason)) => {
                    debug!(observer = id, reason, "Discarding undecodable input");
                    observer.inbound.clear();
                    return;
                }
            };
            observer.inbound.advance(frame.wire_len());

            match frame.opcode {
                Opcode::Close => {
                    debug!(observer = id, "Close frame received");
                    self.drop_observer(id);
                    return;
                }
                Opcode::Text => match ObserverCommand::parse(&frame.payload) {
                    Some(ObserverCommand::ForceCheck) => {
                        debug!(observer = id, "Force check received");
                        self.force_requested = true;
                    }
                    None => trace!(observer = id, len = frame.payload.len(), "Ignoring message"),
                },
                opcode => trace!(observer = id, opcode = ?opcode, "Ignoring frame"),
            }
        }
    }

    fn drop_observer(&mut self, id: ObserverId) {
        self.readiness.deregister(Token(id));
        if let Some(observer) = self.registry.remove(id) {
            if observer.handshake_complete {
                info!(
                    observer = id,
                    active = self.registry.upgraded_count(),
                    "Observer disconnected"
                );
            } else {
                debug!(observer = id, "Connection closed before upgrade");
            }
        }
    }
}

/// Create the listening socket with `SO_REUSEADDR` and the given backlog
fn bind_listener(addr: &str, backlog: i32) -> common::Result<TcpListener> {
    let addr = addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| common::Error::config(format!("no address for {}", addr)))?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}
