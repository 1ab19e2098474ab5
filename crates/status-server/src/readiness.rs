//! Readiness wait over the listener and observer sockets.
//!
//! The reactor only sees the [`Readiness`] trait: register a descriptor
//! under a token, wait with a timeout, get back the tokens that are ready.
//! [`PollReadiness`] implements it with `poll(2)`.

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io;
use std::os::fd::{BorrowedFd, RawFd};
use std::time::Duration;
use tracing::trace;

/// Identifies a registered descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub u64);

/// Token of the listening socket; observers use their id, which starts at 1
pub const LISTENER: Token = Token(0);

/// Register/deregister/wait capability
pub trait Readiness {
    /// Watch `fd` for readability under `token`; re-registering replaces the fd
    fn register(&mut self, token: Token, fd: RawFd) -> io::Result<()>;

    /// Stop watching `token`; unknown tokens are ignored
    fn deregister(&mut self, token: Token);

    /// Block up to `timeout` and return the tokens whose descriptors are
    /// readable, hung up or in error, in registration order
    fn wait(&mut self, timeout: Duration) -> io::Result<Vec<Token>>;
}

/// `poll(2)`-backed readiness wait
#[derive(Debug, Default)]
pub struct PollReadiness {
    entries: Vec<(Token, RawFd)>,
}

impl PollReadiness {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Readiness for PollReadiness {
    fn register(&mut self, token: Token, fd: RawFd) -> io::Result<()> {
        if fd < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "negative file descriptor",
            ));
        }
        match self.entries.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = fd,
            None => self.entries.push((token, fd)),
        }
        Ok(())
    }

    fn deregister(&mut self, token: Token) {
        self.entries.retain(|(t, _)| *t != token);
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<Vec<Token>> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);

        let mut fds: Vec<PollFd<'_>> = self
            .entries
            .iter()
            .map(|&(_, fd)| {
                // SAFETY: registered fds belong to sockets owned by the reactor,
                // and a closed socket is deregistered before the next wait.
                let fd = unsafe { BorrowedFd::borrow_raw(fd) };
                PollFd::new(fd, PollFlags::POLLIN)
            })
            .collect();

        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => return Ok(Vec::new()),
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Vec::new()),
            Err(e) => return Err(io::Error::from(e)),
        }

        let ready_mask =
            PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL;
        let ready: Vec<Token> = fds
            .iter()
            .zip(&self.entries)
            .filter(|(fd, _)| fd.revents().is_some_and(|r| r.intersects(ready_mask)))
            .map(|(_, &(token, _))| token)
            .collect();

        trace!(ready = ready.len(), registered = self.entries.len(), "Readiness wait returned");
        Ok(ready)
    }
}
