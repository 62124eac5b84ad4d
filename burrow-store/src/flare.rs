//! Flare - a self-pipe readiness primitive
//!
//! Exposes a readable file descriptor that synchronous consumers can register
//! with select/poll/epoll alongside other descriptors. Firing makes the
//! descriptor readable; extinguishing drains it. Both halves are non-blocking,
//! so firing from an async context never suspends.

use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

#[derive(Debug)]
pub struct Flare {
    read: UnixStream,
    write: UnixStream,
}

impl Flare {
    pub fn new() -> io::Result<Self> {
        let (read, write) = UnixStream::pair()?;
        read.set_nonblocking(true)?;
        write.set_nonblocking(true)?;
        Ok(Self { read, write })
    }

    /// Make the descriptor readable. A full pipe already reads as ready, so
    /// `WouldBlock` is not a failure.
    pub fn fire(&self) {
        match (&self.write).write(&[1u8]) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => tracing::warn!(error = %e, "flare fire failed"),
        }
    }

    /// Drain everything pending so the descriptor reads as not-ready.
    pub fn extinguish(&self) {
        let mut buf = [0u8; 64];
        loop {
            match (&self.read).read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "flare drain failed");
                    break;
                }
            }
        }
    }

    /// The readable half's descriptor, for readiness multiplexing.
    pub fn fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }
}

impl AsRawFd for Flare {
    fn as_raw_fd(&self) -> RawFd {
        self.fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readable(fd: RawFd) -> bool {
        let mut fds = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let n = unsafe { libc::poll(&mut fds, 1, 0) };
        n == 1 && (fds.revents & libc::POLLIN) != 0
    }

    #[test]
    fn fire_and_extinguish_toggle_readiness() {
        let flare = Flare::new().unwrap();
        assert!(!readable(flare.fd()));

        flare.fire();
        assert!(readable(flare.fd()));

        // Repeated fires stay readable and drain in one pass.
        flare.fire();
        flare.fire();
        assert!(readable(flare.fd()));

        flare.extinguish();
        assert!(!readable(flare.fd()));
    }
}
