//! # Listening-port allocation.
//!
//! Every node needs four local ports (p2p, rpc, rest, profile). Allocation goes through
//! [`PortAllocator`] so tests and embedders can inject their own scheme; the default
//! [`ListenProbe`] hands out increasing ports starting after 5555 and skips any port it
//! cannot bind.

use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

/// First port considered by [`ListenProbe::default`] is one above this.
pub const DEFAULT_BASE_PORT: u16 = 5555;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no free listening port left below 65535")]
pub struct PortsExhausted;

/// Source of free local ports.
pub trait PortAllocator: Send + Sync {
    /// Returns a port nobody is listening on right now.
    fn next_port(&self) -> Result<u16, PortsExhausted>;
}

/// Monotonic allocator that probes each candidate by binding it.
///
/// Safe to share between threads; concurrent callers never receive the same port.
#[derive(Debug)]
pub struct ListenProbe {
    last: AtomicU32,
}

impl ListenProbe {
    pub fn new(base: u16) -> Self {
        Self {
            last: AtomicU32::new(u32::from(base)),
        }
    }
}

impl Default for ListenProbe {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PORT)
    }
}

impl PortAllocator for ListenProbe {
    fn next_port(&self) -> Result<u16, PortsExhausted> {
        loop {
            let candidate = self.last.fetch_add(1, Ordering::SeqCst) + 1;
            let Ok(port) = u16::try_from(candidate) else {
                return Err(PortsExhausted);
            };
            if port == u16::MAX {
                return Err(PortsExhausted);
            }
            if TcpListener::bind(("127.0.0.1", port)).is_ok() {
                return Ok(port);
            }
        }
    }
}

/// The four ports one node listens on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodePorts {
    pub p2p: u16,
    pub rpc: u16,
    pub rest: u16,
    pub profile: u16,
}

impl NodePorts {
    pub fn allocate(alloc: &dyn PortAllocator) -> Result<Self, PortsExhausted> {
        Ok(Self {
            p2p: alloc.next_port()?,
            rpc: alloc.next_port()?,
            rest: alloc.next_port()?,
            profile: alloc.next_port()?,
        })
    }
}
