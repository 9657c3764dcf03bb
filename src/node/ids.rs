//! Node numbering.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one managed node, unique within its [`NodeIds`] sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sequence handing out [`NodeId`]s, owned by whoever creates the nodes.
#[derive(Debug, Default)]
pub struct NodeIds {
    next: AtomicU64,
}

impl NodeIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts numbering at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next(&self) -> NodeId {
        NodeId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
