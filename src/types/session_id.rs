// ABOUTME: Per-process session identifiers for log correlation.
// ABOUTME: Allocated monotonically by the acceptor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one accepted client connection in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out increasing session ids starting at 1.
#[derive(Debug, Default)]
pub struct SessionIds {
    next: AtomicU64,
}

impl SessionIds {
    pub fn next_id(&self) -> SessionId {
        SessionId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
