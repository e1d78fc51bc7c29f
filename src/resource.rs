use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Kinds of transient handle the pipeline hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Latest raw frame held for on-screen display
    Preview,
    /// Archive blob held while the download surface picks it up
    Download,
}

impl ResourceKind {
    fn slot(self) -> usize {
        match self {
            ResourceKind::Preview => 0,
            ResourceKind::Download => 1,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Preview => write!(f, "preview"),
            ResourceKind::Download => write!(f, "download"),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    outstanding: [AtomicUsize; 2],
    high_water: [AtomicUsize; 2],
    acquired: [AtomicU64; 2],
    released: [AtomicU64; 2],
}

/// Counts outstanding handles per kind
///
/// Cloning shares the counters, so the loop and tests can observe the same
/// tracker.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    counters: Arc<Counters>,
}

/// Snapshot of the tracker for one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceStats {
    pub outstanding: usize,
    pub high_water: usize,
    pub acquired: u64,
    pub released: u64,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new handle of the given kind
    pub fn acquire(&self, kind: ResourceKind) -> ResourceHandle {
        let slot = kind.slot();
        let now = self.counters.outstanding[slot].fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.high_water[slot].fetch_max(now, Ordering::SeqCst);
        let id = self.counters.acquired[slot].fetch_add(1, Ordering::SeqCst) + 1;
        trace!("Acquired {} handle #{} ({} outstanding)", kind, id, now);

        ResourceHandle {
            kind,
            id,
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn outstanding(&self, kind: ResourceKind) -> usize {
        self.counters.outstanding[kind.slot()].load(Ordering::SeqCst)
    }

    pub fn stats(&self, kind: ResourceKind) -> ResourceStats {
        let slot = kind.slot();
        ResourceStats {
            outstanding: self.counters.outstanding[slot].load(Ordering::SeqCst),
            high_water: self.counters.high_water[slot].load(Ordering::SeqCst),
            acquired: self.counters.acquired[slot].load(Ordering::SeqCst),
            released: self.counters.released[slot].load(Ordering::SeqCst),
        }
    }
}

/// Registration of one live resource; dropping it releases the resource
#[derive(Debug)]
pub struct ResourceHandle {
    kind: ResourceKind,
    id: u64,
    counters: Arc<Counters>,
}

impl ResourceHandle {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        let slot = self.kind.slot();
        self.counters.outstanding[slot].fetch_sub(1, Ordering::SeqCst);
        self.counters.released[slot].fetch_add(1, Ordering::SeqCst);
        trace!("Released {} handle #{}", self.kind, self.id);
    }
}
