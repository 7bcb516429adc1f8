// Bounded undo/redo history of surface snapshots.
//
// Entries live in a fixed-capacity deque: a commit truncates the redo branch,
// appends, then evicts the oldest entry if the cap is exceeded. The index
// always ends on the entry just committed. The history is never empty: it is
// built around the initial (blank) snapshot.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::canvas::Surface;
use crate::error::Error;

pub const MAX_HISTORY_STATES: usize = 50;

/// Immutable PNG capture of the surface. Cloning shares the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot(Arc<[u8]>);

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Snapshot({} bytes)", self.0.len())
    }
}

impl Snapshot {
    pub fn capture(surface: &Surface) -> Result<Self, Error> {
        Ok(Self(surface.encode_png()?.into()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode back into a surface of the given size.
    pub fn restore(&self, width: usize, height: usize) -> Result<Surface, Error> {
        Surface::decode(&self.0, width, height)
    }
}

pub struct History {
    entries: VecDeque<Snapshot>,
    index: usize,
    cap: usize,
}

impl History {
    /// Start a history whose entry 0 is `initial`. A cap below 1 is treated as 1.
    pub fn new(initial: Snapshot, cap: usize) -> Self {
        let cap = cap.max(1);
        let mut entries = VecDeque::with_capacity(cap + 1);
        entries.push_back(initial);
        Self { entries, index: 0, cap }
    }

    pub fn commit(&mut self, snapshot: Snapshot) {
        self.entries.truncate(self.index + 1);
        self.entries.push_back(snapshot);
        if self.entries.len() > self.cap {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;
        debug!(index = self.index, len = self.entries.len(), "history commit");
    }

    /// Step back; returns the snapshot to restore, or None at the oldest entry.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        debug!(index = self.index, "undo");
        self.entries.get(self.index)
    }

    /// Step forward; returns the snapshot to restore, or None at the newest entry.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        debug!(index = self.index, "redo");
        self.entries.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn current(&self) -> &Snapshot {
        &self.entries[self.index]
    }
}
