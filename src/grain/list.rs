//! Fixed-capacity grain arena with O(1) acquire/reclaim and no heap
//! allocation after construction.

use std::sync::atomic::{AtomicU64, Ordering};

use super::Grain;

// -------------------------------------------------------------------------------------------------

/// Opaque handle identifying a spawned grain.
///
/// Ids are unique for the lifetime of the process (a monotonically counting
/// atomic, never reused), so a release request holding a stale id can never
/// alias a grain that recycled the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrainId(u64);

impl GrainId {
    /// Generate the next unique grain id.
    pub(crate) fn next() -> Self {
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

// -------------------------------------------------------------------------------------------------

/// One pre-allocated slot in a [`GrainList`]: a reusable [`Grain`] instance
/// plus the id it is currently serving, if any.
#[derive(Debug, Default)]
pub struct GrainNode {
    pub(crate) grain: Grain,
    pub(crate) id: Option<GrainId>,
}

// -------------------------------------------------------------------------------------------------

/// A fixed-capacity collection of grains.
///
/// All slots are pre-allocated at construction; acquire and reclaim move
/// slot indices between a free-list stack and a dense active list, so
/// traversal touches live slots only and free slots cost nothing. Capacity
/// never grows: acquiring from a full list fails cleanly instead of
/// blocking or allocating.
#[derive(Debug)]
pub struct GrainList {
    nodes: Box<[GrainNode]>,
    /// Stack of free slot indices.
    free: Vec<usize>,
    /// Dense list of live slot indices, in no particular order.
    active: Vec<usize>,
}

impl GrainList {
    /// Create a list with room for `capacity` concurrent grains.
    pub fn new(capacity: usize) -> Self {
        let nodes = (0..capacity)
            .map(|_| GrainNode::default())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        // pop order is irrelevant; reversed only so slot 0 is handed out first
        let free = (0..capacity).rev().collect();
        let active = Vec::with_capacity(capacity);
        Self {
            nodes,
            free,
            active,
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live grains.
    pub fn live_count(&self) -> usize {
        self.active.len()
    }

    /// Lifecycle state of the grain in the given slot.
    pub fn slot_state(&self, slot: usize) -> super::GrainState {
        self.nodes[slot].grain.state()
    }

    /// Acquire a free slot for the given id. Returns the slot index and a
    /// mutable reference to its (idle) grain, or None when the list is
    /// full. Never allocates.
    pub fn try_acquire(&mut self, id: GrainId) -> Option<(usize, &mut Grain)> {
        let slot = self.free.pop()?;
        self.active.push(slot);
        let node = &mut self.nodes[slot];
        node.id = Some(id);
        debug_assert!(node.grain.is_ready(), "Acquired a slot with a live grain");
        Some((slot, &mut node.grain))
    }

    /// Find the live grain serving the given id. Returns None for ids that
    /// already expired (their release is then a no-op).
    pub fn find_mut(&mut self, id: GrainId) -> Option<&mut Grain> {
        let slot = self
            .active
            .iter()
            .copied()
            .find(|&slot| self.nodes[slot].id == Some(id))?;
        Some(&mut self.nodes[slot].grain)
    }

    /// Visit every live grain, skipping free slots entirely.
    pub fn for_each_live(&mut self, mut visit: impl FnMut(usize, &mut Grain)) {
        for i in 0..self.active.len() {
            let slot = self.active[i];
            visit(slot, &mut self.nodes[slot].grain);
        }
    }

    /// Move every grain that returned to `Ready` back onto the free list,
    /// reporting each reclaimed slot and id. Never allocates.
    pub fn reclaim(&mut self, mut on_reclaim: impl FnMut(usize, GrainId)) {
        let mut i = 0;
        while i < self.active.len() {
            let slot = self.active[i];
            if self.nodes[slot].grain.is_ready() {
                self.active.swap_remove(i);
                self.free.push(slot);
                if let Some(id) = self.nodes[slot].id.take() {
                    on_reclaim(slot, id);
                }
            } else {
                i += 1;
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
