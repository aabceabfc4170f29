use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};

use super::fixed_buffer::FixedBuffer;
use crate::models::error::CaptureError;
use crate::models::timestamp::Timestamp;

/// Number of slots in a pool.
///
/// Three roles can be held at once (writing, latest, checked out), so a
/// fourth slot is always free for the producer's next write.
pub const POOL_SLOTS: usize = 4;

/// Which slot currently plays which role.
///
/// Assigned roles are pairwise distinct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotRoles {
    /// Slot the producer is filling. No reader may observe it.
    pub writing: Option<usize>,
    /// Newest fully written slot not yet handed to a reader.
    pub latest: Option<usize>,
    /// Slot most recently lent to a reader.
    pub checked_out: Option<usize>,
}

impl SlotRoles {
    /// Whether `index` is referenced by any role.
    pub fn holds(&self, index: usize) -> bool {
        self.assigned().any(|i| i == index)
    }

    pub fn is_empty(&self) -> bool {
        self.assigned().next().is_none()
    }

    /// All assigned roles name distinct, in-range slots.
    pub fn is_consistent(&self) -> bool {
        let mut seen = [false; POOL_SLOTS];
        for index in self.assigned() {
            if index >= POOL_SLOTS || seen[index] {
                return false;
            }
            seen[index] = true;
        }
        true
    }

    fn assigned(&self) -> impl Iterator<Item = usize> {
        [self.writing, self.latest, self.checked_out].into_iter().flatten()
    }
}

struct PoolState {
    roles: SlotRoles,
    timestamps: [Timestamp; POOL_SLOTS],
    published_any: bool,
}

impl PoolState {
    fn new() -> Self {
        Self {
            roles: SlotRoles::default(),
            timestamps: [Timestamp::ZERO; POOL_SLOTS],
            published_any: false,
        }
    }
}

/// Fixed pool of frame buffers rotated between one producer and any number
/// of readers.
///
/// Role bookkeeping lives behind one mutex and every rotation decision is made
/// while holding it. Slot bytes sit behind per-slot reader/writer locks: the
/// producer holds the write lock of the `writing` slot while filling it, and
/// each `FrameView` holds a read lock for as long as it lives. A view that
/// outlives its role therefore pins its slot, and `acquire_write_slot` passes
/// over pinned slots instead of tearing them.
///
/// ```text
/// acquire_write_slot ──→ [writing] ──publish──→ [latest] ──acquire_read_slot──→ [checked_out]
///        ↑                                         │                               │
///        └──────────────── free ←── replaced ──────┴───────── replaced ───────────┘
/// ```
pub struct BufferPool {
    slots: Vec<Arc<RwLock<FixedBuffer>>>,
    state: Mutex<PoolState>,
    element_size: usize,
    element_count: usize,
}

impl BufferPool {
    /// Allocate `POOL_SLOTS` zeroed buffers of the given shape.
    pub fn new(element_size: usize, element_count: usize) -> Result<Self, CaptureError> {
        let mut slots = Vec::with_capacity(POOL_SLOTS);
        for _ in 0..POOL_SLOTS {
            let buffer = FixedBuffer::zeroed(element_size, element_count)?;
            slots.push(Arc::new(RwLock::new(buffer)));
        }
        Ok(Self {
            slots,
            state: Mutex::new(PoolState::new()),
            element_size,
            element_count,
        })
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Bytes per slot.
    pub fn slot_len(&self) -> usize {
        self.element_size * self.element_count
    }

    /// Claim a slot for the producer.
    ///
    /// Picks the first slot, in slot order, that holds no role and is not
    /// pinned by an outstanding `FrameView`. Returns `Ok(None)` when every
    /// role-free slot is still pinned; the caller should retry later.
    ///
    /// Fails with `PoolInvariantViolation` if a write slot is already out or
    /// no role-free slot exists at all.
    pub fn acquire_write_slot(&self) -> Result<Option<WriteSlot>, CaptureError> {
        let mut state = self.state.lock();

        if let Some(index) = state.roles.writing {
            return Err(CaptureError::PoolInvariantViolation(format!(
                "slot {} is already being written",
                index
            )));
        }

        let mut pinned = false;
        for index in 0..POOL_SLOTS {
            if state.roles.holds(index) {
                continue;
            }
            match self.slots[index].try_write_arc() {
                Some(guard) => {
                    state.roles.writing = Some(index);
                    log::trace!("acquired write slot {} ({:?})", index, state.roles);
                    return Ok(Some(WriteSlot { index, guard }));
                }
                None => pinned = true,
            }
        }

        if pinned {
            log::trace!("all free slots pinned by readers ({:?})", state.roles);
            Ok(None)
        } else {
            Err(CaptureError::PoolInvariantViolation(format!(
                "no free slot outside assigned roles {:?}",
                state.roles
            )))
        }
    }

    /// Mark a filled slot as the newest complete frame.
    ///
    /// The previous `latest` slot becomes free. Returns `true` for the first
    /// publish since construction or the last `reset`.
    pub fn publish(&self, slot: WriteSlot, timestamp: Timestamp) -> Result<bool, CaptureError> {
        let WriteSlot { index, guard } = slot;
        let mut state = self.state.lock();

        if state.roles.writing != Some(index) {
            return Err(CaptureError::PoolInvariantViolation(format!(
                "publishing slot {} which is not being written ({:?})",
                index, state.roles
            )));
        }

        drop(guard);
        state.roles.writing = None;
        state.roles.latest = Some(index);
        state.timestamps[index] = timestamp;

        let first = !state.published_any;
        state.published_any = true;
        log::trace!("published slot {} at {:?} ({:?})", index, timestamp, state.roles);
        Ok(first)
    }

    /// Give a write slot back without publishing it.
    pub fn abandon(&self, slot: WriteSlot) {
        let WriteSlot { index, guard } = slot;
        let mut state = self.state.lock();
        drop(guard);
        if state.roles.writing == Some(index) {
            state.roles.writing = None;
        }
    }

    /// Lend the newest complete frame to a reader.
    ///
    /// A fresh `latest` slot moves into `checked_out`. Without a newer
    /// publish, the slot already checked out is still the newest and is lent
    /// again. Returns `None` if nothing has been published.
    pub fn acquire_read_slot(&self) -> Option<FrameView> {
        let mut state = self.state.lock();

        if let Some(latest) = state.roles.latest.take() {
            state.roles.checked_out = Some(latest);
        }
        let index = state.roles.checked_out?;
        Some(self.view(index, state.timestamps[index]))
    }

    /// Lend the complete frame whose timestamp is nearest to `target`.
    ///
    /// Only `latest` and `checked_out` are intact; older slots may already be
    /// overwritten, so no further history is searched. Ties go to `latest`.
    pub fn acquire_nearest_slot(&self, target: Timestamp) -> Option<FrameView> {
        let mut state = self.state.lock();

        let index = [state.roles.latest, state.roles.checked_out]
            .into_iter()
            .flatten()
            .min_by_key(|&i| state.timestamps[i].abs_diff(target))?;

        if state.roles.latest == Some(index) {
            state.roles.latest = None;
            state.roles.checked_out = Some(index);
        }
        Some(self.view(index, state.timestamps[index]))
    }

    /// Whether any frame was published since construction or the last reset.
    pub fn has_published(&self) -> bool {
        self.state.lock().published_any
    }

    /// Snapshot of the current role assignment.
    pub fn roles(&self) -> SlotRoles {
        self.state.lock().roles
    }

    /// Clear all roles and timestamps.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = PoolState::new();
    }

    fn view(&self, index: usize, timestamp: Timestamp) -> FrameView {
        FrameView {
            index,
            timestamp,
            guard: self.slots[index].read_arc(),
        }
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("element_size", &self.element_size)
            .field("element_count", &self.element_count)
            .field("roles", &self.roles())
            .finish()
    }
}

/// A slot claimed by the producer. Publish or abandon it.
pub struct WriteSlot {
    index: usize,
    guard: ArcRwLockWriteGuard<RawRwLock, FixedBuffer>,
}

impl WriteSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn buffer_mut(&mut self) -> &mut FixedBuffer {
        &mut self.guard
    }
}

impl fmt::Debug for WriteSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSlot").field("index", &self.index).finish()
    }
}

/// Shared read-only view of one complete frame.
///
/// The producer never writes to the slot while a view of it exists.
pub struct FrameView {
    index: usize,
    timestamp: Timestamp,
    guard: ArcRwLockReadGuard<RawRwLock, FixedBuffer>,
}

impl FrameView {
    /// Capture time of this frame.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn slot_index(&self) -> usize {
        self.index
    }

    pub fn buffer(&self) -> &FixedBuffer {
        &self.guard
    }

    pub fn data(&self) -> &[u8] {
        self.guard.as_slice()
    }

    pub fn element_size(&self) -> usize {
        self.guard.element_size()
    }

    pub fn element_count(&self) -> usize {
        self.guard.element_count()
    }
}

impl Deref for FrameView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl fmt::Debug for FrameView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameView")
            .field("index", &self.index)
            .field("timestamp", &self.timestamp)
            .field("len", &self.guard.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_frame(pool: &BufferPool, fill: u8, nanos: u64) -> usize {
        let mut slot = pool.acquire_write_slot().unwrap().expect("free slot");
        slot.buffer_mut().as_mut_slice().fill(fill);
        let index = slot.index();
        pool.publish(slot, Timestamp::from_nanos(nanos)).unwrap();
        index
    }

    #[test]
    fn new_pool_has_no_roles() {
        let pool = BufferPool::new(2, 8).unwrap();

        assert!(pool.roles().is_empty());
        assert!(!pool.has_published());
        assert_eq!(pool.slot_len(), 16);
        assert!(pool.acquire_read_slot().is_none());
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(BufferPool::new(0, 8), Err(CaptureError::InvalidArgument(_))));
        assert!(matches!(BufferPool::new(8, 0), Err(CaptureError::InvalidArgument(_))));
    }

    #[test]
    fn publish_sets_latest_and_clears_writing() {
        let pool = BufferPool::new(1, 4).unwrap();

        let slot = pool.acquire_write_slot().unwrap().unwrap();
        assert_eq!(pool.roles().writing, Some(0));

        let first = pool.publish(slot, Timestamp::from_nanos(5)).unwrap();
        assert!(first);
        assert_eq!(
            pool.roles(),
            SlotRoles {
                writing: None,
                latest: Some(0),
                checked_out: None
            }
        );

        // Only the first publish reports first.
        assert!(!pool.publish(pool.acquire_write_slot().unwrap().unwrap(), Timestamp::from_nanos(6)).unwrap());
    }

    #[test]
    fn write_slot_avoids_every_role() {
        let pool = BufferPool::new(1, 4).unwrap();

        assert_eq!(write_frame(&pool, 1, 10), 0);
        drop(pool.acquire_read_slot()); // checked_out = 0
        assert_eq!(write_frame(&pool, 2, 20), 1); // latest = 1

        let slot = pool.acquire_write_slot().unwrap().unwrap();
        assert_eq!(slot.index(), 2);
        let roles = pool.roles();
        assert!(roles.is_consistent());
        assert_eq!(roles.checked_out, Some(0));
        assert_eq!(roles.latest, Some(1));
        pool.publish(slot, Timestamp::from_nanos(30)).unwrap();

        // Slot 1 was replaced as latest and is free again.
        assert_eq!(write_frame(&pool, 4, 40), 1);
    }

    #[test]
    fn second_write_slot_is_an_invariant_violation() {
        let pool = BufferPool::new(1, 4).unwrap();
        let _slot = pool.acquire_write_slot().unwrap().unwrap();

        let err = pool.acquire_write_slot().unwrap_err();
        assert!(matches!(err, CaptureError::PoolInvariantViolation(_)));
    }

    #[test]
    fn repeated_read_returns_newest_slot_again() {
        let pool = BufferPool::new(1, 4).unwrap();
        let index = write_frame(&pool, 7, 100);

        let first = pool.acquire_read_slot().unwrap();
        let second = pool.acquire_read_slot().unwrap();

        assert_eq!(first.slot_index(), index);
        assert_eq!(second.slot_index(), index);
        assert_eq!(second.timestamp(), Timestamp::from_nanos(100));
        assert_eq!(second.buffer().as_slice(), first.data());
        assert_eq!(second.buffer().element_count(), 4);
        assert_eq!(pool.roles().latest, None);
        assert_eq!(pool.roles().checked_out, Some(index));
    }

    #[test]
    fn view_is_not_torn_by_concurrent_write() {
        let pool = BufferPool::new(4, 16).unwrap();
        write_frame(&pool, 0xAA, 1);

        let view = pool.acquire_read_slot().unwrap();

        let mut slot = pool.acquire_write_slot().unwrap().unwrap();
        assert_ne!(slot.index(), view.slot_index());
        slot.buffer_mut().as_mut_slice().fill(0x55);
        assert!(view.iter().all(|&b| b == 0xAA));

        pool.publish(slot, Timestamp::from_nanos(2)).unwrap();
        assert!(view.iter().all(|&b| b == 0xAA));

        let next = pool.acquire_read_slot().unwrap();
        assert!(next.iter().all(|&b| b == 0x55));
        assert_eq!(view.len(), 64);
    }

    #[test]
    fn pinned_slots_are_skipped() {
        let pool = BufferPool::new(1, 4).unwrap();

        write_frame(&pool, 0, 1);
        let v0 = pool.acquire_read_slot().unwrap();
        write_frame(&pool, 1, 2);
        let v1 = pool.acquire_read_slot().unwrap();
        // Slot 0 holds no role but v0 still pins it.
        assert_eq!(write_frame(&pool, 2, 3), 2);
        let v2 = pool.acquire_read_slot().unwrap();
        assert_eq!(write_frame(&pool, 3, 4), 3);

        // Free slots 0 and 1 are both pinned.
        assert!(pool.acquire_write_slot().unwrap().is_none());

        drop(v0);
        let slot = pool.acquire_write_slot().unwrap().unwrap();
        assert_eq!(slot.index(), 0);
        assert_eq!(v1.slot_index(), 1);
        assert_eq!(v2.slot_index(), 2);
    }

    #[test]
    fn abandon_releases_writing_role() {
        let pool = BufferPool::new(1, 4).unwrap();
        let slot = pool.acquire_write_slot().unwrap().unwrap();

        pool.abandon(slot);

        assert!(pool.roles().is_empty());
        assert!(pool.acquire_read_slot().is_none());
        assert!(pool.acquire_write_slot().unwrap().is_some());
    }

    #[test]
    fn nearest_picks_closest_complete_slot() {
        let pool = BufferPool::new(1, 4).unwrap();

        let a = write_frame(&pool, 1, 100);
        drop(pool.acquire_read_slot()); // checked_out = a
        let b = write_frame(&pool, 2, 200); // latest = b

        let near_a = pool.acquire_nearest_slot(Timestamp::from_nanos(110)).unwrap();
        assert_eq!(near_a.slot_index(), a);
        assert_eq!(near_a.timestamp(), Timestamp::from_nanos(100));
        assert_eq!(pool.roles().latest, Some(b));
        drop(near_a);

        let near_b = pool.acquire_nearest_slot(Timestamp::from_nanos(190)).unwrap();
        assert_eq!(near_b.slot_index(), b);
        assert_eq!(pool.roles().checked_out, Some(b));
        assert_eq!(pool.roles().latest, None);
    }

    #[test]
    fn nearest_ties_prefer_latest() {
        let pool = BufferPool::new(1, 4).unwrap();

        write_frame(&pool, 1, 100);
        drop(pool.acquire_read_slot());
        let b = write_frame(&pool, 2, 200);

        let view = pool.acquire_nearest_slot(Timestamp::from_nanos(150)).unwrap();
        assert_eq!(view.slot_index(), b);
    }

    #[test]
    fn nearest_before_publish_is_none() {
        let pool = BufferPool::new(1, 4).unwrap();
        assert!(pool.acquire_nearest_slot(Timestamp::from_nanos(1)).is_none());
    }

    #[test]
    fn reset_clears_roles_and_history() {
        let pool = BufferPool::new(1, 4).unwrap();
        write_frame(&pool, 1, 100);
        drop(pool.acquire_read_slot());
        write_frame(&pool, 2, 200);

        pool.reset();

        assert!(pool.roles().is_empty());
        assert!(!pool.has_published());
        assert!(pool.acquire_read_slot().is_none());
    }

    #[test]
    fn roles_consistency_check() {
        let ok = SlotRoles {
            writing: Some(0),
            latest: Some(1),
            checked_out: Some(2),
        };
        assert!(ok.is_consistent());
        assert!(ok.holds(2));
        assert!(!ok.holds(3));

        let clash = SlotRoles {
            writing: Some(1),
            latest: Some(1),
            checked_out: None,
        };
        assert!(!clash.is_consistent());

        let out_of_range = SlotRoles {
            writing: Some(POOL_SLOTS),
            ..Default::default()
        };
        assert!(!out_of_range.is_consistent());
    }
}
