//! Property tests for `BufferPool` slot rotation.
//!
//! Random interleavings of producer and reader operations are applied to one
//! pool. After every step the assigned roles must name distinct slots, the
//! write slot must never be one a reader can see, and every held view must
//! still show exactly the bytes it had when it was taken.

use frame_capture_core::{BufferPool, CaptureError, FrameView, Timestamp, WriteSlot, POOL_SLOTS};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    AcquireWrite,
    Publish,
    Abandon,
    Read { hold: bool },
    Nearest { target: u64, hold: bool },
    DropView(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::AcquireWrite),
        3 => Just(Op::Publish),
        1 => Just(Op::Abandon),
        3 => any::<bool>().prop_map(|hold| Op::Read { hold }),
        1 => (0u64..256, any::<bool>()).prop_map(|(target, hold)| Op::Nearest { target, hold }),
        2 => any::<usize>().prop_map(Op::DropView),
    ]
}

struct Harness {
    pool: BufferPool,
    writer: Option<WriteSlot>,
    views: Vec<(FrameView, u8)>,
    clock: u64,
}

impl Harness {
    fn new() -> Self {
        Self {
            pool: BufferPool::new(2, 8).unwrap(),
            writer: None,
            views: Vec::new(),
            clock: 0,
        }
    }

    fn hold(&mut self, view: Option<FrameView>, hold: bool) {
        if let Some(view) = view {
            let byte = view[0];
            if hold {
                self.views.push((view, byte));
            }
        }
    }

    fn pinned(&self, index: usize) -> bool {
        self.views.iter().any(|(v, _)| v.slot_index() == index)
    }
}

fn apply(h: &mut Harness, op: Op) -> Result<(), TestCaseError> {
    let before = h.pool.roles();

    match op {
        Op::AcquireWrite => {
            if h.writer.is_some() {
                let err = h.pool.acquire_write_slot().unwrap_err();
                prop_assert!(matches!(err, CaptureError::PoolInvariantViolation(_)));
                return Ok(());
            }
            match h.pool.acquire_write_slot() {
                Ok(Some(slot)) => {
                    prop_assert!(!before.holds(slot.index()), "slot {} holds a role in {:?}", slot.index(), before);
                    prop_assert!(!h.pinned(slot.index()));
                    // First eligible slot in order.
                    for index in 0..slot.index() {
                        prop_assert!(before.holds(index) || h.pinned(index));
                    }
                    h.writer = Some(slot);
                }
                Ok(None) => {
                    for index in 0..POOL_SLOTS {
                        prop_assert!(before.holds(index) || h.pinned(index));
                    }
                }
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }
        Op::Publish => {
            if let Some(mut slot) = h.writer.take() {
                h.clock += 1;
                let index = slot.index();
                slot.buffer_mut().as_mut_slice().fill(h.clock as u8);
                h.pool.publish(slot, Timestamp::from_nanos(h.clock)).unwrap();
                prop_assert_eq!(h.pool.roles().latest, Some(index));
                prop_assert_eq!(h.pool.roles().writing, None);
            }
        }
        Op::Abandon => {
            if let Some(slot) = h.writer.take() {
                h.pool.abandon(slot);
                prop_assert_eq!(h.pool.roles().writing, None);
            }
        }
        Op::Read { hold } => {
            let view = h.pool.acquire_read_slot();
            let expected = before.latest.or(before.checked_out);
            prop_assert_eq!(view.as_ref().map(|v| v.slot_index()), expected);
            h.hold(view, hold);
        }
        Op::Nearest { target, hold } => {
            let view = h.pool.acquire_nearest_slot(Timestamp::from_nanos(target));
            let candidates = [before.latest, before.checked_out];
            prop_assert_eq!(view.is_some(), candidates.iter().any(Option::is_some));
            if let Some(ref v) = view {
                prop_assert!(candidates.contains(&Some(v.slot_index())));
            }
            h.hold(view, hold);
        }
        Op::DropView(i) => {
            if !h.views.is_empty() {
                let i = i % h.views.len();
                h.views.remove(i);
            }
        }
    }

    let roles = h.pool.roles();
    prop_assert!(roles.is_consistent(), "roles clash: {:?}", roles);
    for (view, byte) in &h.views {
        prop_assert_ne!(Some(view.slot_index()), roles.writing);
        prop_assert!(view.iter().all(|b| b == byte), "view of slot {} was torn", view.slot_index());
    }
    Ok(())
}

proptest! {
    #[test]
    fn roles_stay_pairwise_distinct(ops in prop::collection::vec(op(), 1..200)) {
        let mut harness = Harness::new();
        for op in ops {
            apply(&mut harness, op)?;
        }
    }
}

#[test]
fn steady_rotation_cycles_through_free_slots() {
    let pool = BufferPool::new(1, 1).unwrap();

    for n in 1..=20u64 {
        let slot = pool.acquire_write_slot().unwrap().unwrap();
        let roles = pool.roles();
        assert!(roles.is_consistent());
        pool.publish(slot, Timestamp::from_nanos(n)).unwrap();

        let view = pool.acquire_read_slot().unwrap();
        assert_eq!(view.timestamp(), Timestamp::from_nanos(n));
    }
}
