//! Stack-resident wait records and the owner/dependent drain protocol.
//!
//! The first thread to block on a cell becomes the **owner** of a
//! [`WaitRecord`] placed on its own stack. Every thread that blocks while
//! that record is live attaches to it as a **dependent**: it shares the
//! owner's `ready` condvar instead of creating its own. The owner is the
//! only thread allowed to tear the record down, and it may do so only after
//! every dependent has detached, so the raw pointer published through
//! [`WaiterSlot`] never dangles.
//!
//! All bookkeeping happens with the cell's write mutex held; the condvars
//! release and reacquire that same mutex. At most one record is live per
//! cell at any instant: a new record is created only while the slot is
//! vacant, and the slot is cleared before the owner's stack frame dies.

use parking_lot::{Condvar, MutexGuard};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared record for one notification episode.
///
/// The counter is atomic only because the record is referenced from several
/// threads; every access happens under the write mutex, so `Relaxed`
/// ordering suffices throughout.
pub(crate) struct WaitRecord {
    /// Broadcast by every transition to a terminal state.
    ready: Condvar,
    /// Broadcast by the last dependent to detach.
    drained: Condvar,
    /// Number of dependents currently attached.
    dependents: AtomicUsize,
}

impl WaitRecord {
    fn new() -> Self {
        Self {
            ready: Condvar::new(),
            drained: Condvar::new(),
            dependents: AtomicUsize::new(0),
        }
    }
}

/// The cell-side view of the current blocking episode.
///
/// Lives inside the cell's write mutex; `None` while no thread is blocked.
/// While `Some`, the pointee is a [`WaitRecord`] on the stack of the thread
/// currently running the owner episode.
pub(crate) struct WaiterSlot {
    active: Option<NonNull<WaitRecord>>,
}

// SAFETY: the slot only ever holds a pointer to a record whose owner thread
// is blocked inside `block_as_owner`; the drain protocol keeps that frame
// alive until the slot is cleared, and every dereference happens with the
// write mutex held.
unsafe impl Send for WaiterSlot {}

impl WaiterSlot {
    pub(crate) const fn new() -> Self {
        Self { active: None }
    }

    /// The record of the episode in flight, if any.
    pub(crate) fn current(&self) -> Option<NonNull<WaitRecord>> {
        self.active
    }

    /// Wakes every thread blocked on the current episode, if any.
    ///
    /// Called by terminal transitions with the write mutex held; always a
    /// broadcast, never a single wake.
    pub(crate) fn wake_all(&self) {
        if let Some(record) = self.active {
            // SAFETY: pointee alive while `active` is set (see type docs).
            unsafe { record.as_ref() }.ready.notify_all();
        }
    }
}

/// Blocks the calling thread as the episode owner.
///
/// Publishes a stack-resident record through the slot, then waits on `ready`
/// until `is_done` reports a terminal observation. `is_done` runs with the
/// write mutex held and must be re-runnable: condvar wakeups can be spurious,
/// and a fresh computation may start between a wakeup and reacquiring the
/// mutex, both of which re-arm the wait.
///
/// On every exit path, including a panic inside `is_done`, the owner waits
/// for all dependents to detach and clears the slot before its frame dies.
pub(crate) fn block_as_owner(
    slot: MutexGuard<'_, WaiterSlot>,
    mut is_done: impl FnMut() -> bool,
) {
    let record = WaitRecord::new();
    let mut episode = OwnerEpisode {
        slot,
        record: &record,
    };
    episode.slot.active = Some(NonNull::from(&record));

    loop {
        record.ready.wait(&mut episode.slot);
        if is_done() {
            break;
        }
    }
    // `episode` drops here: drain dependents, clear the slot.
}

struct OwnerEpisode<'a, 'r> {
    slot: MutexGuard<'a, WaiterSlot>,
    record: &'r WaitRecord,
}

impl Drop for OwnerEpisode<'_, '_> {
    fn drop(&mut self) {
        while self.record.dependents.load(Ordering::Relaxed) > 0 {
            self.record.drained.wait(&mut self.slot);
        }
        self.slot.active = None;
    }
}

/// Blocks the calling thread as a dependent of the episode `record`.
///
/// Same wait semantics as [`block_as_owner`]. On every exit path the
/// dependent detaches; the last one out notifies `drained` so the owner may
/// reclaim the record.
pub(crate) fn block_as_dependent(
    slot: MutexGuard<'_, WaiterSlot>,
    record: NonNull<WaitRecord>,
    mut is_done: impl FnMut() -> bool,
) {
    // SAFETY: we hold the write mutex and the slot still points at `record`,
    // so its owner is parked in `block_as_owner` and cannot return before
    // the attachment below has been undone.
    let record = unsafe { record.as_ref() };
    record.dependents.fetch_add(1, Ordering::Relaxed);
    let mut episode = DependentEpisode { slot, record };

    loop {
        record.ready.wait(&mut episode.slot);
        if is_done() {
            break;
        }
    }
    // `episode` drops here: detach, waking the owner if we are the last.
}

struct DependentEpisode<'a, 'r> {
    slot: MutexGuard<'a, WaiterSlot>,
    record: &'r WaitRecord,
}

impl Drop for DependentEpisode<'_, '_> {
    fn drop(&mut self) {
        if self.record.dependents.fetch_sub(1, Ordering::Relaxed) == 1 {
            self.record.drained.notify_all();
        }
        // The guard in `slot` is released after this body, so the owner's
        // drain check observes the decrement under the mutex.
    }
}
