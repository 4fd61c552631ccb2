//! `AsyncCell` — the tri-state container and its blocking-wait protocol.
//!
//! ## Locking design
//!
//! Two locks with distinct jobs:
//!
//! - `write` (mutex): serializes state transitions, one per cell at a time.
//!   It is also the monitor the waiter condvars release and reacquire.
//! - `content` (rwlock): guards the payload slots. Held exclusively only for
//!   the tag/pointer swap inside a transition, and in shared mode for every
//!   `access*` read. A slow reader callback therefore runs concurrently with
//!   other readers and never extends a transition's critical section.
//!
//! The old payload of a transition is dropped after **both** locks are
//! released, so a slow payload destructor cannot block readers or writers.
//!
//! ## Invariant
//!
//! Exactly one of the value/error slots is populated iff the state tag is
//! terminal. The progress slot is populated from `start_progress` until
//! `stop_progress`; it deliberately survives the terminal transition so the
//! producer can keep using its handle until it releases the descriptor.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::progress::{Progress, RequestStop};
use crate::state::{AsyncState, StateWatcher};
use crate::sync::waiter::{self, WaiterSlot};

#[cfg(test)]
mod tests;

/// Payload slots, guarded by the cell's content lock.
struct Slots<V, E, P> {
    state: AsyncState,
    value: Option<V>,
    error: Option<E>,
    progress: Option<Arc<P>>,
}

/// A thread-safe cell holding exactly one of: a completed value, a completed
/// error, or an in-flight computation's progress descriptor.
///
/// Producers drive the cell `Progress` → terminal with [`start_progress`],
/// [`set_value`] and [`set_error`]; consumers read the current payload with
/// the non-blocking [`access`] family or block until a terminal state with
/// [`wait`]. Terminal transitions are always legal, including from
/// `Progress` — that is how a computation succeeds or fails. Starting a
/// computation while one is already in flight is a caller bug and panics.
///
/// Payload references never escape: every reader receives `&V`/`&E`/`&P`
/// scoped to its callback, so a concurrent transition can never invalidate
/// something a reader still holds.
///
/// [`start_progress`]: Self::start_progress
/// [`set_value`]: Self::set_value
/// [`set_error`]: Self::set_error
/// [`access`]: Self::access
/// [`wait`]: Self::wait
///
/// # Example
///
/// ```
/// use std::thread;
/// use tricell::{AsyncCell, AsyncState, Progress};
///
/// let cell: AsyncCell<String, String> = AsyncCell::with_value("Hello World!".into());
///
/// let handle = cell.start_progress(Progress::new());
/// thread::scope(|s| {
///     s.spawn(|| {
///         handle.set_fraction(0.5);
///         cell.set_value("42".into());
///     });
///     cell.wait(
///         |value| assert_eq!(value.as_str(), "42"),
///         |_error| unreachable!(),
///     );
/// });
/// assert_eq!(cell.state(), AsyncState::Value);
/// cell.stop_progress(Some(&handle));
/// ```
pub struct AsyncCell<V, E, P = Progress> {
    write: Mutex<WaiterSlot>,
    content: RwLock<Slots<V, E, P>>,
    watcher: Option<StateWatcher>,
}

impl<V, E, P> AsyncCell<V, E, P> {
    /// Creates a cell already holding a completed value.
    ///
    /// A cell is always constructed terminal; it never starts in `Progress`.
    pub fn with_value(value: V) -> Self {
        Self::build(Some(value), None, None)
    }

    /// Creates a cell already holding a completed error.
    pub fn with_error(error: E) -> Self {
        Self::build(None, Some(error), None)
    }

    /// Like [`with_value`](Self::with_value), with a state watcher that is
    /// invoked synchronously after every transition. See [`StateWatcher`]
    /// for the reentrancy contract.
    pub fn with_value_watched(
        value: V,
        watcher: impl Fn(AsyncState) + Send + Sync + 'static,
    ) -> Self {
        Self::build(Some(value), None, Some(Box::new(watcher)))
    }

    /// Like [`with_error`](Self::with_error), with a state watcher.
    pub fn with_error_watched(
        error: E,
        watcher: impl Fn(AsyncState) + Send + Sync + 'static,
    ) -> Self {
        Self::build(None, Some(error), Some(Box::new(watcher)))
    }

    fn build(value: Option<V>, error: Option<E>, watcher: Option<StateWatcher>) -> Self {
        let state = if value.is_some() {
            AsyncState::Value
        } else {
            AsyncState::Error
        };
        Self {
            write: Mutex::new(WaiterSlot::new()),
            content: RwLock::new(Slots {
                state,
                value,
                error,
                progress: None,
            }),
            watcher,
        }
    }

    /// A snapshot of the state tag. Another thread may transition the cell
    /// immediately after this returns; use the `access*` family when the
    /// payload must match the observed tag.
    pub fn state(&self) -> AsyncState {
        self.content.read().state
    }

    /// Transitions to `Value`, replacing whatever payload the cell held.
    ///
    /// Legal from any state, including `Progress` — this is how a
    /// computation publishes success. Wakes every thread blocked in
    /// [`wait`](Self::wait).
    pub fn set_value(&self, value: V) {
        self.publish_terminal(Some(value), None);
    }

    /// Transitions to `Error`, replacing whatever payload the cell held.
    ///
    /// Same legality and wake behavior as [`set_value`](Self::set_value);
    /// a failed computation is a first-class terminal state, not a panic.
    pub fn set_error(&self, error: E) {
        self.publish_terminal(None, Some(error));
    }

    fn publish_terminal(&self, value: Option<V>, error: Option<E>) {
        let state = if value.is_some() {
            AsyncState::Value
        } else {
            AsyncState::Error
        };
        let old_payload;
        {
            let slot = self.write.lock();
            {
                let mut slots = self.content.write();
                old_payload = (slots.value.take(), slots.error.take());
                slots.value = value;
                slots.error = error;
                slots.state = state;
            }
            #[cfg(feature = "tracing")]
            tracing::trace!(%state, "cell transition");
            // Waiters are woken before the watcher runs; a panicking watcher
            // therefore cannot strand a blocked thread.
            slot.wake_all();
            self.notify(state);
        }
        // Both locks are released; a slow payload destructor runs unlocked.
        drop(old_payload);
    }

    /// Transitions to `Progress` and returns a live handle to the new
    /// descriptor. The handle stays valid until [`stop_progress`] releases
    /// it, even across the terminal transition that ends the computation.
    ///
    /// Does not wake threads blocked in [`wait`](Self::wait) — they keep
    /// waiting for a terminal state — but does notify the state watcher.
    ///
    /// # Panics
    ///
    /// If the cell is already in `Progress`. Two concurrent computations on
    /// one cell is a caller logic bug; the cell is left unchanged.
    ///
    /// [`stop_progress`]: Self::stop_progress
    pub fn start_progress(&self, progress: P) -> Arc<P> {
        let handle = Arc::new(progress);
        let old_payload;
        {
            let _slot = self.write.lock();
            {
                let mut slots = self.content.write();
                assert!(
                    slots.state != AsyncState::Progress,
                    "start_progress while a computation is already in flight"
                );
                old_payload = (
                    slots.value.take(),
                    slots.error.take(),
                    slots.progress.replace(Arc::clone(&handle)),
                );
                slots.state = AsyncState::Progress;
            }
            #[cfg(feature = "tracing")]
            tracing::trace!("cell transition to progress");
            self.notify(AsyncState::Progress);
        }
        drop(old_payload);
        handle
    }

    /// Releases the progress descriptor after the computation has published
    /// its terminal result.
    ///
    /// Despite the name, this does **not** stop a running computation — use
    /// [`stop_and_wait`](Self::stop_and_wait) or
    /// [`RequestStop::request_stop`] for that. It exists so the producer can
    /// drop the cell's ownership of the descriptor once it is done with the
    /// handle returned by [`start_progress`](Self::start_progress).
    ///
    /// # Panics
    ///
    /// If the cell is still in `Progress` (publish a value or error first),
    /// or if `expected` is supplied and is not the live descriptor.
    pub fn stop_progress(&self, expected: Option<&Arc<P>>) {
        let old_progress;
        {
            let _slot = self.write.lock();
            let mut slots = self.content.write();
            if let Some(handle) = expected {
                let is_live = slots
                    .progress
                    .as_ref()
                    .is_some_and(|live| Arc::ptr_eq(live, handle));
                assert!(is_live, "stop_progress called with a stale progress handle");
            }
            assert!(
                slots.state != AsyncState::Progress,
                "stop_progress before a terminal result was published"
            );
            old_progress = slots.progress.take();
        }
        drop(old_progress);
    }

    /// Dispatches to the callback matching the current state, under the
    /// shared content lock. Never blocks beyond that lock acquisition.
    pub fn access<R>(
        &self,
        on_value: impl FnOnce(&V) -> R,
        on_error: impl FnOnce(&E) -> R,
        on_progress: impl FnOnce(&P) -> R,
    ) -> R {
        let slots = self.content.read();
        match slots.state {
            AsyncState::Value => on_value(Self::value_slot(&slots)),
            AsyncState::Error => on_error(Self::error_slot(&slots)),
            AsyncState::Progress => on_progress(Self::progress_slot(&slots)),
        }
    }

    /// Invokes the matching callback if the cell is terminal; returns
    /// whether it was.
    pub fn access_terminal(
        &self,
        on_value: impl FnOnce(&V),
        on_error: impl FnOnce(&E),
    ) -> bool {
        self.read_terminal(&mut Some(on_value), &mut Some(on_error))
    }

    /// Runs `f` on the value if the cell holds one.
    pub fn access_value<R>(&self, f: impl FnOnce(&V) -> R) -> Option<R> {
        let slots = self.content.read();
        (slots.state == AsyncState::Value).then(|| f(Self::value_slot(&slots)))
    }

    /// Runs `f` on the error if the cell holds one.
    pub fn access_error<R>(&self, f: impl FnOnce(&E) -> R) -> Option<R> {
        let slots = self.content.read();
        (slots.state == AsyncState::Error).then(|| f(Self::error_slot(&slots)))
    }

    /// Runs `f` on the progress descriptor if a computation is in flight.
    ///
    /// This is how an observer requests a cooperative stop without
    /// blocking: `cell.access_progress(|p| p.request_stop())`.
    pub fn access_progress<R>(&self, f: impl FnOnce(&P) -> R) -> Option<R> {
        let slots = self.content.read();
        (slots.state == AsyncState::Progress).then(|| f(Self::progress_slot(&slots)))
    }

    /// Clones the value out, if the cell holds one.
    pub fn value(&self) -> Option<V>
    where
        V: Clone,
    {
        self.access_value(V::clone)
    }

    /// Clones the error out, if the cell holds one.
    pub fn error(&self) -> Option<E>
    where
        E: Clone,
    {
        self.access_error(E::clone)
    }

    /// Blocks until the cell is terminal, then invokes the matching
    /// callback with the payload present at wakeup.
    ///
    /// Fast path: if the cell is already terminal, the callback runs under
    /// the shared content lock and no other lock is taken. Slow path: the
    /// calling thread suspends (no spinning) until a terminal transition
    /// broadcasts a wakeup. Concurrent blockers coalesce onto one
    /// condition-variable wait per cell; see the module docs.
    ///
    /// If producers repeatedly restart computations, a waiter that loses
    /// the race to observe a terminal window simply keeps waiting for the
    /// next one.
    pub fn wait(&self, on_value: impl FnOnce(&V), on_error: impl FnOnce(&E)) {
        let mut on_value = Some(on_value);
        let mut on_error = Some(on_error);

        // Fast path: already terminal.
        if self.read_terminal(&mut on_value, &mut on_error) {
            return;
        }

        let slot = self.write.lock();
        // The state may have gone terminal between the fast path and the
        // lock acquisition.
        if self.read_terminal(&mut on_value, &mut on_error) {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!("blocking until terminal state");

        match slot.current() {
            None => waiter::block_as_owner(slot, || {
                self.read_terminal(&mut on_value, &mut on_error)
            }),
            Some(record) => waiter::block_as_dependent(slot, record, || {
                self.read_terminal(&mut on_value, &mut on_error)
            }),
        }
    }

    /// Blocks until the cell is terminal, discarding the payload.
    pub fn wait_done(&self) {
        self.wait(|_| {}, |_| {});
    }

    /// Blocks until the cell is terminal and returns an owned copy of the
    /// payload.
    pub fn wait_result(&self) -> Result<V, E>
    where
        V: Clone,
        E: Clone,
    {
        let outcome = std::cell::Cell::new(None);
        self.wait(
            |value| outcome.set(Some(Ok(value.clone()))),
            |error| outcome.set(Some(Err(error.clone()))),
        );
        match outcome.into_inner() {
            Some(result) => result,
            None => unreachable!("wait returned without a terminal payload"),
        }
    }

    /// Requests a cooperative stop on the live computation, if any, then
    /// blocks until the cell is terminal.
    ///
    /// The two steps are independently locked; no combined atomicity is
    /// promised. The producer may still publish a value after the stop
    /// request — "stop" is advisory, never preemptive.
    pub fn stop_and_wait(&self)
    where
        P: RequestStop,
    {
        self.access_progress(RequestStop::request_stop);
        self.wait_done();
    }

    /// Shared read of the terminal payload. Consumes the matching callback
    /// on success so the `wait` loop can re-run this after spurious or
    /// stale wakeups without double-invoking user code.
    fn read_terminal<F, G>(&self, on_value: &mut Option<F>, on_error: &mut Option<G>) -> bool
    where
        F: FnOnce(&V),
        G: FnOnce(&E),
    {
        let slots = self.content.read();
        match slots.state {
            AsyncState::Value => {
                if let Some(f) = on_value.take() {
                    f(Self::value_slot(&slots));
                }
                true
            }
            AsyncState::Error => {
                if let Some(f) = on_error.take() {
                    f(Self::error_slot(&slots));
                }
                true
            }
            AsyncState::Progress => false,
        }
    }

    fn notify(&self, state: AsyncState) {
        if let Some(watcher) = &self.watcher {
            watcher(state);
        }
    }

    // Slot projections. The populated-iff-tagged invariant holds whenever
    // the content lock is held, so an empty slot here is a fatal bug.

    fn value_slot<'a>(slots: &'a Slots<V, E, P>) -> &'a V {
        slots
            .value
            .as_ref()
            .expect("state tag is Value but the value slot is empty")
    }

    fn error_slot<'a>(slots: &'a Slots<V, E, P>) -> &'a E {
        slots
            .error
            .as_ref()
            .expect("state tag is Error but the error slot is empty")
    }

    fn progress_slot<'a>(slots: &'a Slots<V, E, P>) -> &'a P {
        slots
            .progress
            .as_deref()
            .expect("state tag is Progress but the progress slot is empty")
    }
}

impl<V, E, P> Drop for AsyncCell<V, E, P> {
    fn drop(&mut self) {
        // Destroying a cell mid-computation is a contract violation: the
        // producer still holds a handle and expects to publish a result.
        if !std::thread::panicking() {
            assert!(
                self.content.get_mut().state != AsyncState::Progress,
                "async cell dropped while a computation is in flight"
            );
        }
    }
}

impl<V, E, P> core::fmt::Debug for AsyncCell<V, E, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncCell")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
