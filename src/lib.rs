//! # `tricell` - Thread-Safe Tri-State Async Cells
//!
//! A container that holds exactly one of three mutually exclusive payloads —
//! a completed **value**, a completed **error**, or an in-flight
//! computation's **progress** descriptor — and lets producer threads
//! transition between them while consumer threads read the current payload
//! or block until a terminal state.
//!
//! ## What makes it interesting
//!
//! - **Coalesced blocking waits**: any number of concurrently blocking
//!   consumers share a single stack-resident wait record. The first blocker
//!   owns the record; later blockers attach as dependents of the same
//!   condition-variable wait. No heap allocation per wait, no lost wakeups,
//!   and the owner provably outlives every dependent that touched its stack.
//! - **Split locking**: transitions are serialized by a write mutex, while
//!   payload reads take only a shared content lock. The exclusive window of
//!   a transition is the tag/payload swap alone, so a slow reader callback
//!   never stalls a writer and a slow payload destructor runs outside every
//!   lock.
//! - **Cooperative cancellation**: the progress descriptor carries an
//!   advisory stop flag. Producers poll it; nothing is ever preempted.
//!
//! ## Error model
//!
//! A failing computation is data, not a panic: it transitions the cell to a
//! first-class `Error` state that consumers handle symmetrically with
//! values. Panics are reserved for caller contract violations (starting two
//! computations at once, releasing a descriptor that is still running,
//! dropping a cell mid-computation).
//!
//! ## Example
//!
//! ```rust
//! use std::thread;
//! use tricell::{AsyncCell, Progress};
//!
//! let cell: AsyncCell<u64, String> = AsyncCell::with_value(0);
//!
//! let progress = cell.start_progress(Progress::with_message("summing"));
//! thread::scope(|s| {
//!     // Producer: poll the stop flag, publish a result.
//!     s.spawn(|| {
//!         let mut total = 0;
//!         for n in 1..=100u64 {
//!             if progress.stop_requested() {
//!                 cell.set_error("stopped".into());
//!                 return;
//!             }
//!             total += n;
//!             progress.set_fraction(n as f32 / 100.0);
//!         }
//!         cell.set_value(total);
//!     });
//!
//!     // Consumer: block until the computation is done.
//!     cell.wait(
//!         |total| assert_eq!(*total, 5050),
//!         |err| panic!("unexpected: {err}"),
//!     );
//! });
//! cell.stop_progress(Some(&progress));
//! ```
//!
//! ## Feature flags
//!
//! - `serde`: `Serialize`/`Deserialize` for [`AsyncState`].
//! - `tracing`: trace-level events on transitions and blocking waits.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cell;
pub mod progress;
pub mod state;
mod sync;

pub use cell::AsyncCell;
pub use progress::{Progress, RequestStop};
pub use state::{AsyncState, StateWatcher};

// Compile-time layout checks.
const _: () = {
    use core::mem;

    // The tag is a bare byte.
    assert!(mem::size_of::<AsyncState>() == 1);

    // The waiter slot is one nullable pointer; the write mutex payload must
    // stay a single word so an idle cell pays nothing for the protocol.
    assert!(mem::size_of::<crate::sync::waiter::WaiterSlot>() == mem::size_of::<usize>());
};
