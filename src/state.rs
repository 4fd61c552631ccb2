//! State tag for the async cell and the transition-watcher boundary.

use core::fmt;

/// The current state of an [`AsyncCell`](crate::AsyncCell).
///
/// A cell always holds exactly one payload, and this tag says which one:
/// a completed value, a completed error, or a live progress descriptor for
/// a computation still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsyncState {
    /// A completed value is available.
    Value,
    /// A completed error is available.
    Error,
    /// A computation is in flight; only the progress descriptor can be read.
    Progress,
}

impl AsyncState {
    /// Returns `true` for [`Value`](Self::Value) and [`Error`](Self::Error),
    /// the states blocking waits return from.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, AsyncState::Progress)
    }
}

impl fmt::Display for AsyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AsyncState::Value => "value",
            AsyncState::Error => "error",
            AsyncState::Progress => "progress",
        };
        f.write_str(name)
    }
}

/// Callback invoked synchronously after every state transition.
///
/// Injected at cell construction via the `*_watched` constructors. The
/// watcher runs after the content lock has been released (so it cannot
/// deadlock against concurrent `access*` calls) but before the transition
/// serialization lock is released, so invocations are totally ordered and
/// match the order of transitions.
///
/// The watcher must not call back into the cell's transition or blocking
/// operations (`set_value`, `set_error`, `start_progress`, `stop_progress`,
/// `wait`, `stop_and_wait`); the serialization lock is not reentrant and
/// doing so deadlocks. Non-blocking `access*` reads are fine.
pub type StateWatcher = Box<dyn Fn(AsyncState) + Send + Sync>;
