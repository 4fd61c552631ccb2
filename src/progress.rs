//! Progress descriptors and the cooperative-stop seam.

use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// Types that can receive an advisory stop request.
///
/// [`AsyncCell::stop_and_wait`](crate::AsyncCell::stop_and_wait) works with
/// any progress descriptor type implementing this trait. The request is
/// cooperative: the producer polls for it at its own granularity, and no
/// latency is guaranteed. A producer may legitimately finish with a value
/// after the request was made.
pub trait RequestStop {
    /// Requests that the in-flight computation stop. Idempotent; callable
    /// from any thread.
    fn request_stop(&self);
}

/// A progress descriptor for an in-flight computation.
///
/// Written by the producer (`set_fraction`, `set_message`), read by
/// observers through [`AsyncCell::access_progress`](crate::AsyncCell::access_progress),
/// and polled by the producer for cooperative cancellation
/// (`stop_requested`). Each field is independently synchronized, so a
/// producer updating the fraction never contends with a thread requesting a
/// stop.
pub struct Progress {
    /// Completion fraction in `[0, 1]`, stored as `f32` bits.
    fraction: AtomicU32,
    /// Status text shown by observers.
    message: RwLock<String>,
    /// Stop flag, written by observer threads; padded so those writes do
    /// not share a cache line with the producer's fraction updates.
    stop: CachePadded<AtomicBool>,
}

impl Progress {
    /// Creates a descriptor at fraction `0.0` with an empty message.
    pub fn new() -> Self {
        Self {
            fraction: AtomicU32::new(0.0f32.to_bits()),
            message: RwLock::new(String::new()),
            stop: CachePadded::new(AtomicBool::new(false)),
        }
    }

    /// Creates a descriptor at fraction `0.0` with an initial message.
    pub fn with_message(text: impl Into<String>) -> Self {
        let progress = Self::new();
        *progress.message.write() = text.into();
        progress
    }

    /// Sets the completion fraction, clamped to `[0, 1]`. `NaN` is treated
    /// as `0.0`.
    pub fn set_fraction(&self, fraction: f32) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.fraction.store(fraction.to_bits(), Ordering::Relaxed);
    }

    /// The last fraction written, in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        f32::from_bits(self.fraction.load(Ordering::Relaxed))
    }

    /// Replaces the status message.
    pub fn set_message(&self, text: impl Into<String>) {
        *self.message.write() = text.into();
    }

    /// A snapshot of the status message.
    pub fn message(&self) -> String {
        self.message.read().clone()
    }

    /// Sets the stop flag. Idempotent; callable from any thread.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested. The producer polls this inside
    /// its own loop; cancellation is advisory, never preemptive.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStop for Progress {
    fn request_stop(&self) {
        Progress::request_stop(self);
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("fraction", &self.fraction())
            .field("message", &*self.message.read())
            .field("stop_requested", &self.stop_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Progress;

    #[test]
    fn fraction_is_clamped() {
        let progress = Progress::new();
        progress.set_fraction(0.5);
        assert!((progress.fraction() - 0.5).abs() < f32::EPSILON);
        progress.set_fraction(1.5);
        assert!((progress.fraction() - 1.0).abs() < f32::EPSILON);
        progress.set_fraction(-0.2);
        assert_eq!(progress.fraction(), 0.0);
        progress.set_fraction(f32::NAN);
        assert_eq!(progress.fraction(), 0.0);
    }

    #[test]
    fn request_stop_is_idempotent() {
        let progress = Progress::new();
        assert!(!progress.stop_requested());
        progress.request_stop();
        assert!(progress.stop_requested());
        progress.request_stop();
        assert!(progress.stop_requested());
    }

    #[test]
    fn message_roundtrip() {
        let progress = Progress::with_message("loading");
        assert_eq!(progress.message(), "loading");
        progress.set_message("crunching");
        assert_eq!(progress.message(), "crunching");
    }
}
