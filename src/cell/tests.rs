use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{AsyncCell, AsyncState, Progress};

#[test]
fn constructed_with_value() {
    let cell: AsyncCell<String, String> = AsyncCell::with_value("Hello World!".into());
    assert_eq!(cell.state(), AsyncState::Value);
    assert_eq!(
        cell.access_value(|v| v.clone()).as_deref(),
        Some("Hello World!")
    );
    assert_eq!(cell.access_error(|e| e.clone()), None);
    assert_eq!(cell.access_progress(|_| ()), None);
}

#[test]
fn constructed_with_error() {
    let cell: AsyncCell<String, String> = AsyncCell::with_error("boom".into());
    assert_eq!(cell.state(), AsyncState::Error);
    assert_eq!(cell.error().as_deref(), Some("boom"));
    assert_eq!(cell.value(), None);
}

#[test]
fn three_way_access_matches_tag() {
    let cell: AsyncCell<u32, u32> = AsyncCell::with_value(7);
    let seen = cell.access(
        |_| AsyncState::Value,
        |_| AsyncState::Error,
        |_| AsyncState::Progress,
    );
    assert_eq!(seen, cell.state());

    cell.start_progress(Progress::new());
    let seen = cell.access(
        |_| AsyncState::Value,
        |_| AsyncState::Error,
        |_| AsyncState::Progress,
    );
    assert_eq!(seen, AsyncState::Progress);

    cell.set_error(3);
    assert_eq!(cell.error(), Some(3));
    cell.stop_progress(None);
}

#[test]
fn last_terminal_write_wins() {
    let cell: AsyncCell<u32, u32> = AsyncCell::with_value(1);
    cell.set_value(2);
    cell.set_error(9);
    assert_eq!(cell.state(), AsyncState::Error);
    assert_eq!(cell.error(), Some(9));
    assert_eq!(cell.value(), None);
}

/// Payload whose drops are counted, to pin down double-free / leak bugs in
/// the swap path.
struct Counted(Arc<AtomicUsize>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn replaced_payload_dropped_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    let cell: AsyncCell<Counted, String> = AsyncCell::with_value(Counted(Arc::clone(&drops)));

    cell.set_error("superseded".into());
    assert_eq!(drops.load(Ordering::SeqCst), 1);

    cell.set_value(Counted(Arc::clone(&drops)));
    cell.set_value(Counted(Arc::clone(&drops)));
    assert_eq!(drops.load(Ordering::SeqCst), 2);

    drop(cell);
    assert_eq!(drops.load(Ordering::SeqCst), 3);
}

#[test]
fn start_progress_while_in_progress_panics_and_preserves_state() {
    let cell: AsyncCell<u32, u32> = AsyncCell::with_value(1);
    let handle = cell.start_progress(Progress::with_message("first"));

    let second = catch_unwind(AssertUnwindSafe(|| cell.start_progress(Progress::new())));
    assert!(second.is_err());

    // The cell is unchanged: still in progress, still the first descriptor.
    assert_eq!(cell.state(), AsyncState::Progress);
    let message = cell.access_progress(Progress::message);
    assert_eq!(message.as_deref(), Some("first"));

    cell.set_value(2);
    cell.stop_progress(Some(&handle));
}

#[test]
fn stop_progress_while_still_running_panics() {
    let cell: AsyncCell<u32, u32> = AsyncCell::with_value(1);
    let handle = cell.start_progress(Progress::new());

    let result = catch_unwind(AssertUnwindSafe(|| cell.stop_progress(Some(&handle))));
    assert!(result.is_err());

    assert_eq!(cell.state(), AsyncState::Progress);
    cell.set_value(2);
    cell.stop_progress(Some(&handle));
}

#[test]
fn stop_progress_with_stale_handle_panics() {
    let cell: AsyncCell<u32, u32> = AsyncCell::with_value(1);

    let first = cell.start_progress(Progress::new());
    cell.set_value(2);
    cell.stop_progress(Some(&first));

    let second = cell.start_progress(Progress::new());
    cell.set_error(5);

    let stale = catch_unwind(AssertUnwindSafe(|| cell.stop_progress(Some(&first))));
    assert!(stale.is_err());

    cell.stop_progress(Some(&second));
}

#[test]
fn restart_after_terminal_is_legal() {
    let cell: AsyncCell<u32, u32> = AsyncCell::with_value(1);
    for round in 0..3 {
        let handle = cell.start_progress(Progress::new());
        cell.set_value(round);
        cell.stop_progress(Some(&handle));
        assert_eq!(cell.value(), Some(round));
    }
}

#[test]
fn progress_handle_outlives_terminal_transition() {
    let cell: AsyncCell<u32, u32> = AsyncCell::with_value(0);
    let handle = cell.start_progress(Progress::new());

    cell.set_value(1);

    // The worker may still use its handle after publishing the result.
    handle.set_fraction(1.0);
    assert!((handle.fraction() - 1.0).abs() < f32::EPSILON);

    // But observers no longer see a progress payload.
    assert_eq!(cell.access_progress(|_| ()), None);

    cell.stop_progress(Some(&handle));
}

#[test]
fn dropping_cell_mid_progress_panics() {
    let result = catch_unwind(|| {
        let cell: AsyncCell<u32, u32> = AsyncCell::with_value(1);
        cell.start_progress(Progress::new());
        drop(cell);
    });
    assert!(result.is_err());
}

#[test]
fn watcher_sees_every_transition_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let cell: AsyncCell<u32, u32> =
        AsyncCell::with_value_watched(1, move |state| sink.lock().unwrap().push(state));

    let handle = cell.start_progress(Progress::new());
    cell.set_value(2);
    cell.set_error(3);
    cell.stop_progress(Some(&handle));

    assert_eq!(
        *log.lock().unwrap(),
        vec![AsyncState::Progress, AsyncState::Value, AsyncState::Error]
    );
}

#[test]
fn wait_fast_path_on_terminal_cell() {
    let cell: AsyncCell<String, String> = AsyncCell::with_value("ready".into());
    let mut seen = None;
    cell.wait(
        |v| seen = Some(v.clone()),
        |_| panic!("value cell reported an error"),
    );
    assert_eq!(seen.as_deref(), Some("ready"));
}

#[test]
fn wait_result_clones_the_payload() {
    let cell: AsyncCell<u32, String> = AsyncCell::with_value(42);
    assert_eq!(cell.wait_result(), Ok(42));

    cell.set_error("nope".into());
    assert_eq!(cell.wait_result(), Err("nope".into()));
}

#[test]
fn stop_and_wait_on_terminal_cell_returns_immediately() {
    let cell: AsyncCell<u32, u32> = AsyncCell::with_value(1);
    cell.stop_and_wait();
    assert_eq!(cell.state(), AsyncState::Value);
}

#[test]
fn debug_shows_state() {
    let cell: AsyncCell<u32, u32> = AsyncCell::with_error(1);
    let printed = format!("{cell:?}");
    assert!(printed.contains("Error"), "{printed}");
}
