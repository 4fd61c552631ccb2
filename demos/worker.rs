//! Producer/consumer walkthrough: one cell driven through two computations,
//! the first running to completion, the second cancelled cooperatively.
//!
//! Run with `cargo run --example worker`.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use tricell::{AsyncCell, Progress};

fn main() -> Result<()> {
    let cell: AsyncCell<String, String> =
        AsyncCell::with_value_watched("Hello World!".into(), |state| {
            println!("[watcher] state -> {state}");
        });

    cell.access_value(|v| println!("initial value: {v}"));

    // First computation: runs to completion.
    let handle = cell.start_progress(Progress::with_message("computing the answer"));
    thread::scope(|s| {
        let cell = &cell;
        let handle = &handle;

        s.spawn(move || {
            for step in 1..=20u32 {
                if handle.stop_requested() {
                    cell.set_error("Stopped".into());
                    return;
                }
                handle.set_fraction(step as f32 / 20.0);
                thread::sleep(Duration::from_millis(10));
            }
            cell.set_value("42".into());
        });

        s.spawn(move || {
            while let Some(line) = cell.access_progress(|p| {
                format!("{:>3.0}% {}", f64::from(p.fraction()) * 100.0, p.message())
            }) {
                println!("[observer] {line}");
                thread::sleep(Duration::from_millis(25));
            }
        });

        cell.wait(
            |v| println!("[consumer] got value: {v}"),
            |e| println!("[consumer] got error: {e}"),
        );
    });
    cell.stop_progress(Some(&handle));

    // Second computation: cancelled from the outside.
    let handle = cell.start_progress(Progress::with_message("never finishes on its own"));
    thread::scope(|s| {
        let cell = &cell;
        let handle = &handle;

        s.spawn(move || loop {
            if handle.stop_requested() {
                cell.set_error("Stopped".into());
                return;
            }
            thread::sleep(Duration::from_millis(5));
        });

        thread::sleep(Duration::from_millis(50));
        println!("[main] requesting stop");
        cell.stop_and_wait();
    });
    cell.stop_progress(Some(&handle));

    cell.access(
        |v| println!("final state: value {v}"),
        |e| println!("final state: error {e}"),
        |_| println!("final state: still in progress"),
    );

    Ok(())
}
