//! Waiter coordination for blocking reads.
//!
//! The protocol here turns any number of concurrently blocking consumers
//! into exactly one condition-variable wait per notification, without heap
//! allocation for the wait queue.

pub(crate) mod waiter;
