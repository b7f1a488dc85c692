//! End-to-end locker suite
//!
//! Drives the public facade (`txlocker::*`) against the in-memory driver.
//!
//! ## Running
//!
//! ```bash
//! cargo test --test locker
//! cargo test --test locker -- --nocapture   # with trace output
//! ```

#[path = "../common/mod.rs"]
mod common;

mod handler_stop;
mod request_lifecycle;
mod scenarios;
