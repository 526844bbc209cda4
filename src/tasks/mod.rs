//! Background Tasks Module
//!
//! # Tasks
//! - Expiry cleanup: purges expired responses and elapsed rate-limit windows

mod cleanup;

pub use cleanup::spawn_cleanup_task;
