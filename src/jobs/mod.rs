//! Background jobs.
//!
//! - **Retention schedule**: runs the batch expiration check once a day at a
//!   configured UTC time, optionally once at startup, and logs the next run
//!   while it waits.
//!
//! Jobs follow a consistent pattern:
//! 1. Configuration in `config/`
//! 2. Worker function that returns early when disabled and otherwise loops
//!    until cancelled
//! 3. Run function that performs a single pass and logs a structured result
//!
//! # Example
//!
//! ```toml
//! [scheduler]
//! enabled = true
//! daily_at = "08:00"
//! run_on_startup = true
//! ```

mod retention_schedule;

pub use retention_schedule::{advance_run, first_run_after, start_retention_schedule};
