//! recordkeeper: retention engine for clinical visit records.
//!
//! Each visit belongs to a case type that configures how many years its
//! physical record stays in the active filing room. Once that period has
//! elapsed the engine opens a pending media transfer record for the visit and
//! marks it inactive. Later stages (retention, destruction) are advanced by
//! administrative action through [`lifecycle::LifecycleService`].

pub mod config;
pub mod db;
pub mod jobs;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod retention;
