// ABOUTME: Library root for tunneler - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod error;
pub mod gcloud;
pub mod listener;
pub mod session;
pub mod ssh;
pub mod tunnel;
pub mod types;
