// ABOUTME: Validated domain types shared across modules.
// ABOUTME: Identifiers are checked once at construction and immutable afterwards.

mod resource_name;
mod session_id;

pub use resource_name::{ResourceName, ResourceNameError};
pub use session_id::{SessionId, SessionIds};
