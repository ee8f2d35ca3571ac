// ABOUTME: Session pipeline using the type state pattern.
// ABOUTME: Accepted -> TunnelDialed -> Authenticated -> ChannelOpen -> relay -> closed.

mod error;
mod pipeline;
mod relay;
mod state;
mod transitions;

pub use error::{SessionError, SessionErrorKind, Stage};
pub use pipeline::Pipeline;
pub use relay::{Direction, RelayEnd, RelayReport};
pub use state::{Accepted, Authenticated, ChannelOpen, TunnelDialed};
pub use transitions::Session;
