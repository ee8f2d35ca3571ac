// ABOUTME: SSH layer that runs over an already-connected duplex stream.
// ABOUTME: Public-key authentication, explicit host key policy, forwarded channels.

mod client;
mod error;
mod key;
mod traits;

pub use client::{RusshClient, RusshConnector};
pub use error::{Error, ErrorKind, Result};
pub use key::load_private_key;
pub use traits::{SshClient, SshConnector};
