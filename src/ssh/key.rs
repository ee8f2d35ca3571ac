// ABOUTME: Private key loading for SSH public-key authentication.
// ABOUTME: Read and parse failures are reported separately.

use super::error::{Error, Result};
use russh::keys::{PrivateKey, decode_secret_key};
use std::path::Path;

/// Read an unencrypted private key (OpenSSH or PEM encoding) from disk.
pub fn load_private_key(path: impl AsRef<Path>) -> Result<PrivateKey> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| Error::KeyLoadFailed {
        path: path.to_path_buf(),
        source,
    })?;

    decode_secret_key(&text, None).map_err(|source| Error::KeyParse {
        path: path.to_path_buf(),
        source,
    })
}
