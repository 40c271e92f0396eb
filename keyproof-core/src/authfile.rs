//! Authorized-keys file loading.
//!
//! The authorized set comes from a public-key-only file: one key record in
//! the standard OpenSSH textual encoding (`algorithm base64-blob
//! [comment]`).  Only the first record is read; the engine itself works for
//! any set size.

use std::path::Path;

use anyhow::anyhow;
use ssh_key::PublicKey;

use crate::Error;
use crate::identity::{Identity, IdentitySet};

/// Load the authorized identity set from `path`.
///
/// Blank lines and `#` comment lines are skipped; the first remaining line
/// must parse as an OpenSSH public key.  A missing or unreadable file, an
/// empty file, or an unparsable record is an [`Error::Parse`].
pub fn load_authorized(path: &Path) -> Result<IdentitySet, Error> {
    let parse_err = |source: anyhow::Error| Error::Parse {
        path: path.to_path_buf(),
        source,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| parse_err(e.into()))?;

    let record = contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .ok_or_else(|| parse_err(anyhow!("no public key record")))?;

    let key = PublicKey::from_openssh(record).map_err(|e| parse_err(e.into()))?;
    Ok(IdentitySet::from_iter([Identity::from(key)]))
}
