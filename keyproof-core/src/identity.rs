//! Identity value types.
//!
//! An [`Identity`] is one public key plus a human-readable label; an
//! [`IdentitySet`] is an ordered collection of them, built either from the
//! authorized-keys file or from a live agent's identity list.

use ssh_key::PublicKey;
use ssh_key::public::KeyData;

/// One public key held by an agent or listed in the authorized-keys file.
///
/// Two identities are equal iff their key material is cryptographically
/// equal: same algorithm, same parameters, same bytes.  The label is
/// carried for diagnostics only and never participates in equality.
#[derive(Debug, Clone)]
pub struct Identity {
    key: KeyData,
    label: String,
}

impl Identity {
    pub fn new(key: KeyData, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
        }
    }

    /// The public key material.
    pub fn key_data(&self) -> &KeyData {
        &self.key
    }

    /// Human-readable label (the key's comment field, usually `user@host`).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// SHA-256 fingerprint string (e.g. `"SHA256:abc123…"`).
    pub fn fingerprint(&self) -> String {
        self.key.fingerprint(ssh_key::HashAlg::Sha256).to_string()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Identity {}

impl From<PublicKey> for Identity {
    fn from(key: PublicKey) -> Self {
        let label = key.comment().to_string();
        Self {
            key: key.into(),
            label,
        }
    }
}

/// Ordered sequence of identities.
///
/// Insertion order is preserved and used only for diagnostic enumeration,
/// never for correctness.  The set may be empty, and duplicates are
/// permitted; they cost redundant comparisons, nothing more.
#[derive(Debug, Clone, Default)]
pub struct IdentitySet {
    entries: Vec<Identity>,
}

impl IdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identity: Identity) {
        self.entries.push(identity);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Identity> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Identity> for IdentitySet {
    fn from_iter<I: IntoIterator<Item = Identity>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a IdentitySet {
    type Item = &'a Identity;
    type IntoIter = std::slice::Iter<'a, Identity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
