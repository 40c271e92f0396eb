//! Core authentication engine for keyproof.
//!
//! Decides whether a running SSH agent can prove possession of the private
//! half of a key listed in an administrator-specified authorized-keys file.
//! One call is one authentication attempt; the outcome is a definitive
//! [`Decision`].
//!
//! # Architecture
//!
//! ```text
//! authorized-keys file ──► authfile::load_authorized ──► IdentitySet (A)
//!                                                             │
//! SSH agent ──── AgentChannel (injected) ──► IdentitySet (G)  │
//!                     │                           │           │
//!                     │ sign(identity, nonce)     ▼           ▼
//!                     └────────────────► challenge::authenticate
//!                                                 │
//!                                          Accepted | Rejected
//! ```
//!
//! The agent behind the [`AgentChannel`] is untrusted: it may be buggy,
//! malicious, or absent.  Key equality alone never authenticates: every
//! candidate pair must pass a fresh-challenge signature that this crate
//! verifies locally against the authorized copy of the key.

use async_trait::async_trait;
use ssh_key::Signature;

pub mod authfile;
pub mod challenge;
pub mod config;
pub mod identity;

pub use challenge::{CHALLENGE_LEN, authenticate};
pub use config::Config;
pub use identity::{Identity, IdentitySet};

/// Failures that abort an attempt before the matching phase.
///
/// Both variants map to [`Decision::Unavailable`] at the host boundary.
/// Failures of individual sign/verify attempts inside the matching loop are
/// not represented here; they are absorbed by the engine and only affect
/// whether that one candidate pair counts as a match.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Authorized-keys file missing, unreadable, or not a recognised key
    /// encoding.
    #[error("authorized keys file {}: {source}", path.display())]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Agent socket unreachable, malformed agent reply, or deadline
    /// exceeded.
    #[error("ssh agent: {0}")]
    Agent(#[source] anyhow::Error),
}

/// Final outcome of one authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// An agent identity matched an authorized key and proved possession of
    /// the private half by signing a fresh challenge.
    Accepted,

    /// No pair both matched and proved possession.  Deliberately
    /// indistinguishable from "no matching key at all" so callers cannot be
    /// used as an oracle for which keys exist.
    Rejected,

    /// The attempt could not be made: the authorized set or the agent was
    /// unreachable before the matching phase started.
    Unavailable,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Unavailable => "unavailable",
        })
    }
}

/// Capability handle to a running SSH agent.
///
/// The agent holds private key material and offers signing without ever
/// exposing the keys; nothing more is assumed about it.  A `sign` failure or
/// a signature that does not verify is ordinary behaviour for a buggy or
/// adversarial agent and must never be treated as proof of anything.
///
/// Implementations own the transport and are expected to bound each round
/// trip with a deadline; the engine awaits them without any timeout of its
/// own.
#[async_trait]
pub trait AgentChannel: Send {
    /// Fetch the identities the agent currently holds.
    ///
    /// An empty set is a valid, non-error outcome.
    async fn list_identities(&mut self) -> Result<IdentitySet, Error>;

    /// Ask the agent to sign `data` with the private key matching
    /// `identity`.
    ///
    /// The returned signature is a claim, not a proof; callers verify it
    /// themselves against the public key they already trust.
    async fn sign(&mut self, identity: &Identity, data: &[u8]) -> Result<Signature, Error>;
}
