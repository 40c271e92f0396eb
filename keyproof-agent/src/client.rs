//! SSH agent client.
//!
//! Speaks the OpenSSH agent protocol over a Unix socket.  Every round trip
//! is bounded by a deadline so a stalled or adversarial agent cannot hang
//! the calling PAM stack.

use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use ssh_agent_lib::agent::Session;
use ssh_agent_lib::proto::SignRequest;
use ssh_key::Signature;
use tokio::net::UnixStream;
use tracing::debug;

use keyproof_core::{AgentChannel, Error, Identity, IdentitySet};

use crate::SSH_AUTH_SOCK;

/// Live [`AgentChannel`] over the agent's Unix socket.
///
/// The socket is closed when the client is dropped, on every exit path.
pub struct AgentClient {
    session: Box<dyn Session>,
    timeout: Duration,
}

impl AgentClient {
    /// Connect to the agent socket named by `SSH_AUTH_SOCK`.
    ///
    /// Absence of the variable or an unreachable socket is an
    /// [`Error::Agent`], never a panic; the caller maps it to an
    /// "unavailable" outcome.
    pub async fn connect_env(timeout: Duration) -> Result<Self, Error> {
        let path = std::env::var_os(SSH_AUTH_SOCK)
            .ok_or_else(|| Error::Agent(anyhow!("{SSH_AUTH_SOCK} is not set")))?;
        Self::connect(path.as_ref(), timeout).await
    }

    /// Connect to an explicit agent socket path.
    pub async fn connect(path: &Path, timeout: Duration) -> Result<Self, Error> {
        let stream = tokio::time::timeout(timeout, UnixStream::connect(path))
            .await
            .map_err(|_| deadline(timeout))?
            .map_err(|e| Error::Agent(anyhow!("connect to {}: {e}", path.display())))?;

        let session: Box<dyn Session> = Box::new(ssh_agent_lib::client::Client::new(stream));

        debug!(path = %path.display(), "connected to ssh agent");
        Ok(Self { session, timeout })
    }
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn deadline(timeout: Duration) -> Error {
    Error::Agent(anyhow!("agent did not respond within {timeout:?}"))
}

#[async_trait]
impl AgentChannel for AgentClient {
    async fn list_identities(&mut self) -> Result<IdentitySet, Error> {
        let identities = tokio::time::timeout(self.timeout, self.session.request_identities())
            .await
            .map_err(|_| deadline(self.timeout))?
            .map_err(|e| Error::Agent(anyhow!("request identities: {e}")))?;

        Ok(identities
            .into_iter()
            .map(|id| Identity::new(id.pubkey, id.comment))
            .collect())
    }

    async fn sign(&mut self, identity: &Identity, data: &[u8]) -> Result<Signature, Error> {
        let request = SignRequest {
            pubkey: identity.key_data().clone(),
            data: data.to_vec(),
            flags: 0,
        };

        tokio::time::timeout(self.timeout, self.session.sign(request))
            .await
            .map_err(|_| deadline(self.timeout))?
            .map_err(|e| Error::Agent(anyhow!("sign: {e}")))
    }
}
