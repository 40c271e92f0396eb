//! Live SSH agent channel and the top-level authentication flow.
//!
//! # Architecture
//!
//! ```text
//! keyproof-pam / keyproof ──► authenticate(&Config)
//!                                  │
//!                 load_authorized  │  AgentClient::connect_env
//!        (keyproof-core/authfile)  │  (SSH_AUTH_SOCK, deadline-bounded)
//!                                  ▼
//!                    challenge::authenticate (keyproof-core)
//!                                  │
//!                 Accepted | Rejected | Unavailable
//! ```
//!
//! Phase order matters: the authorized set is loaded before the agent is
//! contacted, so a misconfigured file fails fast without ever touching the
//! socket.

pub mod client;

pub use client::AgentClient;

use tracing::{debug, warn};

use keyproof_core::{Config, Decision, authfile, challenge};

/// Environment variable naming the agent's Unix socket.
pub const SSH_AUTH_SOCK: &str = "SSH_AUTH_SOCK";

/// Run one complete authentication attempt described by `config`.
///
/// Any failure before the matching phase (unreadable authorized-keys
/// file, unreachable agent, malformed agent reply) maps to
/// [`Decision::Unavailable`].  The matching phase itself only ever yields
/// `Accepted` or `Rejected`.  The agent socket is released on every exit
/// path when the channel drops.
pub async fn authenticate(config: &Config) -> Decision {
    let authorized = match authfile::load_authorized(&config.file) {
        Ok(set) => set,
        Err(err) => {
            warn!(error = %err, "cannot load authorized keys");
            return Decision::Unavailable;
        }
    };
    for identity in &authorized {
        debug!(
            label = %identity.label(),
            fingerprint = %identity.fingerprint(),
            "authorized key"
        );
    }

    let mut channel = match AgentClient::connect_env(config.timeout).await {
        Ok(channel) => channel,
        Err(err) => {
            warn!(error = %err, "cannot reach ssh agent");
            return Decision::Unavailable;
        }
    };

    let decision = match challenge::authenticate(&mut channel, &authorized).await {
        Ok(decision) => decision,
        Err(err) => {
            warn!(error = %err, "agent failed during authentication");
            Decision::Unavailable
        }
    };

    debug!(%decision, "authentication complete");
    decision
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::path::PathBuf;

    use signature::Signer as _;
    use ssh_agent_lib::agent::{Session, listen};
    use ssh_agent_lib::error::AgentError;
    use ssh_agent_lib::proto::{Identity as AgentIdentity, SignRequest};
    use ssh_key::{PrivateKey, Signature};
    use tokio::net::UnixListener;

    /// Minimal in-process agent holding one key and signing honestly.
    /// Cloned per incoming connection by `ssh_agent_lib`.
    #[derive(Clone)]
    pub(crate) struct TestAgent {
        pub key: PrivateKey,
    }

    #[ssh_agent_lib::async_trait]
    impl Session for TestAgent {
        async fn request_identities(&mut self) -> Result<Vec<AgentIdentity>, AgentError> {
            Ok(vec![AgentIdentity {
                pubkey: self.key.public_key().clone().into(),
                comment: "test key".into(),
            }])
        }

        async fn sign(&mut self, request: SignRequest) -> Result<Signature, AgentError> {
            self.key
                .try_sign(&request.data)
                .map_err(|e| AgentError::other(std::io::Error::other(e.to_string())))
        }
    }

    /// Bind a temp socket, serve `key` from it, and return the socket path
    /// (plus the tempdir keeping it alive).
    pub(crate) fn spawn_agent(key: PrivateKey) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let sock = dir.path().join("agent.sock");
        let listener = UnixListener::bind(&sock).expect("bind agent socket");
        tokio::spawn(async move {
            let _ = listen(listener, TestAgent { key }).await;
        });
        (dir, sock)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use ssh_key::rand_core::OsRng;
    use ssh_key::{Algorithm, PrivateKey};
    use tokio::net::UnixListener;

    use super::testutil::spawn_agent;
    use super::*;

    /// Tests below mutate `SSH_AUTH_SOCK`; serialise them on a single
    /// process-wide lock so they cannot race when run in parallel in the
    /// same test binary.
    static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn test_config(file: std::path::PathBuf) -> Config {
        Config {
            file,
            debug: false,
            timeout: Duration::from_secs(5),
        }
    }

    fn write_authfile(dir: &tempfile::TempDir, key: &PrivateKey) -> std::path::PathBuf {
        let path = dir.path().join("authorized_keys");
        let line = key.public_key().to_openssh().expect("encode");
        std::fs::write(&path, format!("{line}\n")).expect("write");
        path
    }

    #[tokio::test]
    async fn accepts_end_to_end_via_the_environment() {
        let _guard = TEST_ENV_MUTEX.lock().unwrap();

        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).expect("keygen");
        let (dir, sock) = spawn_agent(key.clone());
        let file = write_authfile(&dir, &key);

        unsafe { std::env::set_var(SSH_AUTH_SOCK, &sock) };
        let decision = authenticate(&test_config(file)).await;
        assert_eq!(decision, Decision::Accepted);
    }

    #[tokio::test]
    async fn missing_authfile_is_unavailable_without_agent_contact() {
        let _guard = TEST_ENV_MUTEX.lock().unwrap();

        let dir = tempfile::tempdir().expect("tempdir");
        let sock = dir.path().join("agent.sock");
        let listener = UnixListener::bind(&sock).expect("bind");

        let accepted = Arc::new(AtomicUsize::new(0));
        {
            let accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                while listener.accept().await.is_ok() {
                    accepted.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        unsafe { std::env::set_var(SSH_AUTH_SOCK, &sock) };
        let decision = authenticate(&test_config(dir.path().join("missing"))).await;

        assert_eq!(decision, Decision::Unavailable);
        // Fail-fast: the file never loaded, so the socket was never dialled.
        assert_eq!(accepted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_agent_is_unavailable() {
        let _guard = TEST_ENV_MUTEX.lock().unwrap();

        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).expect("keygen");
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write_authfile(&dir, &key);

        unsafe { std::env::set_var(SSH_AUTH_SOCK, dir.path().join("nope.sock")) };
        let decision = authenticate(&test_config(file)).await;
        assert_eq!(decision, Decision::Unavailable);
    }

    #[tokio::test]
    async fn unset_environment_is_unavailable() {
        let _guard = TEST_ENV_MUTEX.lock().unwrap();

        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).expect("keygen");
        let dir = tempfile::tempdir().expect("tempdir");
        let file = write_authfile(&dir, &key);

        unsafe { std::env::remove_var(SSH_AUTH_SOCK) };
        let decision = authenticate(&test_config(file)).await;
        assert_eq!(decision, Decision::Unavailable);
    }
}
