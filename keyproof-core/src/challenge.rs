//! Possession-challenge engine.
//!
//! Given the authorized identity set and a channel to a live agent, decide
//! whether any agent identity both equals an authorized identity and can
//! prove possession of the corresponding private key.  Proof means signing
//! a fresh random challenge with the agent-held key such that the signature
//! verifies against the *authorized* copy of the public key; the agent's
//! own claim of success is never trusted.

use rand::RngCore;
use signature::Verifier;
use ssh_key::Signature;
use tracing::debug;

use crate::identity::{Identity, IdentitySet};
use crate::{AgentChannel, Decision, Error};

/// Challenge length in bytes.
///
/// Large enough that producing a valid signature over adversarially chosen
/// content is no easier than over a minimal nonce, while keeping the agent
/// round trip cheap.
pub const CHALLENGE_LEN: usize = 1024;

/// A single-use random challenge.
///
/// Drawn fresh from the process CSPRNG for every comparison attempt and
/// discarded afterwards.  Reusing a nonce across attempts would let a
/// captured signature be replayed against another pair sharing the same
/// authorized key.
struct Challenge {
    nonce: [u8; CHALLENGE_LEN],
}

impl Challenge {
    fn fresh() -> Self {
        let mut nonce = [0u8; CHALLENGE_LEN];
        rand::rng().fill_bytes(&mut nonce);
        Self { nonce }
    }

    /// True iff `sig` is a valid signature over this challenge by the key
    /// in `authorized`.
    fn verified_by(&self, authorized: &Identity, sig: &Signature) -> bool {
        authorized.key_data().verify(&self.nonce, sig).is_ok()
    }
}

/// Run one full authentication attempt against `channel`.
///
/// Fetches the agent identity list, then scans agent × authorized pairs in
/// insertion order.  Only a failure to reach the agent (or a malformed
/// reply) is an error; sign/verify failures on individual pairs are
/// absorbed and the scan continues.
pub async fn authenticate(
    channel: &mut dyn AgentChannel,
    authorized: &IdentitySet,
) -> Result<Decision, Error> {
    let agent_ids = channel.list_identities().await?;

    debug!(count = agent_ids.len(), "agent identities fetched");
    for identity in &agent_ids {
        debug!(
            label = %identity.label(),
            fingerprint = %identity.fingerprint(),
            "agent key"
        );
    }

    Ok(match_and_challenge(channel, &agent_ids, authorized).await)
}

/// The matching loop.  Never fails: every per-pair error is a non-match.
///
/// Exhaustion yields [`Decision::Rejected`] whether no key matched at all
/// or a match existed but never proved possession; callers cannot tell the
/// cases apart, and that is deliberate.
async fn match_and_challenge(
    channel: &mut dyn AgentChannel,
    agent_ids: &IdentitySet,
    authorized: &IdentitySet,
) -> Decision {
    for agent_id in agent_ids {
        for auth_id in authorized {
            if agent_id != auth_id {
                continue;
            }
            // Equal key material is necessary but not sufficient.  A failed
            // proof must not end the scan: a later pair may still succeed.
            if prove_possession(channel, agent_id, auth_id).await {
                return Decision::Accepted;
            }
        }
    }
    Decision::Rejected
}

async fn prove_possession(
    channel: &mut dyn AgentChannel,
    agent_id: &Identity,
    auth_id: &Identity,
) -> bool {
    let challenge = Challenge::fresh();

    let sig = match channel.sign(agent_id, &challenge.nonce).await {
        Ok(sig) => sig,
        Err(err) => {
            debug!(label = %agent_id.label(), error = %err, "sign request failed; continuing scan");
            return false;
        }
    };

    let proven = challenge.verified_by(auth_id, &sig);
    if !proven {
        debug!(label = %agent_id.label(), "signature did not verify; continuing scan");
    }
    proven
}
