//! keyproof-pam-auth — pam_exec hook that authenticates against a running
//! SSH agent.
//!
//! This binary is intended to be invoked by `pam_exec.so`, which passes the
//! PAM module arguments through as argv.  It loads the
//! administrator-specified authorized-keys file and accepts the login iff
//! the user's agent proves possession of the matching private key by
//! signing a fresh 1024-byte challenge that verifies against the
//! authorized copy of the key.
//!
//! # PAM configuration
//!
//! Add to the appropriate PAM config (e.g. `/etc/pam.d/sudo`):
//!
//! ```text
//! auth  sufficient  pam_exec.so  quiet /usr/lib/keyproof/keyproof-pam-auth file=/etc/security/authorized_keys
//! ```
//!
//! Optional arguments: `debug` (verbose diagnostics on stderr) and
//! `timeout=SECS` (per-round-trip agent deadline, default 5).
//!
//! # Exit codes
//!
//! The exit status uses PAM result codes so operators can read them from
//! logs; `pam_exec` itself only distinguishes zero from non-zero.
//!
//! - 0 (PAM_SUCCESS) — a key matched and proved possession
//! - 3 (PAM_SERVICE_ERR) — invalid module arguments
//! - 7 (PAM_AUTH_ERR) — no key both matched and proved possession
//! - 9 (PAM_AUTHINFO_UNAVAIL) — authorized file or agent unreachable
//!
//! # Security
//!
//! - The agent is untrusted: its signatures are verified here, against the
//!   authorized copy of the key, before the login is accepted.
//! - No private key material ever passes through this process.
//! - The rejected exit status is identical whether no key matched or a
//!   match failed its possession proof, so the module cannot be used as an
//!   oracle for which keys exist.

use keyproof_core::{Config, Decision};

/// PAM result codes surfaced through the process exit status.
const PAM_SUCCESS: i32 = 0;
const PAM_SERVICE_ERR: i32 = 3;
const PAM_AUTH_ERR: i32 = 7;
const PAM_AUTHINFO_UNAVAIL: i32 = 9;

fn main() -> ! {
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("keyproof-pam-auth: {err}");
            std::process::exit(PAM_SERVICE_ERR);
        }
    };

    init_tracing(config.debug);

    // pam_exec exports the PAM item as PAM_USER; purely diagnostic here.
    tracing::debug!(
        user = %std::env::var("PAM_USER").unwrap_or_else(|_| "(unknown)".into()),
        file = %config.file.display(),
        socket = %std::env::var(keyproof_agent::SSH_AUTH_SOCK).unwrap_or_else(|_| "(unset)".into()),
        "starting authentication"
    );

    let code = match run(&config) {
        Decision::Accepted => PAM_SUCCESS,
        Decision::Rejected => PAM_AUTH_ERR,
        Decision::Unavailable => PAM_AUTHINFO_UNAVAIL,
    };
    std::process::exit(code);
}

/// Run the single authentication attempt on a minimal runtime.
fn run(config: &Config) -> Decision {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            tracing::warn!(error = %err, "cannot build runtime");
            return Decision::Unavailable;
        }
    };

    rt.block_on(keyproof_agent::authenticate(config))
}

/// Diagnostics go to stderr; `pam_exec` forwards them to the journal.  The
/// `debug` module argument raises the level.
fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
