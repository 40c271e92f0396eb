use anyhow::Result;

use keyproof_agent::AgentClient;
use keyproof_core::config::ConfigError;
use keyproof_core::{AgentChannel as _, Config, Decision, authfile};

#[tokio::main]
async fn main() -> Result<()> {
    // Reset SIGPIPE to default so piping output to `head` etc. exits cleanly
    // instead of panicking with "broken pipe".
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = args.first().map(String::as_str).unwrap_or("help");

    match cmd {
        "check" => cmd_check(&args[1..]).await,
        "keys" => cmd_keys(&args[1..]).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }
}

/// Run one authentication attempt and print the decision.  The exit status
/// mirrors the PAM hook so shell scripts and the hook agree.
async fn cmd_check(args: &[String]) -> Result<()> {
    let config = parse_config(args)?;
    init_tracing(config.debug);

    let decision = keyproof_agent::authenticate(&config).await;
    println!("{decision}");

    std::process::exit(match decision {
        Decision::Accepted => 0,
        Decision::Rejected => 7,
        Decision::Unavailable => 9,
    });
}

/// Enumerate the authorized identity and whatever the agent is holding,
/// with fingerprints; the quickest way to see why a check rejects.
async fn cmd_keys(args: &[String]) -> Result<()> {
    let config = parse_config(args)?;
    init_tracing(config.debug);

    let authorized = authfile::load_authorized(&config.file)?;
    println!("authorized ({}):", authorized.len());
    for identity in &authorized {
        println!("  {} {}", identity.fingerprint(), identity.label());
    }

    let mut channel = AgentClient::connect_env(config.timeout).await?;
    let agent_ids = channel.list_identities().await?;
    println!("agent ({}):", agent_ids.len());
    for identity in &agent_ids {
        println!("  {} {}", identity.fingerprint(), identity.label());
    }

    Ok(())
}

fn parse_config(args: &[String]) -> Result<Config, ConfigError> {
    Config::from_args(args.iter().map(String::as_str))
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_help() {
    println!(
        "\
keyproof - SSH agent possession-proof authentication

USAGE:
    keyproof <command> [module-args...]

COMMANDS:
    check                               Run one authentication attempt and print the decision
    keys                                List the authorized identity and the agent's identities
    help                                Show this help

MODULE ARGS (same grammar as the PAM hook):
    file=/absolute/path                 Authorized-keys file (required)
    debug                               Verbose diagnostics on stderr
    timeout=SECS                        Per-round-trip agent deadline (default 5)

EXIT CODES (check):
    0   accepted
    7   rejected
    9   unavailable (file or agent unreachable)

NOTES:
    The agent is found via SSH_AUTH_SOCK. An empty agent is not an error:
    'check' simply rejects, exactly as the PAM hook would.

EXAMPLES:
    keyproof check file=/etc/security/authorized_keys
    keyproof check debug file=$HOME/.ssh/pam_authorized_key
    keyproof keys file=/etc/security/authorized_keys"
    );
}
