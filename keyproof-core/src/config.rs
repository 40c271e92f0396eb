//! Per-call module configuration.
//!
//! The PAM hook and the CLI accept the same argument grammar.  A `Config`
//! is constructed once per authentication call and passed down explicitly;
//! there is no process-global state, so the engine stays reentrant and
//! independently testable.

use std::path::PathBuf;
use std::time::Duration;

/// Default deadline for one agent round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute path of the authorized-keys file (`file=`).
    pub file: PathBuf,

    /// Verbose diagnostics (`debug`).  Consumed by the binaries when they
    /// initialise their tracing subscriber; the engine itself just emits
    /// debug events unconditionally.
    pub debug: bool,

    /// Deadline applied to each agent round trip (`timeout=`, in seconds).
    pub timeout: Duration,
}

/// Module-argument problems.  These map to PAM_SERVICE_ERR at the host
/// boundary: a misconfigured stack, not a failed or unavailable attempt.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("file= is not specified")]
    MissingFile,

    #[error("auth file path is not absolute: {}", .0.display())]
    NotAbsolute(PathBuf),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Config {
    /// Parse PAM-style module arguments.
    ///
    /// Recognised: `file=/absolute/path`, `debug`, `timeout=SECS`.  A
    /// relative `file=` path and any unrecognised argument are rejected.
    /// An empty `file=` is ignored, so a stack can neutralise an earlier
    /// argument without editing it out.
    pub fn from_args<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut file = None;
        let mut debug = false;
        let mut timeout = DEFAULT_TIMEOUT;

        for arg in args {
            let arg = arg.as_ref();
            if arg == "debug" {
                debug = true;
            } else if let Some(path) = arg.strip_prefix("file=") {
                if path.is_empty() {
                    continue;
                }
                let path = PathBuf::from(path);
                if !path.is_absolute() {
                    return Err(ConfigError::NotAbsolute(path));
                }
                file = Some(path);
            } else if let Some(secs) = arg.strip_prefix("timeout=") {
                let parsed: u64 = secs
                    .parse()
                    .map_err(|_| ConfigError::InvalidTimeout(secs.to_string()))?;
                if parsed == 0 {
                    return Err(ConfigError::InvalidTimeout(secs.to_string()));
                }
                timeout = Duration::from_secs(parsed);
            } else {
                return Err(ConfigError::InvalidArgument(arg.to_string()));
            }
        }

        let file = file.ok_or(ConfigError::MissingFile)?;
        Ok(Self {
            file,
            debug,
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_arguments() {
        let config =
            Config::from_args(["debug", "file=/etc/security/authorized_keys", "timeout=30"])
                .expect("parse");
        assert!(config.debug);
        assert_eq!(config.file, PathBuf::from("/etc/security/authorized_keys"));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn defaults_without_optional_arguments() {
        let config = Config::from_args(["file=/etc/keys"]).expect("parse");
        assert!(!config.debug);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn file_is_required() {
        assert!(matches!(
            Config::from_args(["debug"]),
            Err(ConfigError::MissingFile)
        ));
    }

    #[test]
    fn empty_file_argument_is_ignored() {
        assert!(matches!(
            Config::from_args(["file="]),
            Err(ConfigError::MissingFile)
        ));
    }

    #[test]
    fn relative_paths_are_rejected() {
        assert!(matches!(
            Config::from_args(["file=keys"]),
            Err(ConfigError::NotAbsolute(_))
        ));
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        assert!(matches!(
            Config::from_args(["file=/etc/keys", "nofail"]),
            Err(ConfigError::InvalidArgument(_))
        ));
    }

    #[test]
    fn zero_or_garbage_timeouts_are_rejected() {
        assert!(matches!(
            Config::from_args(["file=/etc/keys", "timeout=0"]),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(matches!(
            Config::from_args(["file=/etc/keys", "timeout=soon"]),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }
}
