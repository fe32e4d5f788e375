//! Common error types for sharebind.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`ShareError`].
pub type ShareResult<T> = Result<T, ShareError>;

/// Errors raised while reconciling share mounts.
#[derive(Error, Diagnostic, Debug)]
pub enum ShareError {
    /// A mount table could not be read.
    #[error("Mount table unreadable: {}", path.display())]
    #[diagnostic(code(sharebind::table::unreadable))]
    TableUnreadable {
        /// The table that could not be read.
        path: PathBuf,
    },

    /// The on-demand remount helper is missing and could not be installed.
    #[error("Mount mechanism unavailable: {mechanism} ({reason})")]
    #[diagnostic(
        code(sharebind::mechanism::unavailable),
        help("Install autofs manually or use the fstab mechanism")
    )]
    MechanismUnavailable {
        /// The requested mechanism.
        mechanism: String,
        /// Why it could not be used.
        reason: String,
    },

    /// The share was configured but mounting it failed.
    #[error("Mount of {target} failed: {reason}")]
    #[diagnostic(
        code(sharebind::mount::activation_failed),
        help("Check the share address and credentials, then run `mount <target>`")
    )]
    MountActivationFailed {
        /// Mount target path.
        target: String,
        /// Failure description.
        reason: String,
    },

    /// Container configuration file does not exist.
    #[error("Container config not found: {}", path.display())]
    #[diagnostic(
        code(sharebind::container::config_not_found),
        help("Create the container before binding shares into it")
    )]
    ConfigNotFound {
        /// The missing configuration file.
        path: PathBuf,
    },

    /// The container could not be started or reached.
    #[error("Container {container} unreachable: {reason}\nRun manually: {remediation}")]
    #[diagnostic(code(sharebind::container::unreachable))]
    ContainerUnreachable {
        /// Container identifier.
        container: String,
        /// Failure description.
        reason: String,
        /// Command the operator should run by hand.
        remediation: String,
    },

    /// A required input was empty.
    #[error("Missing required input: {field}")]
    #[diagnostic(code(sharebind::input::missing))]
    MissingRequiredInput {
        /// Name of the missing field.
        field: String,
    },

    /// An exported credential blob could not be decoded.
    #[error("Invalid credential blob: {reason}")]
    #[diagnostic(code(sharebind::credentials::invalid_blob))]
    InvalidCredentialBlob {
        /// Decoder error.
        reason: String,
    },

    /// Credentials cannot be stored in the two-line credential file format.
    #[error("Invalid credentials: {reason}")]
    #[diagnostic(
        code(sharebind::credentials::invalid),
        help("Usernames and passwords must be single-line values")
    )]
    InvalidCredentials {
        /// What is wrong with them.
        reason: String,
    },

    /// An external command exited unsuccessfully.
    #[error("Command `{command}` failed: {status}")]
    #[diagnostic(code(sharebind::command))]
    CommandFailed {
        /// The command line.
        command: String,
        /// Exit status or spawn error.
        status: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(sharebind::config))]
    Config {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(sharebind::io))]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for ShareError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ShareError::ConfigNotFound {
            path: PathBuf::from("/etc/pve/lxc/101.conf"),
        };
        assert_eq!(err.to_string(), "Container config not found: /etc/pve/lxc/101.conf");
    }

    #[test]
    fn unreachable_container_prints_remediation() {
        let err = ShareError::ContainerUnreachable {
            container: "101".to_string(),
            reason: "not running".to_string(),
            remediation: "pct exec 101 -- mkdir -p /mnt/share".to_string(),
        };
        assert!(err.to_string().contains("pct exec 101 -- mkdir -p /mnt/share"));
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ShareError = io_err.into();
        assert!(matches!(err, ShareError::Io(_)));
    }
}
