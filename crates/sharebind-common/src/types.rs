//! Value types shared by the mount tables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ShareError;

/// Read-write or read-only restriction on a mount or bind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// Read-write.
    #[default]
    #[serde(rename = "rw")]
    ReadWrite,
    /// Read-only.
    #[serde(rename = "ro")]
    ReadOnly,
}

impl AccessMode {
    /// Short option flag (`rw` or `ro`).
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::ReadWrite => "rw",
            Self::ReadOnly => "ro",
        }
    }

    /// Whether this mode forbids writes.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::ReadOnly)
    }

    /// Mode from a comma separated option list; `ro` wins, anything else is read-write.
    #[must_use]
    pub fn from_options(options: &str) -> Self {
        if options.split(',').any(|opt| opt == "ro") {
            Self::ReadOnly
        } else {
            Self::ReadWrite
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

impl FromStr for AccessMode {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rw" => Ok(Self::ReadWrite),
            "ro" => Ok(Self::ReadOnly),
            other => Err(ShareError::Config {
                message: format!("unknown access mode '{other}', expected rw or ro"),
            }),
        }
    }
}

/// How a host mount is made persistent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mechanism {
    /// Entry in the static host mount table.
    #[default]
    #[serde(rename = "fstab")]
    Static,
    /// On-demand master/map file pair, remounted automatically.
    #[serde(rename = "autofs")]
    OnDemand,
}

impl Mechanism {
    /// Name used in exports and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "fstab",
            Self::OnDemand => "autofs",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mechanism {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fstab" | "static" => Ok(Self::Static),
            "autofs" | "on-demand" => Ok(Self::OnDemand),
            other => Err(ShareError::Config {
                message: format!("unknown mount method '{other}', expected fstab or autofs"),
            }),
        }
    }
}

/// A host-level share mount definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMountEntry {
    /// Network share address, e.g. `//10.0.0.5/main`.
    pub source: String,
    /// Host mount target path, compared as an exact string.
    pub target: String,
    /// Table the entry lives in.
    pub mechanism: Mechanism,
    /// Access mode of the mount.
    pub mode: AccessMode,
    /// Credential file referenced by the mount options.
    pub credentials: PathBuf,
}

/// Username and password used to authenticate to a share.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Check that both values fit on one line of the credential file.
    ///
    /// # Errors
    ///
    /// Returns [`ShareError::InvalidCredentials`] if the username is empty or
    /// either value contains a line break.
    pub fn validate(&self) -> Result<(), ShareError> {
        if self.username.is_empty() {
            return Err(ShareError::InvalidCredentials {
                reason: "username is empty".to_string(),
            });
        }
        for (field, value) in [("username", &self.username), ("password", &self.password)] {
            if value.contains(['\n', '\r']) {
                return Err(ShareError::InvalidCredentials {
                    reason: format!("{field} contains a line break"),
                });
            }
        }
        Ok(())
    }

    /// Contents of a credential file.
    #[must_use]
    pub fn to_file_contents(&self) -> String {
        format!("username={}\npassword={}\n", self.username, self.password)
    }

    /// Parse a credential file. Returns `None` if the username line is missing.
    #[must_use]
    pub fn parse(contents: &str) -> Option<Self> {
        let mut username = None;
        let mut password = String::new();
        for line in contents.lines() {
            if let Some(value) = line.strip_prefix("username=") {
                username = Some(value.to_string());
            } else if let Some(value) = line.strip_prefix("password=") {
                password = value.to_string();
            }
        }
        username.map(|username| Self { username, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mode_from_options() {
        assert_eq!(AccessMode::from_options("noatime,ro,uid=1"), AccessMode::ReadOnly);
        assert_eq!(AccessMode::from_options("noatime,rw"), AccessMode::ReadWrite);
        assert_eq!(AccessMode::from_options("root=x"), AccessMode::ReadWrite);
    }

    #[test]
    fn mechanism_parses_aliases() {
        assert_eq!("static".parse::<Mechanism>().unwrap(), Mechanism::Static);
        assert_eq!("autofs".parse::<Mechanism>().unwrap(), Mechanism::OnDemand);
        assert!("nfs".parse::<Mechanism>().is_err());
    }

    #[test]
    fn credentials_file_format() {
        let creds = Credentials::new("alice", "s3cret=1");
        let contents = creds.to_file_contents();
        assert_eq!(contents, "username=alice\npassword=s3cret=1\n");
        assert_eq!(Credentials::parse(&contents), Some(creds));
    }

    #[test]
    fn credentials_reject_line_breaks() {
        assert!(Credentials::new("alice", "s3cret").validate().is_ok());
        for creds in [
            Credentials::new("alice", "pw\nusername=mallory"),
            Credentials::new("al\rice", "pw"),
            Credentials::new("", "pw"),
        ] {
            assert!(matches!(
                creds.validate(),
                Err(ShareError::InvalidCredentials { .. })
            ));
        }
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
