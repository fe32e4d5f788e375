//! Deployment configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ShareError, ShareResult};

/// Host uid that container root is mapped to.
pub const DEFAULT_HOST_UID: u32 = 100_000;

/// Gid of the access group inside containers.
pub const DEFAULT_CONTAINER_GID: u32 = 10_000;

/// Host gid the container access group is mapped to.
pub const DEFAULT_HOST_GID: u32 = DEFAULT_HOST_UID + DEFAULT_CONTAINER_GID;

/// Name of the access group inside containers.
pub const DEFAULT_GROUP_NAME: &str = "lxc_shares";

/// Idle timeout of on-demand mounts, in seconds.
pub const DEFAULT_AUTOFS_TIMEOUT: u32 = 60;

/// Deployment-specific settings applied to every mount written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShareConfig {
    /// Owner uid of mounted files on the host.
    pub host_uid: u32,
    /// Group gid of mounted files on the host.
    pub host_gid: u32,
    /// Gid of the access group created inside containers.
    pub container_gid: u32,
    /// Name of the access group created inside containers.
    pub group_name: String,
    /// Directory permission bits (octal string).
    pub dir_mode: String,
    /// File permission bits (octal string).
    pub file_mode: String,
    /// Character set passed to the share driver.
    pub charset: String,
    /// Idle timeout of on-demand mounts.
    pub autofs_timeout: u32,
    /// Package providing the on-demand remount helper.
    pub autofs_package: String,
    /// Service name of the on-demand remount helper.
    pub autofs_service: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            host_uid: DEFAULT_HOST_UID,
            host_gid: DEFAULT_HOST_GID,
            container_gid: DEFAULT_CONTAINER_GID,
            group_name: DEFAULT_GROUP_NAME.to_string(),
            dir_mode: "0770".to_string(),
            file_mode: "0770".to_string(),
            charset: "utf8".to_string(),
            autofs_timeout: DEFAULT_AUTOFS_TIMEOUT,
            autofs_package: "autofs".to_string(),
            autofs_service: "autofs".to_string(),
        }
    }
}

impl ShareConfig {
    /// Load configuration from a TOML file, falling back to defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or validated.
    pub fn load(path: &Path) -> ShareResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a permission string is not octal or a name is empty.
    pub fn validate(&self) -> ShareResult<()> {
        for (field, value) in [("dir_mode", &self.dir_mode), ("file_mode", &self.file_mode)] {
            if value.is_empty() || u32::from_str_radix(value, 8).is_err() {
                return Err(ShareError::Config {
                    message: format!("{field} must be an octal permission string, got '{value}'"),
                });
            }
        }
        if self.group_name.is_empty() || self.charset.is_empty() {
            return Err(ShareError::Config {
                message: "group_name and charset must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
