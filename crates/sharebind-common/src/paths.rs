//! Standard filesystem paths for sharebind.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

/// File name prefix of credential files written by sharebind.
pub const CREDENTIALS_PREFIX: &str = ".smbcredentials_";

/// File name prefix of on-demand master include and map files.
pub const AUTOFS_PREFIX: &str = "lxc-share-";

/// Extension of on-demand master include files.
pub const AUTOFS_MASTER_EXT: &str = "autofs";

/// Default configuration file location.
pub static SHAREBIND_CONFIG: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("SHAREBIND_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/sharebind/config.toml"))
});

/// Locations of every store sharebind reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePaths {
    /// Host static mount table (default: /etc/fstab).
    pub fstab: PathBuf,
    /// Directory of on-demand master include files (default: /etc/auto.master.d).
    pub autofs_master_dir: PathBuf,
    /// Directory holding on-demand map files (default: /etc).
    pub autofs_map_dir: PathBuf,
    /// Directory holding credential files (default: /root).
    pub credentials_dir: PathBuf,
    /// Directory of container configuration files (default: /etc/pve/lxc).
    pub container_config_dir: PathBuf,
    /// Parent of host mount targets (default: /mnt/lxc_shares).
    pub mount_root: PathBuf,
}

impl SharePaths {
    /// Create paths with default system locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebase every location under `root`.
    #[must_use]
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            fstab: root.join("etc/fstab"),
            autofs_master_dir: root.join("etc/auto.master.d"),
            autofs_map_dir: root.join("etc"),
            credentials_dir: root.join("root"),
            container_config_dir: root.join("etc/pve/lxc"),
            mount_root: root.join("mnt/lxc_shares"),
        }
    }

    /// Credential file for a share name.
    #[must_use]
    pub fn credential_file(&self, name: &str) -> PathBuf {
        self.credentials_dir
            .join(format!("{CREDENTIALS_PREFIX}{name}"))
    }

    /// On-demand master include file for a share name.
    #[must_use]
    pub fn autofs_master(&self, name: &str) -> PathBuf {
        self.autofs_master_dir
            .join(format!("{AUTOFS_PREFIX}{name}.{AUTOFS_MASTER_EXT}"))
    }

    /// On-demand map file for a share name.
    #[must_use]
    pub fn autofs_map(&self, name: &str) -> PathBuf {
        self.autofs_map_dir
            .join(format!("auto.{AUTOFS_PREFIX}{name}"))
    }

    /// Configuration file of a container.
    #[must_use]
    pub fn container_config(&self, id: &str) -> PathBuf {
        self.container_config_dir.join(format!("{id}.conf"))
    }

    /// Default host mount target for a share name.
    #[must_use]
    pub fn default_target(&self, name: &str) -> PathBuf {
        self.mount_root.join(name)
    }
}

impl Default for SharePaths {
    fn default() -> Self {
        Self {
            fstab: PathBuf::from("/etc/fstab"),
            autofs_master_dir: PathBuf::from("/etc/auto.master.d"),
            autofs_map_dir: PathBuf::from("/etc"),
            credentials_dir: PathBuf::from("/root"),
            container_config_dir: PathBuf::from("/etc/pve/lxc"),
            mount_root: PathBuf::from("/mnt/lxc_shares"),
        }
    }
}

/// Share name encoded in a credential file path, if it follows the naming convention.
#[must_use]
pub fn credential_name(path: &Path) -> Option<String> {
    path.file_name()?
        .to_str()?
        .strip_prefix(CREDENTIALS_PREFIX)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Share name derived from a host target path: its last component.
#[must_use]
pub fn share_name(target: &str) -> Option<String> {
    target
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths() {
        let paths = SharePaths::new();
        assert_eq!(paths.fstab, PathBuf::from("/etc/fstab"));
        assert_eq!(
            paths.credential_file("main"),
            PathBuf::from("/root/.smbcredentials_main")
        );
        assert_eq!(
            paths.container_config("101"),
            PathBuf::from("/etc/pve/lxc/101.conf")
        );
    }

    #[test]
    fn custom_root() {
        let paths = SharePaths::with_root("/tmp/sb");
        assert_eq!(paths.fstab, PathBuf::from("/tmp/sb/etc/fstab"));
        assert_eq!(
            paths.autofs_master("media"),
            PathBuf::from("/tmp/sb/etc/auto.master.d/lxc-share-media.autofs")
        );
        assert_eq!(
            paths.autofs_map("media"),
            PathBuf::from("/tmp/sb/etc/auto.lxc-share-media")
        );
    }

    #[test]
    fn credential_name_follows_convention() {
        assert_eq!(
            credential_name(Path::new("/root/.smbcredentials_main")),
            Some("main".to_string())
        );
        assert_eq!(credential_name(Path::new("/root/.smbcredentials_")), None);
        assert_eq!(credential_name(Path::new("/etc/samba/creds")), None);
    }

    #[test]
    fn share_name_is_last_component() {
        assert_eq!(share_name("/mnt/lxc_shares/main"), Some("main".to_string()));
        assert_eq!(share_name("/mnt/lxc_shares/main/"), Some("main".to_string()));
        assert_eq!(share_name("/"), None);
    }
}
