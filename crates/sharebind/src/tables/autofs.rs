//! On-demand mount definitions: autofs master include + map file pairs.
//!
//! Every share owns one master include file in the master directory that
//! points at one direct map file. Both files are rewritten whole on every
//! write.

use std::fs;
use std::path::PathBuf;

use sharebind_common::paths::{AUTOFS_MASTER_EXT, AUTOFS_PREFIX};
use sharebind_common::{
    AccessMode, HostMountEntry, Mechanism, ShareConfig, SharePaths, ShareResult,
};

use super::fstab::SHARE_FSTYPE;
use super::read_table;

/// Mount point namespace of direct maps.
pub const DIRECT_MAP_ROOT: &str = "/-";

/// Repository over the on-demand definitions written by sharebind.
#[derive(Debug, Clone)]
pub struct AutofsTable {
    paths: SharePaths,
    config: ShareConfig,
}

/// Files written for one on-demand definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutofsFiles {
    /// Master include file.
    pub master: PathBuf,
    /// Map file referenced by the master include.
    pub map: PathBuf,
}

impl AutofsTable {
    /// Create a table over the configured master and map directories.
    #[must_use]
    pub fn new(paths: SharePaths, config: ShareConfig) -> Self {
        Self { paths, config }
    }

    /// All definitions reachable from master include files matching the naming pattern.
    #[must_use]
    pub fn list_entries(&self) -> Vec<HostMountEntry> {
        let mut masters = self.master_files();
        masters.sort();

        let mut entries = Vec::new();
        for master in masters {
            let Some(content) = read_table(&master) else {
                continue;
            };
            for map in content.lines().filter_map(parse_master_line) {
                let Some(map_content) = read_table(&map) else {
                    continue;
                };
                entries.extend(map_content.lines().filter_map(parse_map_line));
            }
        }

        tracing::debug!(count = entries.len(), "Loaded on-demand definitions");
        entries
    }

    /// Whether a definition with exactly this target exists.
    #[must_use]
    pub fn has_entry_for_target(&self, target: &str) -> bool {
        self.list_entries().iter().any(|entry| entry.target == target)
    }

    /// Render the master include line for a share name.
    #[must_use]
    pub fn format_master_line(&self, name: &str) -> String {
        format!(
            "{DIRECT_MAP_ROOT} {} --timeout={} --ghost",
            self.paths.autofs_map(name).display(),
            self.config.autofs_timeout
        )
    }

    /// Render the map line for an entry.
    #[must_use]
    pub fn format_map_line(&self, entry: &HostMountEntry) -> String {
        let c = &self.config;
        format!(
            "{} -fstype={SHARE_FSTYPE},credentials={},uid={},gid={},dir_mode={},file_mode={},iocharset={},noperm,{} :{}",
            entry.target,
            entry.credentials.display(),
            c.host_uid,
            c.host_gid,
            c.dir_mode,
            c.file_mode,
            c.charset,
            entry.mode.flag(),
            entry.source,
        )
    }

    /// Write the master include and map file for `name`, replacing previous contents.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn write_entry(&self, name: &str, entry: &HostMountEntry) -> ShareResult<AutofsFiles> {
        let files = AutofsFiles {
            master: self.paths.autofs_master(name),
            map: self.paths.autofs_map(name),
        };

        for (path, line) in [
            (&files.map, self.format_map_line(entry)),
            (&files.master, self.format_master_line(name)),
        ] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, format!("{line}\n"))?;
        }

        tracing::info!(
            name,
            master = %files.master.display(),
            map = %files.map.display(),
            "On-demand definition written"
        );
        Ok(files)
    }

    fn master_files(&self) -> Vec<PathBuf> {
        let Ok(dir) = fs::read_dir(&self.paths.autofs_master_dir) else {
            return Vec::new();
        };

        dir.filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                name.starts_with(AUTOFS_PREFIX)
                    && path.extension().and_then(|e| e.to_str()) == Some(AUTOFS_MASTER_EXT)
            })
            .collect()
    }
}

/// Map file path referenced by a master include line.
fn parse_master_line(line: &str) -> Option<PathBuf> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    line.split_whitespace().nth(1).map(PathBuf::from)
}

/// Parse a `target options :source` map line.
fn parse_map_line(line: &str) -> Option<HostMountEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut fields = line.split_whitespace();
    let target = fields.next()?;
    let options = fields.next()?.trim_start_matches('-');
    let source = fields.next()?;

    let credentials = options
        .split(',')
        .find_map(|opt| opt.strip_prefix("credentials="))
        .map(PathBuf::from)
        .unwrap_or_default();

    Some(HostMountEntry {
        source: source.strip_prefix(':').unwrap_or(source).to_string(),
        target: target.to_string(),
        mechanism: Mechanism::OnDemand,
        mode: AccessMode::from_options(options),
        credentials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, SharePaths, AutofsTable) {
        let dir = tempfile::tempdir().unwrap();
        let paths = SharePaths::with_root(dir.path());
        let table = AutofsTable::new(paths.clone(), ShareConfig::default());
        (dir, paths, table)
    }

    fn entry(paths: &SharePaths, mode: AccessMode) -> HostMountEntry {
        HostMountEntry {
            source: "//nas/media".to_string(),
            target: "/mnt/lxc_shares/media".to_string(),
            mechanism: Mechanism::OnDemand,
            mode,
            credentials: paths.credential_file("media"),
        }
    }

    #[test]
    fn write_then_list() {
        let (_dir, paths, table) = setup();
        let written = entry(&paths, AccessMode::ReadOnly);
        let files = table.write_entry("media", &written).unwrap();

        let master = fs::read_to_string(&files.master).unwrap();
        assert_eq!(
            master,
            format!("/- {} --timeout=60 --ghost\n", files.map.display())
        );

        let map = fs::read_to_string(&files.map).unwrap();
        assert!(map.starts_with("/mnt/lxc_shares/media -fstype=cifs,credentials="));
        assert!(map.contains(",uid=100000,gid=110000,dir_mode=0770,file_mode=0770,iocharset=utf8,noperm,ro :"));
        assert!(map.trim_end().ends_with(" ://nas/media"));

        assert_eq!(table.list_entries(), vec![written]);
        assert!(table.has_entry_for_target("/mnt/lxc_shares/media"));
    }

    #[test]
    fn write_overwrites() {
        let (_dir, paths, table) = setup();
        table
            .write_entry("media", &entry(&paths, AccessMode::ReadOnly))
            .unwrap();
        let files = table
            .write_entry("media", &entry(&paths, AccessMode::ReadWrite))
            .unwrap();

        let map = fs::read_to_string(files.map).unwrap();
        assert_eq!(map.lines().count(), 1);
        assert_eq!(table.list_entries()[0].mode, AccessMode::ReadWrite);
    }

    #[test]
    fn ignores_foreign_master_files() {
        let (_dir, paths, table) = setup();
        fs::create_dir_all(&paths.autofs_master_dir).unwrap();
        let foreign_map = paths.autofs_map_dir.join("auto.home");
        fs::write(&foreign_map, "/home/x -fstype=nfs :server:/x\n").unwrap();
        fs::write(
            paths.autofs_master_dir.join("home.autofs"),
            format!("/- {}\n", foreign_map.display()),
        )
        .unwrap();

        assert!(table.list_entries().is_empty());
    }

    #[test]
    fn missing_directory_is_empty() {
        let (_dir, _paths, table) = setup();
        assert!(table.list_entries().is_empty());
    }

    #[test]
    fn parses_map_line_without_mode_as_read_write() {
        let entry =
            parse_map_line("/mnt/x -fstype=cifs,credentials=/root/.smbcredentials_x :/srv/x")
                .unwrap();
        assert_eq!(entry.source, "/srv/x");
        assert_eq!(entry.mode, AccessMode::ReadWrite);
        assert_eq!(entry.credentials, PathBuf::from("/root/.smbcredentials_x"));
    }
}
