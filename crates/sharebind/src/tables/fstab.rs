//! Host static mount table (`/etc/fstab`).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use sharebind_common::{AccessMode, HostMountEntry, Mechanism, ShareConfig, ShareResult};

use super::read_table;

/// Filesystem type of network share entries.
pub const SHARE_FSTYPE: &str = "cifs";

/// Repository over the share entries of the host mount table.
#[derive(Debug, Clone)]
pub struct FstabTable {
    path: PathBuf,
    config: ShareConfig,
}

impl FstabTable {
    /// Open the table at `path`. Nothing is read until queried.
    pub fn new(path: impl Into<PathBuf>, config: ShareConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All uncommented share entries. An unreadable table yields no entries.
    #[must_use]
    pub fn list_entries(&self) -> Vec<HostMountEntry> {
        read_table(&self.path)
            .map(|content| content.lines().filter_map(parse_line).collect())
            .unwrap_or_default()
    }

    /// Whether an entry with exactly this target exists.
    #[must_use]
    pub fn has_entry_for_target(&self, target: &str) -> bool {
        self.list_entries().iter().any(|entry| entry.target == target)
    }

    /// Render the table line for an entry.
    #[must_use]
    pub fn format_line(&self, entry: &HostMountEntry) -> String {
        let c = &self.config;
        format!(
            "{} {} {SHARE_FSTYPE} _netdev,x-systemd.automount,noatime,{},uid={},gid={},dir_mode={},file_mode={},credentials={},iocharset={},noperm 0 0",
            entry.source,
            entry.target,
            entry.mode.flag(),
            c.host_uid,
            c.host_gid,
            c.dir_mode,
            c.file_mode,
            entry.credentials.display(),
            c.charset,
        )
    }

    /// Append the entry unless an identical line is already present.
    ///
    /// Returns `true` if a line was written. Existing lines are never edited.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be opened for appending.
    pub fn append_entry(&self, entry: &HostMountEntry) -> ShareResult<bool> {
        let line = self.format_line(entry);
        let existing = read_table(&self.path).unwrap_or_default();

        if existing.lines().any(|l| l == line) {
            tracing::debug!(
                path = %self.path.display(),
                target = %entry.target,
                "Mount table line already present"
            );
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if !existing.is_empty() && !existing.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        writeln!(file, "{line}")?;

        tracing::info!(
            source = %entry.source,
            target = %entry.target,
            path = %self.path.display(),
            "Mount table entry appended"
        );
        Ok(true)
    }
}

/// Parse one mount table line into a share entry.
///
/// Comments, blank lines, short lines and other filesystem types yield `None`.
#[must_use]
pub fn parse_line(line: &str) -> Option<HostMountEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 || fields[2] != SHARE_FSTYPE {
        return None;
    }

    let options = fields[3];
    let credentials = options
        .split(',')
        .find_map(|opt| opt.strip_prefix("credentials="))
        .map(PathBuf::from)
        .unwrap_or_default();

    Some(HostMountEntry {
        source: fields[0].to_string(),
        target: fields[1].to_string(),
        mechanism: Mechanism::Static,
        mode: AccessMode::from_options(options),
        credentials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(target: &str) -> HostMountEntry {
        HostMountEntry {
            source: "//10.0.0.5/main".to_string(),
            target: target.to_string(),
            mechanism: Mechanism::Static,
            mode: AccessMode::ReadWrite,
            credentials: PathBuf::from("/root/.smbcredentials_main"),
        }
    }

    fn table() -> (tempfile::TempDir, FstabTable) {
        let dir = tempfile::tempdir().unwrap();
        let table = FstabTable::new(dir.path().join("fstab"), ShareConfig::default());
        (dir, table)
    }

    #[test]
    fn line_format() {
        let (_dir, table) = table();
        assert_eq!(
            table.format_line(&entry("/mnt/lxc_shares/main")),
            "//10.0.0.5/main /mnt/lxc_shares/main cifs _netdev,x-systemd.automount,noatime,rw,uid=100000,gid=110000,dir_mode=0770,file_mode=0770,credentials=/root/.smbcredentials_main,iocharset=utf8,noperm 0 0"
        );
    }

    #[test]
    fn parses_only_uncommented_share_lines() {
        let content = "\
UUID=abcd / ext4 defaults 0 1
# //10.0.0.9/old /mnt/old cifs credentials=/root/x 0 0
//10.0.0.5/media /mnt/lxc_shares/media cifs noatime,ro,credentials=/root/.smbcredentials_media 0 0
";
        let entries: Vec<_> = content.lines().filter_map(parse_line).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "/mnt/lxc_shares/media");
        assert_eq!(entries[0].mode, AccessMode::ReadOnly);
        assert_eq!(
            entries[0].credentials,
            PathBuf::from("/root/.smbcredentials_media")
        );
    }

    #[test]
    fn missing_table_is_empty() {
        let (_dir, table) = table();
        assert!(table.list_entries().is_empty());
        assert!(!table.has_entry_for_target("/mnt/lxc_shares/main"));
    }

    #[test]
    fn append_then_found() {
        let (_dir, table) = table();
        assert!(!table.has_entry_for_target("/mnt/lxc_shares/main"));
        assert!(table.append_entry(&entry("/mnt/lxc_shares/main")).unwrap());
        assert!(table.has_entry_for_target("/mnt/lxc_shares/main"));
    }

    #[test]
    fn append_is_textually_idempotent() {
        let (_dir, table) = table();
        assert!(table.append_entry(&entry("/mnt/lxc_shares/main")).unwrap());
        assert!(!table.append_entry(&entry("/mnt/lxc_shares/main")).unwrap());

        let content = fs::read_to_string(table.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn target_match_is_exact() {
        let (_dir, table) = table();
        table.append_entry(&entry("/mnt/lxc_shares/main")).unwrap();
        assert!(!table.has_entry_for_target("/mnt/lxc_shares/main/"));
    }

    #[test]
    fn append_preserves_unterminated_last_line() {
        let (_dir, table) = table();
        fs::write(table.path(), "UUID=abcd / ext4 defaults 0 1").unwrap();
        table.append_entry(&entry("/mnt/lxc_shares/main")).unwrap();

        let content = fs::read_to_string(table.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "UUID=abcd / ext4 defaults 0 1");
    }
}
