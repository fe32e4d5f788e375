//! Container bind-mount configuration (`mp<N>:` lines).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sharebind_common::{AccessMode, ShareError, ShareResult};

static MOUNT_POINT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^mp(\d+):\s*(.*)$").unwrap());

/// One bind declaration in a container configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerBindEntry {
    /// Mount point slot.
    pub index: u32,
    /// Host directory exposed to the container.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    /// Access mode of the bind.
    pub mode: AccessMode,
}

impl ContainerBindEntry {
    /// Index-independent part of the configuration line.
    #[must_use]
    pub fn body(&self) -> String {
        bind_body(&self.source, &self.target, self.mode)
    }

    /// Full configuration line.
    #[must_use]
    pub fn line(&self) -> String {
        format!("mp{}: {}", self.index, self.body())
    }
}

/// Repository over the bind lines of one container configuration file.
#[derive(Debug, Clone)]
pub struct ContainerBindTable {
    path: PathBuf,
}

impl ContainerBindTable {
    /// Open the configuration at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the configuration file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All bind lines in file order.
    #[must_use]
    pub fn list_binds(&self) -> Vec<ContainerBindEntry> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        content.lines().filter_map(parse_line).collect()
    }

    /// Next free slot: one past the numerically largest index, or 0.
    ///
    /// # Errors
    ///
    /// Returns [`ShareError::Config`] if the largest index is already `u32::MAX`.
    pub fn next_index(&self) -> ShareResult<u32> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Ok(0);
        };
        let Some(max) = content
            .lines()
            .filter_map(|line| MOUNT_POINT_LINE.captures(line))
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .max()
        else {
            return Ok(0);
        };

        max.checked_add(1).ok_or_else(|| ShareError::Config {
            message: format!(
                "no mount point slot left after mp{max} in {}",
                self.path.display()
            ),
        })
    }

    /// Index of an existing bind with the same source, target and mode.
    #[must_use]
    pub fn find_bind(&self, source: &str, target: &str, mode: AccessMode) -> Option<u32> {
        let body = bind_body(source, target, mode);
        self.list_binds()
            .into_iter()
            .find(|bind| bind.body() == body)
            .map(|bind| bind.index)
    }

    /// Append a bind line unless the exact line is already present.
    ///
    /// Returns the entry and whether a line was written.
    ///
    /// # Errors
    ///
    /// Returns [`ShareError::ConfigNotFound`] if the configuration file does not exist.
    pub fn append_bind(
        &self,
        index: u32,
        source: &str,
        target: &str,
        mode: AccessMode,
    ) -> ShareResult<(ContainerBindEntry, bool)> {
        if !self.path.is_file() {
            return Err(ShareError::ConfigNotFound {
                path: self.path.clone(),
            });
        }

        let entry = ContainerBindEntry {
            index,
            source: source.to_string(),
            target: target.to_string(),
            mode,
        };
        let line = entry.line();

        let existing = fs::read_to_string(&self.path)?;
        if existing.lines().any(|l| l == line) {
            tracing::debug!(path = %self.path.display(), index, "Bind line already present");
            return Ok((entry, false));
        }

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        if !existing.is_empty() && !existing.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        writeln!(file, "{line}")?;

        tracing::info!(path = %self.path.display(), index, line = %line, "Bind appended");
        Ok((entry, true))
    }
}

fn bind_body(source: &str, target: &str, mode: AccessMode) -> String {
    let ro = if mode.is_read_only() { ",ro=1" } else { "" };
    format!("{source},mp={target}{ro}")
}

fn parse_line(line: &str) -> Option<ContainerBindEntry> {
    let caps = MOUNT_POINT_LINE.captures(line)?;
    let index = caps[1].parse().ok()?;

    let mut parts = caps[2].split(',');
    let source = parts.next()?.to_string();
    let mut target = None;
    let mut mode = AccessMode::ReadWrite;
    for part in parts {
        if let Some(value) = part.strip_prefix("mp=") {
            target = Some(value.to_string());
        } else if part == "ro=1" {
            mode = AccessMode::ReadOnly;
        }
    }

    Some(ContainerBindEntry {
        index,
        source,
        target: target?,
        mode,
    })
}
