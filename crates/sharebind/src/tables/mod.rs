//! Text tables managed as small record repositories.
//!
//! Each table keeps its line format private to its module:
//! - [`fstab`]: host static mount table
//! - [`autofs`]: on-demand master/map file pairs
//! - [`lxc`]: container bind-mount configuration

pub mod autofs;
pub mod fstab;
pub mod lxc;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use sharebind_common::ShareError;

pub use autofs::AutofsTable;
pub use fstab::FstabTable;
pub use lxc::ContainerBindTable;

/// Read a table file. Missing or unreadable tables yield `None`, never an error.
pub(crate) fn read_table(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Table does not exist yet");
            None
        }
        Err(e) => {
            let err = ShareError::TableUnreadable {
                path: path.to_path_buf(),
            };
            tracing::warn!(error = %e, "{err}, treating as empty");
            None
        }
    }
}
