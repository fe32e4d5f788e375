//! Export/import of host mount definitions between hosts.
//!
//! ```text
//! BEGIN_EXPORT
//! BEGIN
//! method=fstab
//! nas_share=//10.0.0.5/main
//! host_mount=/mnt/lxc_shares/main
//! cred_name=main
//! host_mode=rw
//! cred_b64=dXNlcm5hbWU9...
//! END
//! END_EXPORT
//! ```
//!
//! Import restores host mounts only; container binds are not carried.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use sharebind_common::paths::{credential_name, share_name};
use sharebind_common::{AccessMode, Credentials, HostMountEntry, Mechanism, ShareResult};

use crate::credentials::{self, CredentialStore};
use crate::reconcile::{CredentialSource, HostMountReport, HostMountSpec, MountReconciler};
use crate::system::SystemOps;

/// Start of a bundle.
pub const BEGIN_EXPORT: &str = "BEGIN_EXPORT";
/// End of a bundle.
pub const END_EXPORT: &str = "END_EXPORT";
/// Start of one block.
pub const BEGIN_BLOCK: &str = "BEGIN";
/// End of one block.
pub const END_BLOCK: &str = "END";
/// Terminator of interactive import input.
pub const END_IMPORT: &str = "END_IMPORT";

/// One exported host mount definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBlock {
    /// Mechanism the mount was recorded with.
    pub method: Mechanism,
    /// Network share address.
    pub source: String,
    /// Host mount target.
    pub target: String,
    /// Credential name.
    pub cred_name: String,
    /// Host access mode.
    pub mode: AccessMode,
    /// Base64 credential file, absent if it was unreadable at export time.
    pub cred_blob: Option<String>,
}

/// A sequence of export blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportBundle {
    /// Blocks in table order: static entries first, then on-demand.
    pub blocks: Vec<ExportBlock>,
}

impl fmt::Display for ExportBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{BEGIN_EXPORT}")?;
        for block in &self.blocks {
            writeln!(f, "{BEGIN_BLOCK}")?;
            writeln!(f, "method={}", block.method)?;
            writeln!(f, "nas_share={}", block.source)?;
            writeln!(f, "host_mount={}", block.target)?;
            writeln!(f, "cred_name={}", block.cred_name)?;
            writeln!(f, "host_mode={}", block.mode)?;
            if let Some(blob) = &block.cred_blob {
                writeln!(f, "cred_b64={blob}")?;
            }
            writeln!(f, "{END_BLOCK}")?;
        }
        writeln!(f, "{END_EXPORT}")
    }
}

/// Collect every sharebind-managed host mount with its credentials.
#[must_use]
pub fn export<S: SystemOps>(reconciler: &MountReconciler<S>) -> ExportBundle {
    let store = reconciler.credentials();

    let managed_static = reconciler
        .fstab()
        .list_entries()
        .into_iter()
        .filter(|entry| credential_name(&entry.credentials).is_some());
    let on_demand = reconciler.autofs().list_entries();

    let blocks: Vec<_> = managed_static
        .chain(on_demand)
        .map(|entry| export_block(store, entry))
        .collect();

    tracing::info!(count = blocks.len(), "Exported host mounts");
    ExportBundle { blocks }
}

fn export_block(store: &CredentialStore, entry: HostMountEntry) -> ExportBlock {
    let cred_name = credential_name(&entry.credentials)
        .or_else(|| share_name(&entry.target))
        .unwrap_or_default();

    let cred_blob = match store.read_bytes(&entry.credentials) {
        Ok(bytes) => Some(credentials::encode(&bytes)),
        Err(e) => {
            tracing::warn!(
                path = %entry.credentials.display(),
                error = %e,
                "Credential file unreadable, exporting without it"
            );
            None
        }
    };

    ExportBlock {
        method: entry.mechanism,
        source: entry.source,
        target: entry.target,
        cred_name,
        mode: entry.mode,
        cred_blob,
    }
}

#[derive(Default)]
struct PartialBlock {
    method: Option<String>,
    source: String,
    target: String,
    cred_name: String,
    mode: Option<String>,
    cred_blob: Option<String>,
}

impl PartialBlock {
    fn set(&mut self, key: &str, value: &str) {
        let value = value.to_string();
        match key {
            "method" => self.method = Some(value),
            "nas_share" => self.source = value,
            "host_mount" => self.target = value,
            "cred_name" => self.cred_name = value,
            "host_mode" => self.mode = Some(value),
            "cred_b64" => self.cred_blob = Some(value).filter(|v| !v.is_empty()),
            other => tracing::debug!(key = other, "Ignoring unknown export field"),
        }
    }

    fn finish(self) -> Option<ExportBlock> {
        if self.source.is_empty() || self.target.is_empty() {
            tracing::warn!(
                source = %self.source,
                mount = %self.target,
                "Dropping export block without nas_share or host_mount"
            );
            return None;
        }

        let method = self
            .method
            .and_then(|m| m.parse().ok())
            .unwrap_or_default();
        let mode = self.mode.and_then(|m| m.parse().ok()).unwrap_or_default();
        let cred_name = if self.cred_name.is_empty() {
            share_name(&self.target).unwrap_or_default()
        } else {
            self.cred_name
        };

        Some(ExportBlock {
            method,
            source: self.source,
            target: self.target,
            cred_name,
            mode,
            cred_blob: self.cred_blob,
        })
    }
}

/// Parse bundle text, stopping at an `END_IMPORT` line.
///
/// Blocks lacking a share address or host target are dropped; the rest
/// of the bundle is still parsed.
#[must_use]
pub fn parse_bundle(text: &str) -> Vec<ExportBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<PartialBlock> = None;

    for line in text.lines() {
        let line = line.trim();
        match line {
            END_IMPORT => break,
            BEGIN_BLOCK => current = Some(PartialBlock::default()),
            END_BLOCK => {
                if let Some(block) = current.take().and_then(PartialBlock::finish) {
                    blocks.push(block);
                }
            }
            _ => {
                if let (Some(block), Some((key, value))) = (current.as_mut(), line.split_once('='))
                {
                    block.set(key.trim(), value.trim());
                }
            }
        }
    }

    blocks
}

/// What happened to one imported block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportStatus {
    /// A new host mount was recorded.
    Restored(HostMountReport),
    /// The target already had an entry; nothing was written.
    Existing,
    /// The block could not be restored.
    Failed {
        /// Error that stopped this block.
        reason: String,
    },
}

/// Outcome of importing one block.
#[derive(Debug, Clone, Serialize)]
pub struct ImportedMount {
    /// Host mount target.
    pub target: String,
    /// What happened.
    #[serde(flatten)]
    pub status: ImportStatus,
}

impl ImportedMount {
    /// Whether the block failed.
    #[must_use]
    pub const fn failed(&self) -> bool {
        matches!(self.status, ImportStatus::Failed { .. })
    }
}

/// Summary of an import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    /// One entry per well-formed block.
    pub mounts: Vec<ImportedMount>,
    /// Absorbed problems the operator should look at.
    pub warnings: Vec<String>,
}

/// Restore the host mounts described by `text`.
///
/// Targets that already have a host entry are left untouched, credentials
/// included. Blocks without a credential blob (or with an undecodable one)
/// get credentials from `prompt`. A failing block is recorded in the report
/// and does not stop the remaining blocks.
pub fn import<S, F>(reconciler: &MountReconciler<S>, text: &str, mut prompt: F) -> ImportReport
where
    S: SystemOps,
    F: FnMut(&ExportBlock) -> ShareResult<Credentials>,
{
    let mut report = ImportReport::default();

    for block in parse_bundle(text) {
        let status = if reconciler.has_entry_for_target(&block.target) {
            tracing::info!(mount = %block.target, "Host mount already configured, skipping");
            ImportStatus::Existing
        } else {
            match import_block(reconciler, &block, &mut prompt, &mut report.warnings) {
                Ok(host) => ImportStatus::Restored(host),
                Err(e) => {
                    tracing::warn!(mount = %block.target, error = %e, "Import of block failed");
                    ImportStatus::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };
        report.mounts.push(ImportedMount {
            target: block.target,
            status,
        });
    }

    tracing::info!(count = report.mounts.len(), "Import finished");
    report
}

fn import_block<S, F>(
    reconciler: &MountReconciler<S>,
    block: &ExportBlock,
    prompt: &mut F,
    warnings: &mut Vec<String>,
) -> ShareResult<HostMountReport>
where
    S: SystemOps,
    F: FnMut(&ExportBlock) -> ShareResult<Credentials>,
{
    reconciler.system().create_dir(Path::new(&block.target))?;

    let store = reconciler.credentials();
    let cred_path = store.path_for(&block.cred_name);
    let decoded = block.cred_blob.as_deref().map(credentials::decode);

    match decoded {
        Some(Ok(bytes)) => store.write_bytes(&cred_path, &bytes)?,
        Some(Err(e)) => {
            warnings.push(format!("{}: {e}, asked for credentials", block.target));
            store.write(&block.cred_name, &prompt(block)?)?;
        }
        None => {
            store.write(&block.cred_name, &prompt(block)?)?;
        }
    }

    let spec = HostMountSpec {
        source: block.source.clone(),
        name: Some(block.cred_name.clone()),
        credentials: CredentialSource::Existing,
        mechanism: block.method,
        mode: block.mode,
    };
    reconciler.create_host_mount(&block.target, &spec, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(method: Mechanism, blob: Option<&str>) -> ExportBlock {
        ExportBlock {
            method,
            source: "//10.0.0.5/main".to_string(),
            target: "/mnt/lxc_shares/main".to_string(),
            cred_name: "main".to_string(),
            mode: AccessMode::ReadWrite,
            cred_blob: blob.map(str::to_string),
        }
    }

    #[test]
    fn renders_markers_and_fields() {
        let bundle = ExportBundle {
            blocks: vec![block(Mechanism::Static, Some("dXNlcg=="))],
        };
        assert_eq!(
            bundle.to_string(),
            "BEGIN_EXPORT\nBEGIN\nmethod=fstab\nnas_share=//10.0.0.5/main\nhost_mount=/mnt/lxc_shares/main\ncred_name=main\nhost_mode=rw\ncred_b64=dXNlcg==\nEND\nEND_EXPORT\n"
        );
    }

    #[test]
    fn omits_missing_blob() {
        let bundle = ExportBundle {
            blocks: vec![block(Mechanism::OnDemand, None)],
        };
        let text = bundle.to_string();
        assert!(text.contains("method=autofs\n"));
        assert!(!text.contains("cred_b64"));
    }

    #[test]
    fn parse_reads_rendered_bundle() {
        let bundle = ExportBundle {
            blocks: vec![
                block(Mechanism::Static, Some("dXNlcg==")),
                block(Mechanism::OnDemand, None),
            ],
        };
        assert_eq!(parse_bundle(&bundle.to_string()), bundle.blocks);
    }

    #[test]
    fn drops_malformed_blocks_and_keeps_going() {
        let text = "\
BEGIN_EXPORT
BEGIN
method=fstab
host_mount=/mnt/lxc_shares/orphan
END
BEGIN
nas_share=//nas/x
END
BEGIN
method=autofs
nas_share=//nas/media
host_mount=/mnt/lxc_shares/media
host_mode=ro
END
END_EXPORT
";
        let blocks = parse_bundle(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].target, "/mnt/lxc_shares/media");
        assert_eq!(blocks[0].method, Mechanism::OnDemand);
        assert_eq!(blocks[0].mode, AccessMode::ReadOnly);
        assert_eq!(blocks[0].cred_name, "media");
    }

    #[test]
    fn stops_at_end_import() {
        let text = "\
BEGIN
nas_share=//nas/a
host_mount=/mnt/a
END
END_IMPORT
BEGIN
nas_share=//nas/b
host_mount=/mnt/b
END
";
        let blocks = parse_bundle(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].source, "//nas/a");
    }

    #[test]
    fn ignores_fields_outside_blocks_and_crlf() {
        let text = "nas_share=//nas/stray\r\nBEGIN\r\nnas_share=//nas/a\r\nhost_mount=/mnt/a\r\nEND\r\n";
        let blocks = parse_bundle(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].source, "//nas/a");
        assert_eq!(blocks[0].target, "/mnt/a");
    }

    #[test]
    fn imported_mount_json_is_flat() {
        let existing = ImportedMount {
            target: "/mnt/a".to_string(),
            status: ImportStatus::Existing,
        };
        assert_eq!(
            serde_json::to_value(&existing).unwrap(),
            serde_json::json!({ "target": "/mnt/a", "status": "existing" })
        );

        let failed = ImportedMount {
            target: "/mnt/b".to_string(),
            status: ImportStatus::Failed {
                reason: "no credentials".to_string(),
            },
        };
        assert!(failed.failed());
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({
                "target": "/mnt/b",
                "status": "failed",
                "reason": "no credentials",
            })
        );
    }

    #[test]
    fn blob_padding_survives_parsing() {
        let text = "BEGIN\nnas_share=//nas/a\nhost_mount=/mnt/a\ncred_b64=YQ==\nEND\n";
        assert_eq!(parse_bundle(text)[0].cred_blob.as_deref(), Some("YQ=="));
    }
}
