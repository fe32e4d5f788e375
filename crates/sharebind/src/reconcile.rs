//! Mount reconciliation.
//!
//! One invocation walks `CheckHostTarget → CreateHostMount | ReuseHostMount →
//! CreateContainerBind | Done`. Host-side problems that leave the stores
//! consistent (unreadable tables, a missing on-demand helper, a failed
//! mount) are absorbed into the report as warnings. Container-side
//! problems abort the invocation.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sharebind_common::paths::share_name;
use sharebind_common::{
    AccessMode, Credentials, HostMountEntry, Mechanism, ShareConfig, ShareError, SharePaths,
    ShareResult,
};

use crate::credentials::CredentialStore;
use crate::system::SystemOps;
use crate::tables::lxc::ContainerBindEntry;
use crate::tables::{AutofsTable, ContainerBindTable, FstabTable};

/// Where the credential file of a new host mount comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Write these credentials before recording the mount.
    Provided(Credentials),
    /// The credential file is already in place.
    Existing,
}

/// Host mount to create when the target has no entry yet.
#[derive(Debug, Clone)]
pub struct HostMountSpec {
    /// Network share address.
    pub source: String,
    /// Credential name; defaults to the target's last path component.
    pub name: Option<String>,
    /// Credential file contents.
    pub credentials: CredentialSource,
    /// Preferred mechanism.
    pub mechanism: Mechanism,
    /// Access mode of the host mount.
    pub mode: AccessMode,
}

/// Container bind to add under the host target.
#[derive(Debug, Clone)]
pub struct BindSpec {
    /// Container identifier.
    pub container: String,
    /// Directory below the host target to expose.
    pub sub_path: String,
    /// Mount point inside the container.
    pub container_path: String,
    /// Access mode of the bind.
    pub mode: AccessMode,
}

/// A complete reconciliation request.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    /// Host mount target path.
    pub target: String,
    /// Host mount to create, or `None` to accept `target` as already mounted.
    pub host: Option<HostMountSpec>,
    /// Optional container bind.
    pub bind: Option<BindSpec>,
}

/// Whether the mount is live after configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Activation {
    /// The mount was activated.
    Mounted,
    /// Configuration is recorded but activation failed.
    Failed {
        /// Failure description.
        reason: String,
    },
}

/// Result of creating a host mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostMountReport {
    /// Mechanism actually used.
    pub mechanism: Mechanism,
    /// Whether the on-demand mechanism was requested but unavailable.
    pub fell_back: bool,
    /// Credential file referenced by the entry.
    pub credentials: PathBuf,
    /// Activation outcome.
    pub activation: Activation,
}

/// What happened on the host side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HostOutcome {
    /// A new host mount was recorded.
    Created(HostMountReport),
    /// An entry for the target already existed.
    Existing,
    /// Creation was skipped; the target was accepted as given.
    Unverified,
}

/// What happened on the container side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindOutcome {
    /// The bind entry, new or reused.
    pub entry: ContainerBindEntry,
    /// Whether a line was appended.
    pub appended: bool,
    /// Whether the access group is known to exist in the container.
    pub group_ready: bool,
}

/// Summary of one reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Host mount target.
    pub target: String,
    /// Host side outcome.
    pub host: HostOutcome,
    /// Container side outcome.
    pub bind: Option<BindOutcome>,
    /// Absorbed problems the operator should look at.
    pub warnings: Vec<String>,
}

/// Drives host and container stores towards a requested mount.
pub struct MountReconciler<S> {
    paths: SharePaths,
    config: ShareConfig,
    fstab: FstabTable,
    autofs: AutofsTable,
    credentials: CredentialStore,
    system: S,
}

impl<S: SystemOps> MountReconciler<S> {
    /// Create a reconciler over the given stores and host capabilities.
    pub fn new(paths: SharePaths, config: ShareConfig, system: S) -> Self {
        Self {
            fstab: FstabTable::new(paths.fstab.clone(), config.clone()),
            autofs: AutofsTable::new(paths.clone(), config.clone()),
            credentials: CredentialStore::new(paths.clone()),
            paths,
            config,
            system,
        }
    }

    /// Static mount table.
    pub const fn fstab(&self) -> &FstabTable {
        &self.fstab
    }

    /// On-demand mount table.
    pub const fn autofs(&self) -> &AutofsTable {
        &self.autofs
    }

    /// Credential store.
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Host capabilities.
    pub const fn system(&self) -> &S {
        &self.system
    }

    /// Whether either table holds an entry for exactly this target.
    #[must_use]
    pub fn has_entry_for_target(&self, target: &str) -> bool {
        self.fstab.has_entry_for_target(target) || self.autofs.has_entry_for_target(target)
    }

    /// Run a full reconciliation.
    ///
    /// # Errors
    ///
    /// Returns an error for missing inputs, credential or table write
    /// failures, a missing container config, or an unreachable container.
    pub fn reconcile(&self, request: &ReconcileRequest) -> ShareResult<ReconcileReport> {
        if request.target.is_empty() {
            return Err(ShareError::MissingRequiredInput {
                field: "target".to_string(),
            });
        }

        let mut warnings = Vec::new();
        let host = if self.has_entry_for_target(&request.target) {
            tracing::info!(mount = %request.target, "Host mount already configured, reusing");
            HostOutcome::Existing
        } else if let Some(spec) = &request.host {
            HostOutcome::Created(self.create_host_mount(&request.target, spec, &mut warnings)?)
        } else {
            tracing::info!(mount = %request.target, "Using caller-supplied host path");
            HostOutcome::Unverified
        };

        let bind = request
            .bind
            .as_ref()
            .map(|spec| self.create_container_bind(&request.target, spec, &mut warnings))
            .transpose()?;

        Ok(ReconcileReport {
            target: request.target.clone(),
            host,
            bind,
            warnings,
        })
    }

    /// Record a new host mount without checking for an existing entry.
    ///
    /// Writes the credential file first, then the chosen table. An
    /// unavailable on-demand helper falls back to the static table.
    ///
    /// # Errors
    ///
    /// Returns an error if inputs are missing or a file cannot be written.
    pub fn create_host_mount(
        &self,
        target: &str,
        spec: &HostMountSpec,
        warnings: &mut Vec<String>,
    ) -> ShareResult<HostMountReport> {
        if spec.source.is_empty() {
            return Err(ShareError::MissingRequiredInput {
                field: "source".to_string(),
            });
        }
        let name = spec
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| share_name(target))
            .ok_or_else(|| ShareError::MissingRequiredInput {
                field: "target".to_string(),
            })?;

        self.system.create_dir(Path::new(target))?;

        let credentials = match &spec.credentials {
            CredentialSource::Provided(creds) => self.credentials.write(&name, creds)?,
            CredentialSource::Existing => self.credentials.path_for(&name),
        };

        let entry = HostMountEntry {
            source: spec.source.clone(),
            target: target.to_string(),
            mechanism: spec.mechanism,
            mode: spec.mode,
            credentials: credentials.clone(),
        };

        let mut fell_back = false;
        if spec.mechanism == Mechanism::OnDemand {
            match self.ensure_on_demand_helper() {
                Ok(()) => {
                    let activation = self.write_on_demand(&name, &entry, warnings)?;
                    return Ok(HostMountReport {
                        mechanism: Mechanism::OnDemand,
                        fell_back,
                        credentials,
                        activation,
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Falling back to static mount table");
                    warnings.push(format!("{err}; used fstab instead"));
                    fell_back = true;
                }
            }
        }

        let entry = HostMountEntry {
            mechanism: Mechanism::Static,
            ..entry
        };
        self.fstab.append_entry(&entry)?;

        let activation = match self.system.mount(target) {
            Ok(()) => Activation::Mounted,
            Err(e) => Self::activation_failed(target, &e, warnings),
        };

        Ok(HostMountReport {
            mechanism: Mechanism::Static,
            fell_back,
            credentials,
            activation,
        })
    }

    fn ensure_on_demand_helper(&self) -> ShareResult<()> {
        let package = &self.config.autofs_package;
        if self.system.package_installed(package) {
            return Ok(());
        }

        tracing::info!(package = %package, "Installing on-demand remount helper");
        self.system
            .install_package(package)
            .map_err(|e| ShareError::MechanismUnavailable {
                mechanism: Mechanism::OnDemand.to_string(),
                reason: e.to_string(),
            })
    }

    fn write_on_demand(
        &self,
        name: &str,
        entry: &HostMountEntry,
        warnings: &mut Vec<String>,
    ) -> ShareResult<Activation> {
        self.autofs.write_entry(name, entry)?;

        let activated = self
            .system
            .reload_service(&self.config.autofs_service)
            .and_then(|()| self.system.trigger_mount(&entry.target));
        Ok(match activated {
            Ok(()) => Activation::Mounted,
            Err(e) => Self::activation_failed(&entry.target, &e, warnings),
        })
    }

    fn activation_failed(
        target: &str,
        cause: &ShareError,
        warnings: &mut Vec<String>,
    ) -> Activation {
        let err = ShareError::MountActivationFailed {
            target: target.to_string(),
            reason: cause.to_string(),
        };
        tracing::warn!("{err}; entry kept for a later mount");
        warnings.push(err.to_string());
        Activation::Failed {
            reason: cause.to_string(),
        }
    }

    fn create_container_bind(
        &self,
        target: &str,
        spec: &BindSpec,
        warnings: &mut Vec<String>,
    ) -> ShareResult<BindOutcome> {
        for (field, value) in [
            ("container", &spec.container),
            ("container_path", &spec.container_path),
        ] {
            if value.is_empty() {
                return Err(ShareError::MissingRequiredInput {
                    field: field.to_string(),
                });
            }
        }

        let source = bind_source(target, &spec.sub_path);
        self.system.create_dir(Path::new(&source))?;

        let table = ContainerBindTable::new(self.paths.container_config(&spec.container));
        let (entry, appended) =
            match table.find_bind(&source, &spec.container_path, spec.mode) {
                Some(index) => {
                    tracing::info!(container = %spec.container, index, "Bind already configured");
                    let entry = ContainerBindEntry {
                        index,
                        source,
                        target: spec.container_path.clone(),
                        mode: spec.mode,
                    };
                    (entry, false)
                }
                None => {
                    let index = table.next_index()?;
                    table.append_bind(index, &source, &spec.container_path, spec.mode)?
                }
            };

        let id = &spec.container;
        let mkdir_remedy = format!(
            "pct start {id} && pct exec {id} -- mkdir -p {}",
            spec.container_path
        );
        self.system
            .ensure_container_running(id)
            .and_then(|()| {
                self.system
                    .exec_in_container(id, &["mkdir", "-p", &spec.container_path])
            })
            .map_err(|e| ShareError::ContainerUnreachable {
                container: id.clone(),
                reason: e.to_string(),
                remediation: mkdir_remedy,
            })?;

        let group_ready = self.ensure_access_group(id, warnings);

        Ok(BindOutcome {
            entry,
            appended,
            group_ready,
        })
    }

    fn ensure_access_group(&self, id: &str, warnings: &mut Vec<String>) -> bool {
        let group_cmd = format!(
            "getent group {name} >/dev/null || groupadd -g {gid} {name}",
            name = self.config.group_name,
            gid = self.config.container_gid,
        );

        match self.system.exec_in_container(id, &["sh", "-c", &group_cmd]) {
            Ok(()) => true,
            Err(e) => {
                let err = ShareError::ContainerUnreachable {
                    container: id.to_string(),
                    reason: e.to_string(),
                    remediation: format!("pct exec {id} -- sh -c '{group_cmd}'"),
                };
                tracing::warn!("{err}");
                warnings.push(err.to_string());
                false
            }
        }
    }
}

/// Host directory exposed by a bind: the target joined with the sub-path.
///
/// A leading `./` or `/` on the sub-path is dropped; an empty sub-path or `.`
/// means the target itself.
#[must_use]
pub fn bind_source(target: &str, sub_path: &str) -> String {
    let base = target.trim_end_matches('/');
    let sub = sub_path.strip_prefix("./").unwrap_or(sub_path);
    let sub = sub.trim_start_matches('/');
    if sub.is_empty() || sub == "." {
        base.to_string()
    } else {
        format!("{base}/{sub}")
    }
}
