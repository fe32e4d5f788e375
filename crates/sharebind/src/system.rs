//! Privileged host operations the reconciler delegates to.
//!
//! [`SystemOps`] is the narrow seam between reconciliation logic and the
//! host: mounting, package management, service control and container
//! exec. [`HostSystem`] shells out to the standard Debian/Proxmox tools.

use std::fs;
use std::path::Path;
use std::process::Command;

use sharebind_common::{ShareError, ShareResult};

/// Host capabilities used while reconciling.
pub trait SystemOps {
    /// Create a directory and its parents; succeeds if it already exists.
    fn create_dir(&self, path: &Path) -> ShareResult<()>;

    /// Mount a target that has a static table entry.
    fn mount(&self, target: &str) -> ShareResult<()>;

    /// Whether a package is installed.
    fn package_installed(&self, name: &str) -> bool;

    /// Install a package.
    fn install_package(&self, name: &str) -> ShareResult<()>;

    /// Enable a service and reload (or restart) it.
    fn reload_service(&self, name: &str) -> ShareResult<()>;

    /// Trigger an on-demand mount by listing the target directory.
    fn trigger_mount(&self, target: &str) -> ShareResult<()>;

    /// Start the container if it is not running.
    fn ensure_container_running(&self, id: &str) -> ShareResult<()>;

    /// Run a command inside a container.
    fn exec_in_container(&self, id: &str, command: &[&str]) -> ShareResult<()>;
}

impl<T: SystemOps + ?Sized> SystemOps for &T {
    fn create_dir(&self, path: &Path) -> ShareResult<()> {
        (**self).create_dir(path)
    }

    fn mount(&self, target: &str) -> ShareResult<()> {
        (**self).mount(target)
    }

    fn package_installed(&self, name: &str) -> bool {
        (**self).package_installed(name)
    }

    fn install_package(&self, name: &str) -> ShareResult<()> {
        (**self).install_package(name)
    }

    fn reload_service(&self, name: &str) -> ShareResult<()> {
        (**self).reload_service(name)
    }

    fn trigger_mount(&self, target: &str) -> ShareResult<()> {
        (**self).trigger_mount(target)
    }

    fn ensure_container_running(&self, id: &str) -> ShareResult<()> {
        (**self).ensure_container_running(id)
    }

    fn exec_in_container(&self, id: &str, command: &[&str]) -> ShareResult<()> {
        (**self).exec_in_container(id, command)
    }
}

/// [`SystemOps`] backed by the host's command line tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSystem;

impl HostSystem {
    fn run(program: &str, args: &[&str]) -> ShareResult<()> {
        let command = format!("{program} {}", args.join(" "));
        tracing::debug!(command = %command, "Running");

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| ShareError::CommandFailed {
                command: command.clone(),
                status: e.to_string(),
            })?;

        if !status.success() {
            return Err(ShareError::CommandFailed {
                command,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

impl SystemOps for HostSystem {
    fn create_dir(&self, path: &Path) -> ShareResult<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn mount(&self, target: &str) -> ShareResult<()> {
        Self::run("mount", &[target])
    }

    fn package_installed(&self, name: &str) -> bool {
        Command::new("dpkg")
            .args(["-s", name])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn install_package(&self, name: &str) -> ShareResult<()> {
        Self::run("apt-get", &["install", "-y", name])
    }

    fn reload_service(&self, name: &str) -> ShareResult<()> {
        Self::run("systemctl", &["enable", name])?;
        Self::run("systemctl", &["reload-or-restart", name])
    }

    fn trigger_mount(&self, target: &str) -> ShareResult<()> {
        fs::read_dir(target)?;
        Ok(())
    }

    fn ensure_container_running(&self, id: &str) -> ShareResult<()> {
        let output = Command::new("pct")
            .args(["status", id])
            .output()
            .map_err(|e| ShareError::CommandFailed {
                command: format!("pct status {id}"),
                status: e.to_string(),
            })?;

        if String::from_utf8_lossy(&output.stdout).contains("running") {
            return Ok(());
        }

        tracing::info!(container = id, "Starting container");
        Self::run("pct", &["start", id])
    }

    fn exec_in_container(&self, id: &str, command: &[&str]) -> ShareResult<()> {
        let mut args = vec!["exec", id, "--"];
        args.extend_from_slice(command);
        Self::run("pct", &args)
    }
}
