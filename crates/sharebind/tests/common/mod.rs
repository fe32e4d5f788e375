//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::Path;

use sharebind::reconcile::MountReconciler;
use sharebind::system::SystemOps;
use sharebind_common::{ShareConfig, ShareError, SharePaths, ShareResult};
use tempfile::TempDir;

/// Recording [`SystemOps`] that never touches the host.
#[derive(Default)]
pub struct FakeSystem {
    pub autofs_installed: Cell<bool>,
    pub autofs_installable: bool,
    pub mount_fails: bool,
    pub container_down: bool,
    pub group_fails: bool,
    pub calls: RefCell<Vec<String>>,
}

impl FakeSystem {
    pub fn with_autofs() -> Self {
        Self {
            autofs_installed: Cell::new(true),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(prefix))
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn fail(command: &str) -> ShareError {
        ShareError::CommandFailed {
            command: command.to_string(),
            status: "exit status: 1".to_string(),
        }
    }
}

impl SystemOps for FakeSystem {
    fn create_dir(&self, path: &Path) -> ShareResult<()> {
        self.record(format!("mkdir {}", path.display()));
        Ok(())
    }

    fn mount(&self, target: &str) -> ShareResult<()> {
        self.record(format!("mount {target}"));
        if self.mount_fails {
            return Err(Self::fail("mount"));
        }
        Ok(())
    }

    fn package_installed(&self, _name: &str) -> bool {
        self.autofs_installed.get()
    }

    fn install_package(&self, name: &str) -> ShareResult<()> {
        self.record(format!("install {name}"));
        if !self.autofs_installable {
            return Err(Self::fail("apt-get install"));
        }
        self.autofs_installed.set(true);
        Ok(())
    }

    fn reload_service(&self, name: &str) -> ShareResult<()> {
        self.record(format!("reload {name}"));
        Ok(())
    }

    fn trigger_mount(&self, target: &str) -> ShareResult<()> {
        self.record(format!("trigger {target}"));
        Ok(())
    }

    fn ensure_container_running(&self, id: &str) -> ShareResult<()> {
        self.record(format!("start {id}"));
        if self.container_down {
            return Err(Self::fail("pct start"));
        }
        Ok(())
    }

    fn exec_in_container(&self, id: &str, command: &[&str]) -> ShareResult<()> {
        self.record(format!("exec {id} {}", command.join(" ")));
        if self.group_fails && command.first() == Some(&"sh") {
            return Err(Self::fail("groupadd"));
        }
        Ok(())
    }
}

/// A temporary host root with its paths.
pub struct Host {
    pub dir: TempDir,
    pub paths: SharePaths,
}

impl Host {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = SharePaths::with_root(dir.path());
        Self { dir, paths }
    }

    pub fn reconciler<'a>(&self, system: &'a FakeSystem) -> MountReconciler<&'a FakeSystem> {
        MountReconciler::new(self.paths.clone(), ShareConfig::default(), system)
    }

    /// Create an empty container config so binds can be appended.
    pub fn container(&self, id: &str, content: &str) {
        std::fs::create_dir_all(&self.paths.container_config_dir).unwrap();
        std::fs::write(self.paths.container_config(id), content).unwrap();
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }
}
