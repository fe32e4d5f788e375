//! # Sharebind
//!
//! Sharebind mounts CIFS network shares on a host and binds them into
//! LXC containers, keeping every persistent record idempotent.
//!
//! ## Features
//!
//! - **Host mounts**: static `/etc/fstab` entries or on-demand autofs maps,
//!   with automatic fallback to fstab when autofs is unavailable
//! - **Container binds**: `mpN:` lines allocated after the highest used slot
//! - **Credentials**: owner-only credential files per share
//! - **Portability**: export/import bundles that carry credentials between hosts
//!
//! ## Usage
//!
//! ```no_run
//! use sharebind::reconcile::{CredentialSource, HostMountSpec, MountReconciler, ReconcileRequest};
//! use sharebind::system::HostSystem;
//! use sharebind_common::{AccessMode, Credentials, Mechanism, ShareConfig, SharePaths};
//!
//! # fn example() -> sharebind_common::ShareResult<()> {
//! let reconciler = MountReconciler::new(SharePaths::new(), ShareConfig::default(), HostSystem);
//!
//! let report = reconciler.reconcile(&ReconcileRequest {
//!     target: "/mnt/lxc_shares/main".to_string(),
//!     host: Some(HostMountSpec {
//!         source: "//10.0.0.5/main".to_string(),
//!         name: None,
//!         credentials: CredentialSource::Provided(Credentials::new("alice", "secret")),
//!         mechanism: Mechanism::OnDemand,
//!         mode: AccessMode::ReadWrite,
//!     }),
//!     bind: None,
//! })?;
//! println!("{:?}", report.host);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod credentials;
pub mod reconcile;
pub mod system;
pub mod tables;
pub mod transfer;

pub use reconcile::MountReconciler;
