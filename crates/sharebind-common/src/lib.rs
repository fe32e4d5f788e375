//! # sharebind-common
//!
//! Shared types for the sharebind tool.
//!
//! This crate provides functionality used by every sharebind component:
//! - The error type and result alias
//! - Standard filesystem locations of the managed stores
//! - Deployment configuration (fixed IDs, mount option defaults)
//! - Value types shared by the host and container tables

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::ShareConfig;
pub use error::{ShareError, ShareResult};
pub use paths::SharePaths;
pub use types::{AccessMode, Credentials, HostMountEntry, Mechanism};
