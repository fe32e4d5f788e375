//! Credential files for share authentication.
//!
//! Each share gets a two-line `username=`/`password=` file readable by
//! the owner only. Files are carried between hosts as opaque base64 blobs
//! that decode back to the exact original bytes.

use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sharebind_common::{Credentials, SharePaths, ShareError, ShareResult};

/// Permission bits of credential files.
const CREDENTIALS_MODE: u32 = 0o600;

/// Credential file store rooted at the configured credentials directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    paths: SharePaths,
}

impl CredentialStore {
    /// Create a store over the given paths.
    #[must_use]
    pub fn new(paths: SharePaths) -> Self {
        Self { paths }
    }

    /// Credential file path for a share name.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.paths.credential_file(name)
    }

    /// Write credentials for a share, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are not single-line values or
    /// the file cannot be written.
    pub fn write(&self, name: &str, credentials: &Credentials) -> ShareResult<PathBuf> {
        credentials.validate()?;
        let path = self.path_for(name);
        self.write_bytes(&path, credentials.to_file_contents().as_bytes())?;
        tracing::info!(name, path = %path.display(), "Credentials written");
        Ok(path)
    }

    /// Write raw credential file bytes with owner-only permissions.
    ///
    /// Permissions are restricted before any content lands in the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write_bytes(&self, path: &Path, bytes: &[u8]) -> ShareResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(CREDENTIALS_MODE)
            .open(path)?;
        // mode() only applies on creation
        file.set_permissions(Permissions::from_mode(CREDENTIALS_MODE))?;
        file.write_all(bytes)?;
        file.sync_all()?;

        tracing::debug!(path = %path.display(), len = bytes.len(), "Credential file stored");
        Ok(())
    }

    /// Read raw credential file bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_bytes(&self, path: &Path) -> ShareResult<Vec<u8>> {
        Ok(fs::read(path)?)
    }

    /// Read and parse a credential file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has no username line.
    pub fn read(&self, path: &Path) -> ShareResult<Credentials> {
        let contents = fs::read_to_string(path)?;
        Credentials::parse(&contents).ok_or_else(|| ShareError::Config {
            message: format!("no username in credential file {}", path.display()),
        })
    }
}

/// Encode credential file bytes for transport.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode a transported credential blob back to the original bytes.
///
/// # Errors
///
/// Returns [`ShareError::InvalidCredentialBlob`] if the blob is not valid base64.
pub fn decode(blob: &str) -> ShareResult<Vec<u8>> {
    BASE64
        .decode(blob.trim())
        .map_err(|e| ShareError::InvalidCredentialBlob {
            reason: e.to_string(),
        })
}
