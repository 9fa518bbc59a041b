//! Credential storage.
//!
//! The identity client persists its serialized token cache through the
//! [`CredentialStore`] trait. [`FileCredentialStore`] keeps it in a single
//! file that only the owning user can read on POSIX systems. Nothing else in
//! the workspace touches that file.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{GraphError, GraphResult};

/// Directory under the home directory holding config and token cache.
pub const CONFIG_DIR_NAME: &str = ".d-msgraph-cli";

/// File name of the token cache inside [`CONFIG_DIR_NAME`].
pub const TOKEN_CACHE_FILE: &str = "token-cache.json";

/// Persistence backend for the serialized token cache.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored bytes, or `None` if nothing has been stored.
    fn load(&self) -> GraphResult<Option<Vec<u8>>>;

    /// Replaces the stored bytes.
    fn save(&self, bytes: &[u8]) -> GraphResult<()>;

    /// Removes the stored bytes. Returns `true` if something was removed.
    fn clear(&self) -> GraphResult<bool>;
}

/// Returns `~/.d-msgraph-cli`.
pub fn default_config_dir() -> GraphResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or_else(|| GraphError::storage("could not determine home directory"))
}

/// Token cache stored as a file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at `~/.d-msgraph-cli/token-cache.json`.
    pub fn default_location() -> GraphResult<Self> {
        Ok(Self::new(default_config_dir()?.join(TOKEN_CACHE_FILE)))
    }

    /// Returns the cache file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> GraphResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                debug!("loaded token cache from {:?}", self.path);
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!("no token cache at {:?}", self.path);
                Ok(None)
            }
            Err(e) => Err(GraphError::storage(format!(
                "failed to read token cache {}: {}",
                self.path.display(),
                e
            ))
            .with_source(e)),
        }
    }

    fn save(&self, bytes: &[u8]) -> GraphResult<()> {
        write_private(&self.path, bytes)?;
        debug!("saved token cache to {:?}", self.path);
        Ok(())
    }

    fn clear(&self) -> GraphResult<bool> {
        if !self.path.exists() {
            debug!("no token cache to clear at {:?}", self.path);
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| {
            GraphError::storage(format!("failed to remove token cache: {}", e)).with_source(e)
        })?;
        info!("cleared token cache at {:?}", self.path);
        Ok(true)
    }
}

/// Writes `bytes` to `path` through a sibling temp file and a rename.
///
/// Parent directories are created as needed. On Unix the file is made
/// owner read/write only before it is moved into place.
pub fn write_private(path: &Path, bytes: &[u8]) -> GraphResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            GraphError::storage(format!("failed to create {}: {}", parent.display(), e))
                .with_source(e)
        })?;
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, bytes).map_err(|e| {
        GraphError::storage(format!("failed to write {}: {}", temp_path.display(), e))
            .with_source(e)
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(|e| {
            GraphError::storage(format!("failed to restrict permissions: {}", e)).with_source(e)
        })?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        GraphError::storage(format!("failed to replace {}: {}", path.display(), e))
            .with_source(e)
    })
}
