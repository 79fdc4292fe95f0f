//! File persistence helpers.
//!
//! Every file the gateway owns is written atomically: the new contents go
//! to a temporary file in the same directory, which is then renamed over
//! the target. Readers see either the old or the new file, never a partial
//! one, and a failed write leaves the previous file untouched.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::StoreError;

/// Registry backing store file name.
pub const PROVIDERS_FILE: &str = "providers.json";

/// Secrets snapshot file name.
pub const SECRETS_FILE: &str = ".env.private";

/// Usage ledger file name.
pub const USAGE_FILE: &str = "usage.json";

/// Distinguishes temp files of concurrent writers in one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default data directory.
///
/// - macOS: `~/Library/Application Support/llmgate`
/// - Linux: `~/.config/llmgate`
/// - Windows: `%APPDATA%\llmgate`
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .map(|h| h.join("Library").join("Application Support").join("llmgate"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir()
            .map(|c| c.join("llmgate"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Locations of the gateway's files inside one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Creates the layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data directory itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registry backing store.
    pub fn providers(&self) -> PathBuf {
        self.root.join(PROVIDERS_FILE)
    }

    /// Secrets snapshot.
    pub fn secrets(&self) -> PathBuf {
        self.root.join(SECRETS_FILE)
    }

    /// Usage ledger.
    pub fn usage(&self) -> PathBuf {
        self.root.join(USAGE_FILE)
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

// ============================================================================
// Security: File Permissions
// ============================================================================

/// Sets restrictive file permissions (0o600) on Unix systems.
#[cfg(unix)]
async fn set_restrictive_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600); // Owner read/write only
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = "0600", "Set restrictive permissions");
    Ok(())
}

/// Sets restrictive directory permissions (0o700) on Unix systems.
#[cfg(unix)]
async fn set_restrictive_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o700);
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = "0700", "Set restrictive directory permissions");
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Ensures a directory exists, creating it owner-only if missing.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
        set_restrictive_dir_permissions(path).await?;
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "file".into(), |n| n.to_string_lossy().into_owned());
    let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

/// Writes `contents` to `path` atomically with owner-only permissions.
///
/// The temp file is flushed to disk and restricted to 0600 before the
/// rename, so the target never exists with wider permissions.
///
/// # Errors
///
/// Returns an error if any step fails. The temp file is removed and the
/// previous contents of `path` are left untouched.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent).await?;
        }
    }

    let temp_path = temp_path_for(path);
    let result = write_then_rename(&temp_path, path, contents).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %temp_path.display(), error = %e, "Failed to remove temp file");
            }
        }
    }
    result
}

async fn write_then_rename(temp: &Path, target: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let mut file = tokio::fs::File::create(temp).await?;
    set_restrictive_permissions(temp).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(temp, target).await?;
    debug!(path = %target.display(), bytes = contents.len(), "File written atomically");
    Ok(())
}

/// Saves data to a JSON file atomically with secure permissions.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");
    let json = serde_json::to_vec_pretty(data)?;
    write_atomic(path, &json).await
}

/// Loads data from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");

    let content = tokio::fs::read_to_string(path).await?;
    let data = serde_json::from_str(&content)?;

    debug!(path = %path.display(), "JSON file loaded");
    Ok(data)
}

/// Loads data from a JSON file, returning the default if it is missing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, so a
/// corrupt file is never silently replaced by defaults.
pub async fn load_json_or_default<T: DeserializeOwned + Default>(
    path: &Path,
) -> Result<T, StoreError> {
    match load_json(path).await {
        Ok(data) => Ok(data),
        Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "File not found, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_data_dir() {
        let path = default_data_dir();
        assert!(!path.as_os_str().is_empty());
        assert!(path.ends_with("llmgate"));
    }

    #[test]
    fn test_data_paths_layout() {
        let paths = DataPaths::new("/tmp/x");
        assert_eq!(paths.providers(), PathBuf::from("/tmp/x/providers.json"));
        assert_eq!(paths.secrets(), PathBuf::from("/tmp/x/.env.private"));
        assert_eq!(paths.usage(), PathBuf::from("/tmp/x/usage.json"));
    }

    #[test]
    fn test_temp_paths_are_unique_siblings() {
        let target = Path::new("/data/.env.private");
        let a = temp_path_for(target);
        let b = temp_path_for(target);
        assert_ne!(a, b);
        assert_eq!(a.parent(), target.parent());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.json");

        write_atomic(&test_file, b"{}").await.unwrap();

        let metadata = tokio::fs::metadata(&test_file).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "File should have 0600 permissions");
    }
}
