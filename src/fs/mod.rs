/// File system operations abstraction for testing
///
/// The `setup` command writes its templates through this trait so tests can
/// assert on what would be written without touching the real home directory.
///
/// # Examples
///
/// ```rust,no_run
/// use toolshed::fs::{FileSystemOperations, StandardFileSystem};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let fs_ops: Arc<dyn FileSystemOperations> = Arc::new(StandardFileSystem);
///
///     fs_ops.create_dir_all("/tmp/toolshed").await?;
///     fs_ops.write("/tmp/toolshed/whitelist", b"me@example.com self\n", false).await?;
///
///     if fs_ops.exists("/tmp/toolshed/whitelist") {
///         println!("Whitelist was created successfully");
///     }
///
///     Ok(())
/// }
/// ```
use anyhow::Result;
use std::path::Path;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Trait for file system operations that can be mocked in tests
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait::async_trait]
pub trait FileSystemOperations: Send + Sync {
    /// Create a directory and all its parent directories
    async fn create_dir_all(&self, path: &str) -> Result<()>;

    /// Write data to a file, creating or truncating it.
    ///
    /// With `private` set the file is readable by its owner only (unix).
    async fn write(&self, path: &str, contents: &[u8], private: bool) -> Result<()>;

    /// Check if a path exists
    fn exists(&self, path: &str) -> bool;
}

/// Standard implementation that uses actual file system operations
pub struct StandardFileSystem;

#[async_trait::async_trait]
impl FileSystemOperations for StandardFileSystem {
    async fn create_dir_all(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(path).await.map_err(Into::into)
    }

    async fn write(&self, path: &str, contents: &[u8], private: bool) -> Result<()> {
        tokio::fs::write(path, contents).await?;
        if private {
            restrict_to_owner(path).await?;
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }
}

#[cfg(unix)]
async fn restrict_to_owner(path: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_to_owner(_path: &str) -> Result<()> {
    Ok(())
}
