//! Local renderer installation cache.
//!
//! Tools are downloaded once per `engine-version-platform` key and kept
//! under the cache directory. Downloads stream to a `.part` sibling while
//! hashing, verify against the catalog checksum, and publish with an
//! atomic rename, so a crash mid-download never leaves a usable-looking
//! but corrupt entry. Cache hits are re-hashed against the catalog
//! checksum before being served; an entry that no longer matches is
//! evicted and downloaded again. A per-key async mutex stops concurrent
//! fetches of the same tool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use helios_core::error::CoreError;
use helios_core::hashing::sha256_file;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::client::Tool;
use crate::error::WorkerError;

/// Cache of renderer executables keyed by [`Tool::cache_key`].
pub struct ToolCache {
    root: PathBuf,
    client: reqwest::Client,
    /// Per-key download locks, created lazily.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ToolCache {
    /// Create a cache rooted at `root`. The directory is created on
    /// first use.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            client: reqwest::Client::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Path a tool is (or would be) installed at.
    pub fn tool_path(&self, tool: &Tool) -> PathBuf {
        self.root.join(tool.cache_key())
    }

    /// Ensure `tool` is installed locally, downloading it if needed.
    ///
    /// Returns the path of the verified executable. An existing entry is
    /// served only after its checksum is re-verified; a corrupted entry
    /// is evicted and treated as a miss.
    pub async fn ensure(&self, tool: &Tool) -> Result<PathBuf, WorkerError> {
        let dest = self.tool_path(tool);

        let lock = self.key_lock(&tool.cache_key()).await;
        let _guard = lock.lock().await;

        if tokio::fs::try_exists(&dest)
            .await
            .map_err(|e| WorkerError::io(&dest, e))?
        {
            if self.verify_existing(tool, &dest).await? {
                tracing::debug!(key = %tool.cache_key(), "Tool cache hit");
                return Ok(dest);
            }
            tracing::warn!(
                key = %tool.cache_key(),
                "Cached tool failed checksum verification, evicting",
            );
            tokio::fs::remove_file(&dest)
                .await
                .map_err(|e| WorkerError::io(&dest, e))?;
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| WorkerError::io(&self.root, e))?;

        tracing::info!(key = %tool.cache_key(), url = %tool.url, "Downloading tool");
        self.download_verified(tool, &dest).await?;
        tracing::info!(key = %tool.cache_key(), path = %dest.display(), "Tool installed");

        Ok(dest)
    }

    /// Stream the tool to a `.part` sibling, hashing as it goes, then
    /// rename into place once the checksum matches.
    async fn download_verified(&self, tool: &Tool, dest: &Path) -> Result<(), WorkerError> {
        // Version strings contain dots, so append rather than replace an
        // "extension".
        let mut tmp_name = dest.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".part");
        let tmp = dest.with_file_name(tmp_name);

        let mut response = self
            .client
            .get(&tool.url)
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| WorkerError::io(&tmp, e))?;
        let mut hasher = Sha256::new();

        while let Some(chunk) = response.chunk().await? {
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| WorkerError::io(&tmp, e))?;
        }
        file.flush().await.map_err(|e| WorkerError::io(&tmp, e))?;
        drop(file);

        let actual = format!("{:x}", hasher.finalize());
        if !actual.eq_ignore_ascii_case(&tool.checksum) {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(WorkerError::ChecksumMismatch {
                url: tool.url.clone(),
                expected: tool.checksum.clone(),
                actual,
            });
        }

        // Tool payloads are self-contained executables.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| WorkerError::io(&tmp, e))?;
        }

        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| WorkerError::io(dest, e))?;
        Ok(())
    }

    /// Re-hash an installed entry and compare against the catalog
    /// checksum. Hashing runs on the blocking pool; tool payloads are
    /// large.
    async fn verify_existing(&self, tool: &Tool, path: &Path) -> Result<bool, WorkerError> {
        let file = path.to_path_buf();
        let actual = tokio::task::spawn_blocking(move || sha256_file(&file))
            .await
            .map_err(|e| WorkerError::Core(CoreError::Internal(format!(
                "Hashing task failed: {e}"
            ))))?
            .map_err(|e| WorkerError::io(path, e))?;
        Ok(actual.eq_ignore_ascii_case(&tool.checksum))
    }

    /// Get or create the download lock for one cache key.
    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(checksum: &str) -> Tool {
        Tool {
            id: 1,
            engine: "blender".to_string(),
            version: "4.2.1".to_string(),
            platform: "linux-x86_64".to_string(),
            url: "https://mirror.example/blender-4.2.1".to_string(),
            checksum: checksum.to_string(),
        }
    }

    #[test]
    fn tool_path_uses_cache_key() {
        let cache = ToolCache::new(PathBuf::from("/cache"));
        assert_eq!(
            cache.tool_path(&tool("ab")),
            Path::new("/cache/blender-4.2.1-linux-x86_64")
        );
    }

    #[tokio::test]
    async fn verified_cache_hit_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ToolCache::new(dir.path().to_path_buf());
        let tool = tool(&helios_core::hashing::sha256_hex(b"binary"));

        // Pre-install a matching entry; ensure() must not touch the
        // bogus URL.
        tokio::fs::write(cache.tool_path(&tool), b"binary")
            .await
            .unwrap();

        let path = cache.ensure(&tool).await.unwrap();
        assert_eq!(path, cache.tool_path(&tool));
    }

    #[tokio::test]
    async fn corrupt_cache_entry_is_evicted_not_served() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ToolCache::new(dir.path().to_path_buf());
        let tool = tool(&helios_core::hashing::sha256_hex(b"binary"));

        // Same key, different bytes: a truncated or tampered install.
        tokio::fs::write(cache.tool_path(&tool), b"bin")
            .await
            .unwrap();

        // The entry must not be served; the re-download hits the bogus
        // URL and fails, and the corrupt file is already gone.
        assert!(cache.ensure(&tool).await.is_err());
        assert!(!cache.tool_path(&tool).exists());
    }

    #[tokio::test]
    async fn key_lock_is_shared_per_key() {
        let cache = ToolCache::new(PathBuf::from("/cache"));
        let a = cache.key_lock("k").await;
        let b = cache.key_lock("k").await;
        assert!(Arc::ptr_eq(&a, &b));
    }
}
