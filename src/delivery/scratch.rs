//! Scratch directory for chart and CSV artifacts awaiting upload
//!
//! Files are named `<prefix>_<unix-ts>_<4-digit-random>.<ext>` and created
//! with `create_new`, so concurrent generations never share a path.

use super::transport::Attachment;
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const NAME_ATTEMPTS: usize = 16;

/// A file written to the scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
}

impl Artifact {
    /// Read the file back as an upload payload
    pub async fn load(&self) -> io::Result<Attachment> {
        Ok(Attachment {
            file_name: self.file_name.clone(),
            bytes: tokio::fs::read(&self.path).await?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the directory if needed and drop leftovers from a previous run
    pub fn prepare(&self) -> io::Result<usize> {
        std::fs::create_dir_all(&self.root)?;
        Ok(self.clear())
    }

    /// Remove every regular file, logging the ones that cannot be removed
    pub fn clear(&self) -> usize {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                log::error!("❌ Cannot list scratch dir {}: {}", self.root.display(), e);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => log::error!("❌ Failed to remove {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            log::info!("🧹 Cleared {} file(s) from {}", removed, self.root.display());
        }
        removed
    }

    pub fn unique_name(prefix: &str, ext: &str) -> String {
        let ts = chrono::Utc::now().timestamp();
        let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
        format!("{}_{}_{}.{}", prefix, ts, suffix, ext)
    }

    pub async fn persist(&self, prefix: &str, ext: &str, bytes: &[u8]) -> io::Result<Artifact> {
        tokio::fs::create_dir_all(&self.root).await?;

        for _ in 0..NAME_ATTEMPTS {
            let file_name = Self::unique_name(prefix, ext);
            let path = self.root.join(&file_name);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };
            file.write_all(bytes).await?;
            file.flush().await?;
            log::debug!("💾 Wrote {} ({} bytes)", path.display(), bytes.len());
            return Ok(Artifact { path, file_name });
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {}.{} in {}", prefix, ext, self.root.display()),
        ))
    }

    /// Best-effort removal; failures are logged, never raised
    pub async fn remove(&self, artifact: &Artifact) -> bool {
        match tokio::fs::remove_file(&artifact.path).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("❌ Failed to remove {}: {}", artifact.path.display(), e);
                false
            }
        }
    }
}
