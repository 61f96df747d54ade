use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use client_core::ArtifactSink;

/// Writes downloaded bundles into a local directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn target_for(&self, filename: &str) -> Result<PathBuf> {
        // Server-chosen names must not escape the download directory.
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| anyhow!("server returned an unusable filename '{filename}'"))?;
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.target_for(filename)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("cannot create {}", self.dir.display()))?;
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("cannot write {}", target.display()))?;
        Ok(target)
    }
}

#[cfg(test)]
#[path = "tests/sink_tests.rs"]
mod tests;
