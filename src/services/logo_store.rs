use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Destination for the uploaded branding logo
#[async_trait]
pub trait LogoStore: Send + Sync {
    /// Replace the current logo with `bytes`.
    async fn save(&self, bytes: &[u8]) -> Result<()>;

    /// Where the logo ends up, for logging and responses
    fn location(&self) -> &Path;
}

/// Stores the logo as a single file at a fixed path
pub struct FsLogoStore {
    path: PathBuf,
}

impl FsLogoStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LogoStore for FsLogoStore {
    async fn save(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so readers never see a partial file.
        let staging = self.path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&staging, bytes).await?;
        if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::info!("Stored logo ({} bytes) at {}", bytes.len(), self.path.display());
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_overwrites_previous_logo() {
        let dir = std::env::temp_dir().join(format!("logo_store_{}", Uuid::new_v4()));
        let store = FsLogoStore::new(dir.join("static").join("logo.png"));

        store.save(b"first").await.unwrap();
        store.save(b"second").await.unwrap();

        let stored = tokio::fs::read(store.location()).await.unwrap();
        assert_eq!(stored, b"second");

        let leftovers = std::fs::read_dir(dir.join("static")).unwrap().count();
        assert_eq!(leftovers, 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
