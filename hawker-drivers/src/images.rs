//! Image pipeline port.
//!
//! Listing photos arrive as loose references (usually bare filenames from
//! the sheet). The pipeline resolves them to absolute paths the browser's
//! file input can accept. Resizing/optimisation is an external concern;
//! this port only decides which references survive.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;

#[async_trait::async_trait]
pub trait ImagePipeline: Send + Sync {
    /// Resolve references to uploadable files, preserving order. Missing
    /// files are dropped with a warning, never an error: photos are an
    /// optional part of a listing.
    async fn prepare(&self, refs: &[String]) -> Result<Vec<PathBuf>>;
}

/// Resolves bare filenames against a local uploads directory.
pub struct LocalFiles {
    uploads_dir: PathBuf,
}

impl LocalFiles {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        if path.is_absolute() || reference.contains('/') || reference.contains('\\') {
            path.to_path_buf()
        } else {
            self.uploads_dir.join(reference)
        }
    }
}

#[async_trait::async_trait]
impl ImagePipeline for LocalFiles {
    async fn prepare(&self, refs: &[String]) -> Result<Vec<PathBuf>> {
        let mut prepared = Vec::with_capacity(refs.len());
        for reference in refs {
            let path = self.resolve(reference);
            if tokio::fs::metadata(&path).await.is_ok() {
                prepared.push(path);
            } else {
                warn!(target: "images", reference, path = %path.display(), "image file not found, skipping");
            }
        }
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_bare_names_and_drops_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"jpeg").unwrap();
        std::fs::write(dir.path().join("c.jpg"), b"jpeg").unwrap();

        let pipeline = LocalFiles::new(dir.path());
        let prepared = pipeline
            .prepare(&["a.jpg".into(), "missing.jpg".into(), "c.jpg".into()])
            .await
            .unwrap();

        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[0], dir.path().join("a.jpg"));
        assert_eq!(prepared[1], dir.path().join("c.jpg"));
    }

    #[tokio::test]
    async fn pathy_references_bypass_the_uploads_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("elsewhere.png");
        std::fs::write(&outside, b"png").unwrap();

        let pipeline = LocalFiles::new("/nonexistent-uploads");
        let prepared = pipeline
            .prepare(&[outside.to_string_lossy().into_owned()])
            .await
            .unwrap();
        assert_eq!(prepared, vec![outside]);
    }

    #[tokio::test]
    async fn empty_input_is_fine() {
        let pipeline = LocalFiles::new("/tmp");
        assert!(pipeline.prepare(&[]).await.unwrap().is_empty());
    }
}
