use models::Id;
use std::path::{Path, PathBuf};

/// The single on-disk storage root: `uploads/`, `output/`, `temp/`,
/// `thumbnails/`. Every absolute path exposed through the API must resolve
/// back under this root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("path {0:?} does not resolve under the storage root")]
    OutsideRoot(PathBuf),
    #[error("io error resolving path")]
    Io(#[from] std::io::Error),
}

impl StorageLayout {
    /// Open (creating as needed) the storage tree under `root`.
    pub fn create(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root: PathBuf = root.into();
        for sub in ["uploads", "output", "temp", "thumbnails"] {
            std::fs::create_dir_all(root.join(sub))?;
        }
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn output(&self) -> PathBuf {
        self.root.join("output")
    }

    pub fn temp(&self) -> PathBuf {
        self.root.join("temp")
    }

    pub fn thumbnails(&self) -> PathBuf {
        self.root.join("thumbnails")
    }

    /// Output directory for a GOES fetch job: `output/goes_{job_id}/`.
    pub fn goes_job_dir(&self, job_id: Id) -> PathBuf {
        self.output().join(format!("goes_{job_id}"))
    }

    /// Output directory for a generic job: `output/{job_id}/`.
    pub fn job_dir(&self, job_id: Id) -> PathBuf {
        self.output().join(job_id.to_string())
    }

    pub fn backfill_job_dir(&self, job_id: Id) -> PathBuf {
        self.output().join(format!("backfill_{job_id}"))
    }

    /// Canonicalize `path` and require it to live under the root. This is
    /// the path-traversal guard for every user-supplied or stored path.
    pub fn validate(&self, path: impl AsRef<Path>) -> Result<PathBuf, PathError> {
        let resolved = path.as_ref().canonicalize()?;
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(PathError::OutsideRoot(resolved))
        }
    }

    /// Free bytes on the volume backing the storage root.
    pub fn free_space(&self) -> std::io::Result<u64> {
        fs2::available_space(&self.root)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn creates_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::create(dir.path()).unwrap();
        for sub in ["uploads", "output", "temp", "thumbnails"] {
            assert!(layout.root().join(sub).is_dir());
        }
    }

    #[test]
    fn validate_accepts_paths_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::create(dir.path()).unwrap();
        let inside = layout.output().join("file.png");
        std::fs::write(&inside, b"x").unwrap();
        assert!(layout.validate(&inside).is_ok());
    }

    #[test]
    fn validate_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::create(dir.path().join("store")).unwrap();

        let outside = dir.path().join("outside.png");
        std::fs::write(&outside, b"x").unwrap();
        assert!(layout.validate(&outside).is_err());

        // Traversal through the root is also caught after canonicalization.
        let sneaky = layout.output().join("../../outside.png");
        assert!(layout.validate(sneaky).is_err());
    }
}
