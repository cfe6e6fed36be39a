//! Local directory backend, usually behind a static file server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{UploadSource, Uploaded, Uploader, public_url, remove_later, target_name};
use crate::error::UploadError;

#[derive(Debug, Clone)]
pub struct FileSystemUploader {
    root: PathBuf,
    /// Public URL of `root`, without trailing slash.
    base_url: Option<String>,
}

impl FileSystemUploader {
    pub fn new(root: PathBuf, base_url: Option<String>) -> Self {
        Self { root, base_url }
    }
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> UploadError {
    let path = path.to_path_buf();
    move |source| UploadError::Io { action, path, source }
}

#[async_trait]
impl Uploader for FileSystemUploader {
    fn publishes(&self) -> bool {
        self.base_url.is_some()
    }

    async fn upload(
        &self,
        source: UploadSource,
        filename: Option<&str>,
        subdir: Option<&str>,
        remove_after: Option<Duration>,
    ) -> Result<Uploaded, UploadError> {
        let name = target_name(&source, filename)?;

        let dir = match subdir {
            Some(sub) => self.root.join(sub.trim_matches('/')),
            None => self.root.clone(),
        };
        fs::create_dir_all(&dir).await.map_err(io_error("create", &dir))?;

        let target = dir.join(&name);
        match source {
            UploadSource::Path(path) => {
                fs::copy(&path, &target).await.map_err(io_error("copy", &path))?;
            }
            UploadSource::Bytes(bytes) => {
                fs::write(&target, bytes).await.map_err(io_error("write", &target))?;
            }
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o644);
            if let Err(e) = fs::set_permissions(&target, perms).await {
                warn!("Could not set permissions for {:?}: {}", target, e);
            }
        }

        if let Some(delay) = remove_after {
            remove_later(self.clone(), target.clone(), delay);
        }

        debug!("Uploaded {:?}", target);
        Ok(Uploaded {
            url: public_url(self.base_url.as_deref(), subdir, &name),
            path: target,
        })
    }

    async fn remove(&self, path: &Path) -> Result<(), UploadError> {
        fs::remove_file(path).await.map_err(io_error("remove", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_into_subdir() {
        let root = tempfile::tempdir().unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("cat.jpg");
        std::fs::write(&source, b"meow").unwrap();

        let uploader = FileSystemUploader::new(
            root.path().to_path_buf(),
            Some("https://files.example.org".to_string()),
        );
        let uploaded = uploader
            .upload(UploadSource::Path(source.clone()), None, Some("irs"), None)
            .await
            .unwrap();

        assert_eq!(uploaded.path, root.path().join("irs").join("cat.jpg"));
        assert_eq!(uploaded.url.as_deref(), Some("https://files.example.org/irs/cat.jpg"));
        assert_eq!(std::fs::read(&uploaded.path).unwrap(), b"meow");
        assert!(source.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let uploader = FileSystemUploader::new(root.path().to_path_buf(), None);
        let uploaded = uploader
            .upload(UploadSource::Bytes(b"x".to_vec()), Some("x.txt"), None, None)
            .await
            .unwrap();

        let mode = std::fs::metadata(&uploaded.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        assert_eq!(uploaded.url, None);
        assert!(!uploader.publishes());
    }

    #[tokio::test]
    async fn test_remove_after() {
        let root = tempfile::tempdir().unwrap();
        let uploader = FileSystemUploader::new(root.path().to_path_buf(), None);
        let uploaded = uploader
            .upload(
                UploadSource::Bytes(b"x".to_vec()),
                Some("gone.txt"),
                None,
                Some(Duration::from_millis(10)),
            )
            .await
            .unwrap();
        assert!(uploaded.path.exists());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!uploaded.path.exists());
    }

    #[tokio::test]
    async fn test_bytes_need_filename() {
        let root = tempfile::tempdir().unwrap();
        let uploader = FileSystemUploader::new(root.path().to_path_buf(), None);
        let err = uploader
            .upload(UploadSource::Bytes(vec![]), None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MissingFilename));
    }
}
