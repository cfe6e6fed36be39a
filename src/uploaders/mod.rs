//! Uploaders publish local files somewhere the outside world can fetch
//! them, e.g. so reverse image search engines can download a photo.

mod file_system;
mod ssh;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

pub use file_system::FileSystemUploader;
pub use ssh::SshUploader;

use crate::config::UploaderConfig;
use crate::error::UploadError;

/// What to upload.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// A file on disk. It is copied, never moved.
    Path(PathBuf),
    /// In-memory content. Needs an explicit filename.
    Bytes(Vec<u8>),
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub path: PathBuf,
    /// Public URL, when the backend serves its files.
    pub url: Option<String>,
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn connect(&self) -> Result<(), UploadError> {
        Ok(())
    }

    /// Whether uploads come back with a public URL. Callers that only want
    /// the URL can skip the upload when this is false.
    fn publishes(&self) -> bool;

    /// Store `source` as `subdir/filename`, optionally deleting it again
    /// after `remove_after`.
    async fn upload(
        &self,
        source: UploadSource,
        filename: Option<&str>,
        subdir: Option<&str>,
        remove_after: Option<Duration>,
    ) -> Result<Uploaded, UploadError>;

    async fn remove(&self, path: &Path) -> Result<(), UploadError>;

    async fn close(&self) -> Result<(), UploadError> {
        Ok(())
    }
}

/// Keeps files local and publishes nothing. In-memory content lands in the
/// temp directory and is removed after `remove_after` like anywhere else.
#[derive(Debug, Default, Clone)]
pub struct NoUploader;

#[async_trait]
impl Uploader for NoUploader {
    fn publishes(&self) -> bool {
        false
    }

    async fn upload(
        &self,
        source: UploadSource,
        filename: Option<&str>,
        _subdir: Option<&str>,
        remove_after: Option<Duration>,
    ) -> Result<Uploaded, UploadError> {
        let path = match source {
            // Not ours to delete.
            UploadSource::Path(path) => path,
            UploadSource::Bytes(bytes) => {
                let name = filename.ok_or(UploadError::MissingFilename)?;
                let path = std::env::temp_dir().join(file_name(name)?);
                tokio::fs::write(&path, bytes).await.map_err(|source| UploadError::Io {
                    action: "write",
                    path: path.clone(),
                    source,
                })?;
                if let Some(delay) = remove_after {
                    remove_later(self.clone(), path.clone(), delay);
                }
                path
            }
        };
        Ok(Uploaded { path, url: None })
    }

    async fn remove(&self, path: &Path) -> Result<(), UploadError> {
        tokio::fs::remove_file(path).await.map_err(|source| UploadError::Io {
            action: "remove",
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Delete an uploaded file once `delay` has passed.
fn remove_later<U>(uploader: U, path: PathBuf, delay: Duration)
where
    U: Uploader + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = uploader.remove(&path).await {
            warn!("Scheduled removal of {:?} failed: {}", path, e);
        }
    });
}

/// Reduce a caller supplied name to its last component.
fn file_name(name: &str) -> Result<&str, UploadError> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(UploadError::MissingFilename)
}

/// The name a source is stored under.
fn target_name(source: &UploadSource, filename: Option<&str>) -> Result<String, UploadError> {
    match (source, filename) {
        (_, Some(name)) => Ok(file_name(name)?.to_string()),
        (UploadSource::Path(path), None) => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or(UploadError::MissingFilename),
        (UploadSource::Bytes(_), None) => Err(UploadError::MissingFilename),
    }
}

/// Public URL of `subdir/name` below `base`.
fn public_url(base: Option<&str>, subdir: Option<&str>, name: &str) -> Option<String> {
    let base = base?.trim_end_matches('/');
    Some(match subdir.map(|dir| dir.trim_matches('/')).filter(|dir| !dir.is_empty()) {
        Some(dir) => format!("{base}/{dir}/{name}"),
        None => format!("{base}/{name}"),
    })
}

pub fn from_config(config: &UploaderConfig) -> Arc<dyn Uploader> {
    match config {
        UploaderConfig::None => Arc::new(NoUploader),
        UploaderConfig::FileSystem { path, url } => {
            Arc::new(FileSystemUploader::new(path.clone(), url.clone()))
        }
        UploaderConfig::Ssh(settings) => Arc::new(SshUploader::new(settings.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_strips_directories() {
        assert_eq!(file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(file_name("photo.jpg").unwrap(), "photo.jpg");
        assert!(file_name("..").is_err());
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url(Some("https://files.example.org/"), Some("/irs/"), "a.jpg").as_deref(),
            Some("https://files.example.org/irs/a.jpg")
        );
        assert_eq!(
            public_url(Some("https://files.example.org"), None, "a.jpg").as_deref(),
            Some("https://files.example.org/a.jpg")
        );
        assert_eq!(public_url(None, Some("irs"), "a.jpg"), None);
    }

    #[tokio::test]
    async fn test_no_uploader_keeps_paths() {
        let uploaded = NoUploader
            .upload(UploadSource::Path("/tmp/a.jpg".into()), None, Some("x"), None)
            .await
            .unwrap();
        assert_eq!(uploaded.path, PathBuf::from("/tmp/a.jpg"));
        assert_eq!(uploaded.url, None);
        assert!(!NoUploader.publishes());
    }

    #[tokio::test]
    async fn test_no_uploader_needs_filename_for_bytes() {
        let err = NoUploader
            .upload(UploadSource::Bytes(vec![1]), None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::MissingFilename));
    }

    #[tokio::test]
    async fn test_no_uploader_removes_temp_file() {
        let name = format!("xenian-{:08x}.jpg", rand::random::<u32>());
        let uploaded = NoUploader
            .upload(
                UploadSource::Bytes(b"jpeg".to_vec()),
                Some(&name),
                None,
                Some(Duration::from_millis(10)),
            )
            .await
            .unwrap();
        assert!(uploaded.path.exists());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!uploaded.path.exists());
    }
}
