//! SFTP backend for a remote web host.
//!
//! libssh2 is blocking, so every remote operation runs on the blocking pool.
//! The session is opened on `connect` or lazily on first use, and reopened
//! after it fails.

use std::io::Write;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use ssh2::{CheckResult, FileStat, KnownHostFileKind, Session, Sftp};
use tracing::{debug, info, warn};

use super::{UploadSource, Uploaded, Uploader, public_url, remove_later, target_name};
use crate::config::SshSettings;
use crate::error::UploadError;

#[derive(Clone)]
pub struct SshUploader {
    inner: Arc<Inner>,
}

struct Inner {
    settings: SshSettings,
    session: Mutex<Option<Session>>,
}

impl SshUploader {
    pub fn new(settings: SshSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                session: Mutex::new(None),
            }),
        }
    }

    /// Run `op` with an open SFTP channel on the blocking pool.
    async fn with_sftp<T, F>(&self, op: F) -> Result<T, UploadError>
    where
        T: Send + 'static,
        F: FnOnce(&Sftp) -> Result<T, UploadError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.with_sftp(op))
            .await
            .map_err(|_| UploadError::Interrupted)?
    }
}

impl Inner {
    fn with_sftp<T>(&self, op: impl FnOnce(&Sftp) -> Result<T, UploadError>) -> Result<T, UploadError> {
        let mut session = self.session.lock();
        let sftp = match session.as_ref().map(Session::sftp) {
            Some(Ok(sftp)) => sftp,
            stale => {
                if let Some(Err(e)) = stale {
                    debug!("Reopening ssh session: {}", e);
                }
                let fresh = open_session(&self.settings)?;
                let sftp = fresh.sftp().map_err(ssh_error("sftp"))?;
                *session = Some(fresh);
                sftp
            }
        };
        op(&sftp)
    }
}

fn ssh_error(action: &'static str) -> impl FnOnce(ssh2::Error) -> UploadError {
    move |source| UploadError::Ssh { action, source }
}

/// Connect, verify the host key against the user's known_hosts and log in.
fn open_session(settings: &SshSettings) -> Result<Session, UploadError> {
    let tcp = TcpStream::connect((settings.host.as_str(), settings.port)).map_err(|source| {
        UploadError::Connect {
            host: settings.host.clone(),
            source,
        }
    })?;

    let mut session = Session::new().map_err(ssh_error("session"))?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(ssh_error("handshake"))?;
    verify_host_key(&session, settings)?;

    if let Some(key) = &settings.key_file {
        session
            .userauth_pubkey_file(&settings.user, None, key, None)
            .map_err(ssh_error("public key login"))?;
    } else if let Some(password) = &settings.password {
        session
            .userauth_password(&settings.user, password)
            .map_err(ssh_error("password login"))?;
    } else {
        session.userauth_agent(&settings.user).map_err(ssh_error("agent login"))?;
    }

    info!("Connected to {}@{}:{}", settings.user, settings.host, settings.port);
    Ok(session)
}

fn verify_host_key(session: &Session, settings: &SshSettings) -> Result<(), UploadError> {
    let unknown = || UploadError::UnknownHostKey {
        host: settings.host.clone(),
    };

    let mut known_hosts = session.known_hosts().map_err(ssh_error("known_hosts"))?;
    let file = std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".ssh").join("known_hosts"))
        .ok_or_else(unknown)?;
    known_hosts
        .read_file(&file, KnownHostFileKind::OpenSSH)
        .map_err(ssh_error("reading known_hosts"))?;

    let (key, _) = session.host_key().ok_or_else(unknown)?;
    match known_hosts.check_port(&settings.host, settings.port, key) {
        CheckResult::Match => Ok(()),
        _ => Err(unknown()),
    }
}

/// `mkdir -p` over SFTP.
fn create_dirs(sftp: &Sftp, dir: &Path) -> Result<(), UploadError> {
    let mut current = PathBuf::new();
    for part in dir.components() {
        current.push(part);
        if sftp.stat(&current).is_err() {
            sftp.mkdir(&current, 0o755).map_err(ssh_error("mkdir"))?;
        }
    }
    Ok(())
}

/// Remote location of `subdir/name` below the upload directory.
fn remote_path(upload_dir: &str, subdir: Option<&str>, name: &str) -> PathBuf {
    let mut path = PathBuf::from(upload_dir);
    if let Some(dir) = subdir.map(|dir| dir.trim_matches('/')).filter(|dir| !dir.is_empty()) {
        path.push(dir);
    }
    path.push(name);
    path
}

#[async_trait]
impl Uploader for SshUploader {
    async fn connect(&self) -> Result<(), UploadError> {
        self.with_sftp(|_| Ok(())).await
    }

    fn publishes(&self) -> bool {
        self.inner.settings.url.is_some()
    }

    async fn upload(
        &self,
        source: UploadSource,
        filename: Option<&str>,
        subdir: Option<&str>,
        remove_after: Option<Duration>,
    ) -> Result<Uploaded, UploadError> {
        let name = target_name(&source, filename)?;
        let bytes = match source {
            UploadSource::Path(path) => {
                tokio::fs::read(&path).await.map_err(|source| UploadError::Io {
                    action: "read",
                    path: path.clone(),
                    source,
                })?
            }
            UploadSource::Bytes(bytes) => bytes,
        };

        let target = remote_path(&self.inner.settings.upload_dir, subdir, &name);
        let remote = target.clone();
        self.with_sftp(move |sftp| {
            if let Some(dir) = remote.parent() {
                create_dirs(sftp, dir)?;
            }
            let io_error = |source| UploadError::Io {
                action: "write",
                path: remote.clone(),
                source,
            };
            let mut file = sftp.create(&remote).map_err(ssh_error("create"))?;
            file.write_all(&bytes).map_err(io_error)?;
            file.flush().map_err(io_error)?;

            let perm = FileStat {
                size: None,
                uid: None,
                gid: None,
                perm: Some(0o644),
                atime: None,
                mtime: None,
            };
            if let Err(e) = sftp.setstat(&remote, perm) {
                warn!("Could not set permissions for {:?}: {}", remote, e);
            }
            Ok(())
        })
        .await?;

        if let Some(delay) = remove_after {
            remove_later(self.clone(), target.clone(), delay);
        }

        debug!("Uploaded {:?} to {}", target, self.inner.settings.host);
        Ok(Uploaded {
            url: public_url(self.inner.settings.url.as_deref(), subdir, &name),
            path: target,
        })
    }

    async fn remove(&self, path: &Path) -> Result<(), UploadError> {
        let path = path.to_path_buf();
        self.with_sftp(move |sftp| sftp.unlink(&path).map_err(ssh_error("unlink")))
            .await
    }

    async fn close(&self) -> Result<(), UploadError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            if let Some(session) = inner.session.lock().take() {
                session
                    .disconnect(None, "bye", None)
                    .map_err(ssh_error("disconnect"))?;
            }
            Ok(())
        })
        .await
        .map_err(|_| UploadError::Interrupted)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: Option<&str>) -> SshSettings {
        SshSettings {
            host: "files.example.org".to_string(),
            port: 22,
            user: "xenian".to_string(),
            password: None,
            key_file: None,
            upload_dir: "/var/www/files".to_string(),
            url: url.map(str::to_string),
        }
    }

    #[test]
    fn test_remote_path() {
        assert_eq!(
            remote_path("/var/www/files", Some("/irs/"), "a.jpg"),
            PathBuf::from("/var/www/files/irs/a.jpg")
        );
        assert_eq!(
            remote_path("/var/www/files", None, "a.jpg"),
            PathBuf::from("/var/www/files/a.jpg")
        );
        assert_eq!(
            remote_path("/var/www/files", Some(""), "a.jpg"),
            PathBuf::from("/var/www/files/a.jpg")
        );
    }

    #[test]
    fn test_publishes_only_with_url() {
        assert!(SshUploader::new(settings(Some("https://files.example.org"))).publishes());
        assert!(!SshUploader::new(settings(None)).publishes());
    }

    #[tokio::test]
    async fn test_close_without_session() {
        let uploader = SshUploader::new(settings(None));
        assert!(uploader.close().await.is_ok());
    }
}
