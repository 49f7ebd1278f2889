//! File-share writer for shares mounted on the local filesystem.

use crate::file_share::{FileShareWriteRequest, FileShareWriter};
use crate::{OutboxError, OutboxResult};
use async_trait::async_trait;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, warn};

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;
const NONCE_SIZE: usize = 12;
const KEY_INFO: &[u8] = b"kiosk-share-line";

/// Appends lines to files under a local mount of the share.
///
/// `smb://host/share/dir/file.csv` and `\\host\share\dir\file.csv` both map
/// to `<mount_root>/host/share/dir/file.csv`.
pub struct MountedShareWriter {
    mount_root: PathBuf,
}

impl MountedShareWriter {
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }

    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    /// Map a share URL onto the mount. Needs at least host, share and file.
    pub fn resolve_path(&self, url: &str) -> OutboxResult<PathBuf> {
        let rest = match url.get(..6) {
            Some(scheme) if scheme.eq_ignore_ascii_case("smb://") => &url[6..],
            _ => url.trim_start_matches(&['\\', '/'][..]),
        };

        let segments: Vec<&str> = rest
            .split(&['/', '\\'][..])
            .filter(|s| !s.is_empty())
            .collect();

        if segments.iter().any(|s| *s == "." || *s == ".." || s.contains(':')) {
            return Err(OutboxError::FileShare(format!("invalid share path: {}", url)));
        }
        if segments.len() < 3 {
            return Err(OutboxError::FileShare(format!(
                "share path needs host, share and file: {}",
                url
            )));
        }

        Ok(segments
            .iter()
            .fold(self.mount_root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait]
impl FileShareWriter for MountedShareWriter {
    async fn write_line(&self, request: &FileShareWriteRequest) -> OutboxResult<()> {
        let path = self.resolve_path(&request.url)?;
        let line = if request.encrypt {
            seal_line(&request.passphrase, &request.key_alias, &request.line)?
        } else {
            request.line.clone()
        };
        if request.protect_document {
            debug!("Document protection does not apply to line files; ignoring");
        }

        let attempts = request.retries.max(1);
        let delay = Duration::from_millis(request.retry_delay_ms);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let target = path.clone();
            let content = line.clone();
            let atomic = request.atomic;
            let result = tokio::task::spawn_blocking(move || append_line(&target, &content, atomic))
                .await
                .map_err(|e| OutboxError::FileShare(format!("write task failed: {}", e)))?;

            match result {
                Ok(()) => {
                    debug!(path = %path.display(), attempt, "Appended share line");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        path = %path.display(),
                        attempt,
                        delay_ms = request.retry_delay_ms,
                        error = %e,
                        "Share write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.mount_root.is_dir()
    }
}

/// Append `line` plus a newline, creating the file and its directories.
fn append_line(path: &Path, line: &str, atomic: bool) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    if !atomic {
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        return file.sync_all();
    }

    let mut content = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };
    content.extend_from_slice(line.as_bytes());
    content.push(b'\n');
    atomic_replace(path, &content)
}

/// Replace `path` through a synced temporary sibling and a rename.
fn atomic_replace(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;

    let tmp_path = dir.join(format!(
        ".{}.kiosk.tmp.{}",
        file_name,
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Ok(parent_dir) = fs::File::open(dir) {
            let _ = parent_dir.sync_all();
        }
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn derive_key(passphrase: &str, key_alias: &str) -> OutboxResult<[u8; 32]> {
    if passphrase.is_empty() {
        return Err(OutboxError::Crypto("encryption requires a passphrase".into()));
    }
    let hkdf = Hkdf::<Sha256>::new(Some(key_alias.as_bytes()), passphrase.as_bytes());
    let mut key = [0u8; 32];
    hkdf.expand(KEY_INFO, &mut key)
        .map_err(|e| OutboxError::Crypto(e.to_string()))?;
    Ok(key)
}

/// Encrypt a line as base64 of `nonce || ciphertext`.
pub fn seal_line(passphrase: &str, key_alias: &str, line: &str) -> OutboxResult<String> {
    let key = derive_key(passphrase, key_alias)?;
    let cipher =
        ChaCha20Poly1305::new_from_slice(&key).map_err(|e| OutboxError::Crypto(e.to_string()))?;

    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), line.as_bytes())
        .map_err(|e| OutboxError::Crypto(e.to_string()))?;

    let mut sealed = nonce.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(sealed))
}

/// Reverse of [`seal_line`].
pub fn open_sealed_line(passphrase: &str, key_alias: &str, sealed: &str) -> OutboxResult<String> {
    let key = derive_key(passphrase, key_alias)?;
    let bytes = BASE64
        .decode(sealed.trim())
        .map_err(|e| OutboxError::Crypto(format!("base64 decode failed: {}", e)))?;
    if bytes.len() <= NONCE_SIZE {
        return Err(OutboxError::Crypto("sealed line too short".into()));
    }

    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
    let cipher =
        ChaCha20Poly1305::new_from_slice(&key).map_err(|e| OutboxError::Crypto(e.to_string()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| OutboxError::Crypto(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| OutboxError::Crypto(e.to_string()))
}
