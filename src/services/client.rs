//! Client side of sharing: seal a file, upload it, and turn the returned id
//! into a reference path; or resolve a reference path back into the file.
//!
//! Keys are generated here and never sent to the server.

use crate::{
    models::{archive::Archive, reference_path::ReferencePath},
    routes::routes::{CREATE_OBJECT, object_path},
    services::crypto::{self, KeyMaterial},
};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// What the sender is told about a successful share.
#[derive(Debug, Clone)]
pub struct ShareReceipt {
    pub name: String,
    pub size: usize,
    pub sha256: String,
    pub expiry: DateTime<Utc>,
    pub reference: ReferencePath,
}

/// What the receiver gets back after a download.
#[derive(Debug, Clone)]
pub struct Download {
    pub path: PathBuf,
    pub size: usize,
}

pub struct Client {
    http: reqwest::Client,
}

impl Client {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("Soubise/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building http client")?;
        Ok(Self { http })
    }

    /// Encrypt `file`, upload it to `server` and return the reference path.
    pub async fn share(
        &self,
        file: &Path,
        lifetime: chrono::Duration,
        server: &str,
    ) -> Result<ShareReceipt> {
        let key = KeyMaterial::generate();
        let (archive, size, sha256) = prepare_shareable(file, &key, lifetime).await?;
        let id = self.upload(server, &archive).await?;

        Ok(ShareReceipt {
            name: archive.name().to_string(),
            size,
            sha256,
            expiry: archive.expiry(),
            reference: ReferencePath::new(server, id, key.to_base64()),
        })
    }

    /// POST a serialized archive and return the id the server issued.
    pub async fn upload(&self, server: &str, archive: &Archive) -> Result<String> {
        let url = endpoint(server, CREATE_OBJECT);
        debug!(url = %url, "uploading archive");
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(archive.to_bytes()?)
            .send()
            .await
            .with_context(|| format!("unable to reach {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("server did not process request successfully: {status}");
        }
        let id = response
            .text()
            .await
            .context("unable to read response from server")?;
        Ok(id.trim().to_string())
    }

    /// GET and decode the archive a reference path points at.
    pub async fn download(&self, reference: &ReferencePath) -> Result<Archive> {
        let url = endpoint(&reference.server, &object_path(&reference.id));
        debug!(url = %url, "downloading archive");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("unable to download from {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("server did not process request successfully: {status}");
        }
        let body = response.bytes().await.context("unable to read response")?;
        Archive::from_bytes(&body).context("unable to understand archive")
    }

    /// Resolve `reference_path`, decrypt the archive and write it into
    /// `dest_dir` under its original name.
    pub async fn get(&self, reference_path: &str, dest_dir: &Path) -> Result<Download> {
        let reference = ReferencePath::decode(reference_path)?;
        let key = KeyMaterial::from_base64(&reference.encryption_key)
            .context("unable to decode encryption key")?;

        let archive = self.download(&reference).await?;
        let plaintext =
            crypto::decrypt(archive.content(), &key).context("unable to decrypt file")?;

        let name = Path::new(archive.name())
            .file_name()
            .with_context(|| format!("archive name `{}` is not a file name", archive.name()))?;
        let path = dest_dir.join(name);
        fs::write(&path, &plaintext)
            .await
            .with_context(|| format!("unable to write {}", path.display()))?;

        Ok(Download {
            path,
            size: plaintext.len(),
        })
    }
}

/// Read `file` and seal it into an archive expiring `lifetime` from now.
///
/// Returns the archive with the plaintext size and SHA-256 for display.
pub async fn prepare_shareable(
    file: &Path,
    key: &KeyMaterial,
    lifetime: chrono::Duration,
) -> Result<(Archive, usize, String)> {
    let meta = fs::metadata(file)
        .await
        .with_context(|| format!("unable to find {}", file.display()))?;
    if meta.is_dir() {
        bail!(
            "{} looks like a directory, only a specific file can be shared",
            file.display()
        );
    }
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", file.display()))?;

    let content = fs::read(file).await.context("unable to read file")?;
    let checksum = hex::encode(Sha256::digest(&content));

    let sealed = crypto::seal_verified(&content, key).context("unable to encrypt file")?;
    Ok((
        Archive::with_lifetime(name, sealed, lifetime)?,
        content.len(),
        checksum,
    ))
}

fn endpoint(server: &str, path: &str) -> String {
    format!("{}{}", server.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_without_double_slashes() {
        assert_eq!(endpoint("http://h:1/", "/objects"), "http://h:1/objects");
        assert_eq!(endpoint("http://h:1/base", "/objects/x"), "http://h:1/base/objects/x");
    }

    #[tokio::test]
    async fn prepared_archive_decrypts_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fakeFile_here.txt");
        std::fs::write(&file, b"not much how about you").unwrap();

        let key = KeyMaterial::generate();
        let (archive, size, sha256) =
            prepare_shareable(&file, &key, chrono::Duration::hours(24))
                .await
                .unwrap();

        assert_eq!(archive.name(), "fakeFile_here.txt");
        assert_eq!(size, 22);
        assert_eq!(sha256.len(), 64);
        assert!(!archive.has_expired());
        assert_ne!(archive.content(), b"not much how about you");
        assert_eq!(
            crypto::decrypt(archive.content(), &key).unwrap(),
            b"not much how about you"
        );
    }

    #[tokio::test]
    async fn directories_cannot_be_shared() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare_shareable(dir.path(), &KeyMaterial::generate(), chrono::Duration::hours(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("looks like a directory"));
    }
}
