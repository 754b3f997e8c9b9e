//! Content-addressed media downloader.
//!
//! Every URL maps to a stable key (`sha256(url)`, first 16 hex chars). A file
//! named `media_<key>.<ext>` in the save directory is a cache hit and skips
//! the network entirely. New downloads are written to a `.part` sibling and
//! renamed into place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use reqwest::Url;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::sniff::sniff_media;
use crate::error::{Error, FetchError, FetchFailure, Result};
use crate::keyed_lock::KeyedLocks;

/// Prefix of every saved media file.
const FILE_PREFIX: &str = "media_";

/// Maximum URLs fetched at once in a batch.
const MAX_CONCURRENT_FETCHES: usize = 4;

/// Result of a batch download: successes and failures, each in input order.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub paths: Vec<PathBuf>,
    pub failures: Vec<FetchFailure>,
}

impl FetchOutcome {
    /// Collapse into the paths, or a [`Error::FetchBatch`] if anything failed.
    pub fn into_result(self) -> Result<Vec<PathBuf>> {
        if self.failures.is_empty() {
            Ok(self.paths)
        } else {
            Err(Error::FetchBatch(self.failures))
        }
    }
}

/// Downloads media by URL into a save directory.
#[derive(Debug, Clone)]
pub struct MediaDownloader {
    save_dir: PathBuf,
    client: reqwest::Client,
    // One writer per content key; shared by clones
    locks: Arc<KeyedLocks<String>>,
}

impl MediaDownloader {
    /// Create a downloader with its own HTTP client.
    pub fn new(save_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(std::io::Error::other)?;
        Ok(Self::with_client(save_dir, client))
    }

    pub fn with_client(save_dir: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            save_dir: save_dir.into(),
            client,
            locks: Arc::default(),
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Stable content key for a URL.
    pub fn content_key(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        hex[..16].to_string()
    }

    /// Fetch one URL, returning the local path of the saved media.
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<PathBuf> {
        let parsed = validate_url(url)?;
        let key = Self::content_key(url);

        if let Some(existing) = self.find_cached(&key).await? {
            debug!(url, path = %existing.display(), "media cache hit");
            return Ok(existing);
        }

        let _guard = self.locks.lock(key.clone()).await;
        // The same URL may have been saved while we waited
        if let Some(existing) = self.find_cached(&key).await? {
            debug!(url, path = %existing.display(), "media saved by a concurrent fetch");
            return Ok(existing);
        }

        let bytes = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            res = self.download_bytes(parsed, url) => res?,
        };

        let kind = sniff_media(&bytes).map_err(|detected| Error::UnsupportedMediaType {
            url: url.to_string(),
            detected,
        })?;

        tokio::fs::create_dir_all(&self.save_dir).await?;
        let path = self
            .save_dir
            .join(format!("{FILE_PREFIX}{key}.{}", kind.extension));
        let part = self
            .save_dir
            .join(format!("{FILE_PREFIX}{key}.{}.part", kind.extension));

        if let Err(e) = tokio::fs::write(&part, &bytes).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e.into());
        }
        tokio::fs::rename(&part, &path).await?;

        info!(
            url,
            path = %path.display(),
            mime = kind.mime_type,
            bytes = bytes.len(),
            "media downloaded"
        );
        Ok(path)
    }

    /// Fetch every URL, continuing past failures.
    pub async fn fetch_all(&self, urls: &[String], cancel: &CancellationToken) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        let results = self.fetch_indexed(urls.iter().cloned(), cancel).await;
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(path) => outcome.paths.push(path),
                Err(error) => outcome.failures.push(FetchFailure {
                    input: url.clone(),
                    error,
                }),
            }
        }
        outcome
    }

    /// Fetch URLs concurrently; results are aligned with the input order.
    pub(crate) async fn fetch_indexed<I>(
        &self,
        urls: I,
        cancel: &CancellationToken,
    ) -> Vec<Result<PathBuf>>
    where
        I: IntoIterator<Item = String>,
    {
        let urls: Vec<String> = urls.into_iter().collect();
        let mut tagged: Vec<(usize, Result<PathBuf>)> = stream::iter(urls.into_iter().enumerate())
            .map(|(index, url)| async move { (index, self.fetch(&url, cancel).await) })
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;
        tagged.sort_by_key(|(index, _)| *index);
        tagged.into_iter().map(|(_, result)| result).collect()
    }

    async fn download_bytes(&self, url: Url, raw: &str) -> Result<Vec<u8>> {
        let transport = |e: reqwest::Error| {
            Error::Fetch(FetchError::Transport {
                url: raw.to_string(),
                reason: e.to_string(),
            })
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Fetch(FetchError::Status {
                url: raw.to_string(),
                status: status.as_u16(),
            }));
        }
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    async fn find_cached(&self, key: &str) -> Result<Option<PathBuf>> {
        let stem = format!("{FILE_PREFIX}{key}");
        let mut entries = match tokio::fs::read_dir(&self.save_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_match = path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str())
                && path.extension().is_some_and(|ext| ext != "part");
            if is_match && entry.metadata().await.is_ok_and(|m| m.is_file() && m.len() > 0) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

fn validate_url(url: &str) -> Result<Url> {
    if !crate::types::is_media_url(url) {
        return Err(Error::InvalidUrl(url.to_string()));
    }
    let parsed = Url::parse(url.trim()).map_err(|_| Error::InvalidUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(url.to_string()));
    }
    Ok(parsed)
}
