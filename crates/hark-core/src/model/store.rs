//! Model artifact acquisition.
//!
//! A model is downloaded to `<canonical>.part` and renamed into place only
//! after the body has been fully written, so readers never observe a
//! truncated artifact under its canonical name. Concurrent `ensure` calls for
//! the same artifact within one process are serialized; across processes the
//! atomic rename keeps a losing writer harmless.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::catalog::{PART_SUFFIX, candidate_urls, canonical_filename};
use super::progress::{ProgressSink, ProgressTracker};
use crate::config::PipelineConfig;
use crate::error::{Error, FetchError, Result};
use crate::keyed_lock::KeyedLocks;

const USER_AGENT: &str = concat!("hark-modelstore/", env!("CARGO_PKG_VERSION"));

/// Directory used when the caller passes an empty models dir.
pub const DEFAULT_MODELS_DIR: &str = "./models";

/// A model artifact that is present on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredModel {
    pub path: PathBuf,
    /// Whether this call performed the download.
    pub downloaded: bool,
}

/// Resolves model specs to on-disk artifacts, downloading them when missing.
#[derive(Debug)]
pub struct ModelStore {
    client: reqwest::Client,
    mirrors: Vec<String>,
    progress_interval: Duration,
    locks: KeyedLocks<PathBuf>,
}

impl ModelStore {
    pub fn new(mirrors: Vec<String>, timeout: Duration, progress_interval: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(std::io::Error::other)?;
        Ok(Self {
            client,
            mirrors,
            progress_interval,
            locks: KeyedLocks::default(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            config.model_mirrors.clone(),
            config.download_timeout,
            config.progress_interval,
        )
    }

    /// Canonical path `spec` resolves to inside `models_dir`.
    pub fn resolve_path(models_dir: &Path, spec: &str) -> PathBuf {
        let dir = if models_dir.as_os_str().is_empty() {
            Path::new(DEFAULT_MODELS_DIR)
        } else {
            models_dir
        };
        dir.join(canonical_filename(spec))
    }

    /// Make sure the artifact for `spec` exists in `models_dir`.
    ///
    /// An existing non-empty file returns immediately without network I/O.
    pub async fn ensure(
        &self,
        models_dir: &Path,
        spec: &str,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<EnsuredModel> {
        let path = Self::resolve_path(models_dir, spec);
        if installed(&path).await {
            debug!(path = %path.display(), "model already present");
            return Ok(EnsuredModel {
                path,
                downloaded: false,
            });
        }

        let _guard = self.locks.lock(path.clone()).await;

        // Another task may have finished the download while we waited
        if installed(&path).await {
            return Ok(EnsuredModel {
                path,
                downloaded: false,
            });
        }

        let filename = canonical_filename(spec);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let part = part_path(&path);
        let mut last_error: Option<Error> = None;
        for url in candidate_urls(&self.mirrors, &filename) {
            info!(url = %url, dest = %path.display(), "downloading model");
            match self.download_to(&url, &part, progress, cancel).await {
                Ok(bytes) => {
                    tokio::fs::rename(&part, &path).await.map_err(|e| Error::ModelDownload {
                        filename: filename.clone(),
                        reason: format!("rename: {e}"),
                    })?;
                    info!(path = %path.display(), bytes, "model installed");
                    return Ok(EnsuredModel {
                        path,
                        downloaded: true,
                    });
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(url = %url, error = %e, "model download attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(Error::ModelDownload {
            filename,
            reason: last_error.map_or_else(
                || "no candidate url worked".to_string(),
                |e| e.to_string(),
            ),
        })
    }

    /// Stream `url` into `dst`. Removes `dst` on any failure.
    async fn download_to(
        &self,
        url: &str,
        dst: &Path,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let result = tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            res = self.stream_to(url, dst, progress) => res,
        };
        if result.is_err() {
            let _ = tokio::fs::remove_file(dst).await;
        }
        result
    }

    async fn stream_to(
        &self,
        url: &str,
        dst: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<u64> {
        let transport = |e: reqwest::Error| {
            Error::Fetch(FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            // Drain so the connection can be reused
            let _ = response.bytes().await;
            return Err(Error::Fetch(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }));
        }

        let mut tracker = ProgressTracker::new(
            short_name(url),
            response.content_length(),
            self.progress_interval,
        );
        let mut file = BufWriter::new(tokio::fs::File::create(dst).await?);
        let mut body = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(transport)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            tracker.advance(chunk.len(), progress);
        }
        file.flush().await?;
        file.into_inner().sync_all().await?;
        tracker.finish(progress);

        if written == 0 {
            return Err(Error::Fetch(FetchError::EmptyBody {
                url: url.to_string(),
            }));
        }
        Ok(written)
    }
}

/// Async form of [`is_installed`](super::catalog::is_installed).
async fn installed(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

fn short_name(url: &str) -> &str {
    match url.rfind('/') {
        Some(i) if i + 1 < url.len() => &url[i + 1..],
        _ => url,
    }
}
