//! Media acquisition: turns a batch of URLs and local paths into local files.
//!
//! ```text
//! inputs ──┬── local path ───────────────┐
//!          └── http(s) URL → downloader ─┴─> slots (request order)
//! ```

mod downloader;
mod sniff;

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use downloader::{FetchOutcome, MediaDownloader};
pub use sniff::{MediaKind, sniff_media};

use crate::error::{Error, FetchFailure, Result};
use crate::types::is_media_url;

/// One input resolved to a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    /// The input exactly as supplied.
    pub input: String,
    /// Local file to decode. Caller-owned for local inputs.
    pub local: PathBuf,
    /// Whether `local` was produced by the downloader.
    pub downloaded: bool,
}

/// Resolves mixed URL/path batches while keeping request order.
#[derive(Debug, Clone)]
pub struct MediaResolver {
    downloader: MediaDownloader,
}

impl MediaResolver {
    pub fn new(downloader: MediaDownloader) -> Self {
        Self { downloader }
    }

    /// Resolve every input to a local file.
    ///
    /// Local paths are passed through without an existence check; a missing
    /// file surfaces later as a decode failure. Any failed URL fails the
    /// whole call with [`Error::FetchBatch`].
    pub async fn resolve(
        &self,
        inputs: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<ResolvedMedia>> {
        if inputs.is_empty() {
            return Err(Error::NoValidMedia);
        }

        let url_slots: Vec<usize> = inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| is_media_url(input))
            .map(|(index, _)| index)
            .collect();

        let mut slots: Vec<Option<ResolvedMedia>> = inputs
            .iter()
            .map(|input| {
                (!is_media_url(input)).then(|| ResolvedMedia {
                    input: input.clone(),
                    local: PathBuf::from(input),
                    downloaded: false,
                })
            })
            .collect();

        if !url_slots.is_empty() {
            debug!(urls = url_slots.len(), "downloading remote media");
            let fetched = self
                .downloader
                .fetch_indexed(url_slots.iter().map(|&i| inputs[i].clone()), cancel)
                .await;

            let mut failures = Vec::new();
            for (&index, result) in url_slots.iter().zip(fetched) {
                match result {
                    Ok(local) => {
                        slots[index] = Some(ResolvedMedia {
                            input: inputs[index].clone(),
                            local,
                            downloaded: true,
                        });
                    }
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(error) => failures.push(FetchFailure {
                        input: inputs[index].clone(),
                        error,
                    }),
                }
            }
            if !failures.is_empty() {
                return Err(Error::FetchBatch(failures));
            }
        }

        let resolved: Vec<ResolvedMedia> = slots.into_iter().flatten().collect();
        if resolved.is_empty() {
            return Err(Error::NoValidMedia);
        }
        Ok(resolved)
    }
}
