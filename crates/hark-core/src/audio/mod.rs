//! Audio decoding to 16 kHz mono `f32` PCM.
//!
//! ```text
//! .wav ──> hound fast path ──ok──────────────┐
//!            │ not 16 kHz/mono/i16           │
//!            v                               v
//! other ──> PcmDecoder (ffmpeg) ──f32le──> samples / chunks
//! ```

mod decoder;
mod ffmpeg;
mod pcm;
mod wav;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use decoder::{ChunkSink, PcmDecoder};
pub use ffmpeg::FfmpegDecoder;
pub use pcm::{bytes_to_samples, read_pcm_all, read_pcm_stream, samples_to_bytes};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::types::DEFAULT_CHUNK_SAMPLES;

/// Decodes local media files, preferring the WAV fast path.
#[derive(Clone)]
pub struct AudioPipeline {
    decoder: Arc<dyn PcmDecoder>,
    chunk_samples: usize,
}

impl std::fmt::Debug for AudioPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioPipeline")
            .field("chunk_samples", &self.chunk_samples)
            .finish_non_exhaustive()
    }
}

impl AudioPipeline {
    pub fn new(decoder: Arc<dyn PcmDecoder>) -> Self {
        Self {
            decoder,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(Arc::new(FfmpegDecoder::new(config.decoder_program.clone())))
            .with_chunk_samples(config.chunk_samples)
    }

    /// Default chunk size for [`Self::decode_streaming`] when the caller passes 0.
    pub fn with_chunk_samples(mut self, chunk_samples: usize) -> Self {
        if chunk_samples > 0 {
            self.chunk_samples = chunk_samples;
        }
        self
    }

    pub fn decoder(&self) -> &Arc<dyn PcmDecoder> {
        &self.decoder
    }

    /// Decode `path` into one buffer.
    pub async fn decode_all(&self, path: &Path, cancel: &CancellationToken) -> Result<Vec<f32>> {
        if let Some(samples) = try_wav(path).await {
            return Ok(samples);
        }
        self.decoder.decode_all(path, cancel).await
    }

    /// Decode `path` and hand fixed-size chunks to `on_chunk` in order.
    ///
    /// Returning an error from `on_chunk` stops decoding and returns that error.
    pub async fn decode_streaming(
        &self,
        path: &Path,
        chunk_samples: usize,
        on_chunk: &mut ChunkSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let chunk_samples = if chunk_samples == 0 {
            self.chunk_samples
        } else {
            chunk_samples
        };

        if let Some(samples) = try_wav(path).await {
            for chunk in samples.chunks(chunk_samples) {
                on_chunk(chunk)?;
            }
            return Ok(());
        }
        self.decoder
            .decode_streaming(path, chunk_samples, on_chunk, cancel)
            .await
    }
}

/// Run the WAV fast path. `None` means the generic decoder must be used.
async fn try_wav(path: &Path) -> Option<Vec<f32>> {
    if !wav::has_wav_extension(path) {
        return None;
    }
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || wav::read_wav_mono16(&owned)).await {
        Ok(Ok(samples)) => {
            debug!(path = %path.display(), samples = samples.len(), "decoded via WAV fast path");
            Some(samples)
        }
        Ok(Err(reason)) => {
            debug!(path = %path.display(), %reason, "WAV fast path declined, falling back");
            None
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "WAV fast path task failed, falling back");
            None
        }
    }
}
