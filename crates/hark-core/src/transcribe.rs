//! Batch transcription orchestrator.
//!
//! Media resolution and model acquisition are batch-fatal. After that every
//! input gets exactly one [`ItemTranscript`], in request order, and a failing
//! item never affects its siblings.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use futures_util::stream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audio::AudioPipeline;
use crate::config::PipelineConfig;
use crate::engine::RecognitionEngine;
use crate::error::{Error, Result, ResultExt};
use crate::media::{MediaDownloader, MediaResolver, ResolvedMedia};
use crate::model::{ModelStore, ProgressSink};
use crate::types::{BatchTranscript, ItemTranscript, TranscribeRequest, TranscriptSegment};

/// Language passed to the engine when the request leaves it blank.
pub const AUTO_LANGUAGE: &str = "auto";

/// Upper bound for the default engine thread count.
const MAX_DEFAULT_THREADS: usize = 8;

/// Drives media resolution, model acquisition, decode and recognition.
pub struct Transcriber {
    resolver: MediaResolver,
    models: ModelStore,
    audio: AudioPipeline,
    engine: Arc<dyn RecognitionEngine>,
    default_model: String,
    max_parallel: usize,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl Transcriber {
    pub fn new(
        resolver: MediaResolver,
        models: ModelStore,
        audio: AudioPipeline,
        engine: Arc<dyn RecognitionEngine>,
    ) -> Self {
        Self {
            resolver,
            models,
            audio,
            engine,
            default_model: crate::config::DEFAULT_MODEL.to_string(),
            max_parallel: 1,
            progress: None,
        }
    }

    /// Build every stage from `config`, using ffmpeg for decoding.
    pub fn from_config(config: &PipelineConfig, engine: Arc<dyn RecognitionEngine>) -> Result<Self> {
        let downloader = MediaDownloader::new(&config.media_dir, config.media_timeout)?;
        Ok(Self::new(
            MediaResolver::new(downloader),
            ModelStore::from_config(config)?,
            AudioPipeline::from_config(config),
            engine,
        )
        .with_default_model(config.default_model.clone())
        .with_max_parallel(config.max_parallel))
    }

    /// Model spec used when a request leaves `model` blank.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Items transcribed concurrently. Results keep request order regardless.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Receive model download progress.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn audio(&self) -> &AudioPipeline {
        &self.audio
    }

    pub fn engine(&self) -> &Arc<dyn RecognitionEngine> {
        &self.engine
    }

    /// Transcribe every input of `req`.
    pub async fn transcribe_batch(
        &self,
        req: &TranscribeRequest,
        cancel: &CancellationToken,
    ) -> Result<BatchTranscript> {
        let started = Instant::now();

        let media = self.resolver.resolve(&req.in_paths, cancel).await?;

        let spec = self.model_spec(&req.model);
        let model = self
            .models
            .ensure(&req.models_dir, spec, self.progress.as_deref(), cancel)
            .await?;

        let language = normalize_language(&req.lang);
        let threads = resolve_threads(req.threads);
        info!(
            inputs = media.len(),
            model = %model.path.display(),
            language = %language,
            threads,
            engine = self.engine.name(),
            "starting batch"
        );

        let results: Vec<ItemTranscript> = stream::iter(media)
            .map(|item| self.transcribe_item(item, &model.path, &language, threads, cancel))
            .buffered(self.max_parallel)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let batch = BatchTranscript {
            model_path: model.path,
            language,
            threads,
            duration: started.elapsed(),
            results,
        };
        info!(
            items = batch.results.len(),
            failed = batch.failed(),
            duration_ms = batch.duration.as_millis() as u64,
            "batch finished"
        );
        Ok(batch)
    }

    /// The requested model, or the default when the request leaves it blank.
    fn model_spec<'a>(&'a self, requested: &'a str) -> &'a str {
        if requested.trim().is_empty() {
            &self.default_model
        } else {
            requested
        }
    }

    async fn transcribe_item(
        &self,
        item: ResolvedMedia,
        model: &Path,
        language: &str,
        threads: usize,
        cancel: &CancellationToken,
    ) -> ItemTranscript {
        let started = Instant::now();
        let outcome = self
            .recognize(&item.local, model, language, threads, cancel)
            .await;
        let duration = started.elapsed();

        match outcome {
            Ok(segments) => {
                info!(
                    input = %item.input,
                    segments = segments.len(),
                    duration_ms = duration.as_millis() as u64,
                    "item transcribed"
                );
                ItemTranscript {
                    path: item.input,
                    is_success: true,
                    duration,
                    segments,
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    input = %item.input,
                    error = %e,
                    duration_ms = duration.as_millis() as u64,
                    "item failed"
                );
                ItemTranscript {
                    path: item.input,
                    is_success: false,
                    duration,
                    segments: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn recognize(
        &self,
        local: &Path,
        model: &Path,
        language: &str,
        threads: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<TranscriptSegment>> {
        let samples = self.audio.decode_all(local, cancel).await?;

        let engine = Arc::clone(&self.engine);
        let model = model.to_path_buf();
        let language = language.to_string();
        tokio::task::spawn_blocking(move || {
            let mut session = engine.load(&model)?;
            session.set_language(&language);
            session.set_threads(threads);
            session.process(&samples)
        })
        .await
        .engine("recognition task failed")?
    }
}

/// Blank means auto-detect.
pub fn normalize_language(lang: &str) -> String {
    let lang = lang.trim();
    if lang.is_empty() {
        AUTO_LANGUAGE.to_string()
    } else {
        lang.to_lowercase()
    }
}

/// Non-positive hints become the available CPU count, capped at 8.
pub fn resolve_threads(hint: i32) -> usize {
    match usize::try_from(hint) {
        Ok(n) if n > 0 => n,
        _ => std::thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .min(MAX_DEFAULT_THREADS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_language_is_auto() {
        assert_eq!(normalize_language(""), "auto");
        assert_eq!(normalize_language("  "), "auto");
        assert_eq!(normalize_language(" EN "), "en");
    }

    #[test]
    fn thread_hint_defaults_are_bounded() {
        assert_eq!(resolve_threads(3), 3);
        let default = resolve_threads(0);
        assert!((1..=MAX_DEFAULT_THREADS).contains(&default));
        assert_eq!(resolve_threads(-4), default);
    }

    #[test]
    fn blank_model_uses_configured_default() {
        let config = PipelineConfig {
            default_model: "small".into(),
            ..Default::default()
        };
        let transcriber =
            Transcriber::from_config(&config, Arc::new(crate::engine::UnavailableEngine)).unwrap();
        assert_eq!(transcriber.model_spec(""), "small");
        assert_eq!(transcriber.model_spec("  "), "small");
        assert_eq!(transcriber.model_spec("tiny"), "tiny");
    }
}
