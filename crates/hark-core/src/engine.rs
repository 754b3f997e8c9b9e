//! Recognition engine seam.
//!
//! The orchestrator treats the engine as opaque: load a model, set language
//! and threads, feed 16 kHz mono samples, get timestamped segments back.
//! Calls are blocking and run on the blocking thread pool.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::TranscriptSegment;

/// Loads model artifacts into recognizer sessions.
pub trait RecognitionEngine: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn load(&self, model: &Path) -> Result<Box<dyn RecognizerSession>>;
}

/// One loaded model, used for a single input.
pub trait RecognizerSession {
    /// `auto` asks the engine to detect the language.
    fn set_language(&mut self, language: &str);

    fn set_threads(&mut self, threads: usize);

    /// Recognize `samples`, returning segments ordered by start time.
    fn process(&mut self, samples: &[f32]) -> Result<Vec<TranscriptSegment>>;
}

/// The engine compiled into this build.
pub fn default_engine() -> Arc<dyn RecognitionEngine> {
    #[cfg(feature = "whisper")]
    {
        Arc::new(whisper::WhisperEngine::default())
    }
    #[cfg(not(feature = "whisper"))]
    {
        Arc::new(UnavailableEngine)
    }
}

/// Placeholder used when no engine backend is compiled in. Every load fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableEngine;

impl RecognitionEngine for UnavailableEngine {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn load(&self, _model: &Path) -> Result<Box<dyn RecognizerSession>> {
        Err(Error::Engine(
            "built without a recognition backend (enable the `whisper` feature)".into(),
        ))
    }
}

#[cfg(feature = "whisper")]
pub use whisper::WhisperEngine;

#[cfg(feature = "whisper")]
mod whisper {
    use std::path::Path;
    use std::sync::Once;

    use whisper_rs::{
        FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
    };

    use super::{RecognitionEngine, RecognizerSession};
    use crate::error::{Error, Result, ResultExt};
    use crate::types::TranscriptSegment;

    static LOG_HOOKS: Once = Once::new();

    /// whisper.cpp via whisper-rs.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WhisperEngine;

    impl RecognitionEngine for WhisperEngine {
        fn name(&self) -> &'static str {
            "whisper"
        }

        fn load(&self, model: &Path) -> Result<Box<dyn RecognizerSession>> {
            // Route whisper.cpp logging away from stdout
            LOG_HOOKS.call_once(whisper_rs::install_logging_hooks);

            let model_str = model
                .to_str()
                .ok_or_else(|| Error::Engine(format!("non UTF-8 model path: {}", model.display())))?;
            let ctx = WhisperContext::new_with_params(model_str, WhisperContextParameters::default())
                .engine("failed to load whisper model")?;
            let state = ctx.create_state().engine("failed to create whisper state")?;

            Ok(Box::new(WhisperSession {
                state,
                language: "auto".to_string(),
                threads: 1,
            }))
        }
    }

    struct WhisperSession {
        state: WhisperState,
        language: String,
        threads: usize,
    }

    impl RecognizerSession for WhisperSession {
        fn set_language(&mut self, language: &str) {
            self.language = language.to_string();
        }

        fn set_threads(&mut self, threads: usize) {
            self.threads = threads.max(1);
        }

        fn process(&mut self, samples: &[f32]) -> Result<Vec<TranscriptSegment>> {
            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_language(Some(&self.language));
            params.set_n_threads(i32::try_from(self.threads).unwrap_or(i32::MAX));
            params.set_print_special(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);

            self.state
                .full(params, samples)
                .engine("transcription failed")?;

            let mut segments = Vec::new();
            for i in 0..self.state.full_n_segments() {
                let Some(segment) = self.state.get_segment(i) else {
                    continue;
                };
                let text = segment.to_str().engine("segment text")?.to_string();
                // whisper.cpp timestamps are in centiseconds
                segments.push(TranscriptSegment {
                    start_ms: centis_to_ms(segment.start_timestamp()),
                    end_ms: centis_to_ms(segment.end_timestamp()),
                    text,
                });
            }
            Ok(segments)
        }
    }

    fn centis_to_ms(t: i64) -> u64 {
        u64::try_from(t).unwrap_or(0) * 10
    }
}
