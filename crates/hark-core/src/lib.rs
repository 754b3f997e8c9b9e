pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
mod keyed_lock;
pub mod media;
pub mod model;
pub mod transcribe;
pub mod types;
pub mod verbose;

pub use audio::{AudioPipeline, FfmpegDecoder, PcmDecoder};
pub use config::PipelineConfig;
pub use engine::{RecognitionEngine, RecognizerSession, UnavailableEngine, default_engine};
#[cfg(feature = "whisper")]
pub use engine::WhisperEngine;
pub use error::{Error, FetchError, FetchFailure, Result, ResultExt};
pub use media::{MediaDownloader, MediaResolver, ResolvedMedia};
pub use model::{ConsoleProgress, EnsuredModel, ModelStore, ProgressSink, TransferProgress};
pub use transcribe::Transcriber;
pub use types::{
    BatchTranscript, ItemTranscript, SAMPLE_RATE, TranscribeRequest, TranscriptSegment,
};
pub use verbose::{init_logging, set_verbose};
