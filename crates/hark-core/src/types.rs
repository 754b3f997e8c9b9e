//! Core data model shared by the pipeline stages.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sample rate of every PCM buffer produced by the pipeline.
pub const SAMPLE_RATE: u32 = 16_000;

/// Width of one PCM sample in bytes (32-bit float).
pub const SAMPLE_WIDTH: usize = 4;

/// Default streaming chunk size: one second of audio.
pub const DEFAULT_CHUNK_SAMPLES: usize = SAMPLE_RATE as usize;

/// Whether `input` looks like a remote URL (`http://` or `https://`, case-insensitive).
pub fn is_media_url(input: &str) -> bool {
    let lower = input.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// One timestamped span of recognized text, with millisecond offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// A batch transcription request as handed over by the HTTP/RPC layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscribeRequest {
    /// Remote URLs or local paths, in the order results must be reported.
    pub in_paths: Vec<String>,
    /// Model alias (`medium`, `large-v3`) or explicit filename (`ggml-small.bin`).
    #[serde(default)]
    pub model: String,
    /// Language code, or empty / `auto` for detection.
    #[serde(default)]
    pub lang: String,
    /// Engine thread hint; non-positive picks a default.
    #[serde(default, rename = "t")]
    pub threads: i32,
    /// Directory holding model artifacts; empty means `./models`.
    #[serde(default)]
    pub models_dir: PathBuf,
}

/// Result for one input of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTranscript {
    /// The input exactly as the caller supplied it.
    pub path: String,
    pub is_success: bool,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    pub segments: Vec<TranscriptSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemTranscript {
    /// Joined text of every segment.
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Result of a whole batch, one entry per input in request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTranscript {
    pub model_path: PathBuf,
    pub language: String,
    pub threads: usize,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    pub results: Vec<ItemTranscript>,
}

impl BatchTranscript {
    /// Number of items that failed.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success).count()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
