//! Pipeline settings, loaded from defaults, `.env` and the process environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::DEFAULT_CHUNK_SAMPLES;

/// Canonical whisper.cpp model source.
pub const DEFAULT_MODEL_MIRROR: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/";

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "medium";

/// Subdirectory of the system temp dir where downloaded media lands.
pub const MEDIA_DIR_NAME: &str = "whisper_media";

/// Settings for every stage of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where model artifacts live.
    pub models_dir: PathBuf,
    /// Where downloaded media is saved.
    pub media_dir: PathBuf,
    /// Model spec used when a request leaves it empty.
    pub default_model: String,
    /// Base URLs tried in order when a model is missing.
    pub model_mirrors: Vec<String>,
    #[serde(with = "secs")]
    pub download_timeout: Duration,
    #[serde(with = "secs")]
    pub media_timeout: Duration,
    #[serde(with = "millis")]
    pub progress_interval: Duration,
    /// Program invoked to decode media to PCM.
    pub decoder_program: String,
    /// Upper bound on items transcribed concurrently within one batch.
    pub max_parallel: usize,
    /// Samples per chunk in streaming decode.
    pub chunk_samples: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./models"),
            media_dir: std::env::temp_dir().join(MEDIA_DIR_NAME),
            default_model: DEFAULT_MODEL.to_string(),
            model_mirrors: vec![DEFAULT_MODEL_MIRROR.to_string()],
            download_timeout: Duration::from_secs(30 * 60),
            media_timeout: Duration::from_secs(30),
            progress_interval: Duration::from_millis(200),
            decoder_program: "ffmpeg".to_string(),
            max_parallel: 1,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
        }
    }
}

/// Load `.env` into the process environment. Existing variables win and a
/// missing file is fine.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

impl PipelineConfig {
    /// Load defaults, then `.env`, then environment overrides.
    pub fn from_env() -> Self {
        load_dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a key lookup. Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("MODELS_DIR") {
            self.models_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("HARK_MEDIA_DIR") {
            self.media_dir = PathBuf::from(dir);
        }
        if let Some(model) = get("HARK_DEFAULT_MODEL") {
            self.default_model = model.trim().to_string();
        }
        if let Some(mirrors) = get("HARK_MODEL_MIRRORS") {
            let parsed: Vec<String> = mirrors
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            if !parsed.is_empty() {
                self.model_mirrors = parsed;
            }
        }
        if let Some(program) = get("HARK_FFMPEG") {
            self.decoder_program = program;
        }
        match get("HARK_MAX_PARALLEL").map(|v| v.trim().parse::<usize>()) {
            Some(Ok(n)) if n > 0 => self.max_parallel = n,
            Some(_) => tracing::warn!("ignoring invalid HARK_MAX_PARALLEL"),
            None => {}
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_service_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.models_dir, PathBuf::from("./models"));
        assert!(config.media_dir.ends_with(MEDIA_DIR_NAME));
        assert_eq!(config.default_model, "medium");
        assert_eq!(config.model_mirrors, vec![DEFAULT_MODEL_MIRROR]);
        assert_eq!(config.max_parallel, 1);
        assert_eq!(config.chunk_samples, 16_000);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = PipelineConfig::default();
        config.apply_env(env(&[
            ("MODELS_DIR", "/var/lib/hark/models"),
            ("HARK_MODEL_MIRRORS", "https://a.example/, ,https://b.example/"),
            ("HARK_MAX_PARALLEL", "4"),
            ("HARK_FFMPEG", "/opt/ffmpeg/bin/ffmpeg"),
        ]));
        assert_eq!(config.models_dir, PathBuf::from("/var/lib/hark/models"));
        assert_eq!(
            config.model_mirrors,
            vec!["https://a.example/", "https://b.example/"]
        );
        assert_eq!(config.max_parallel, 4);
        assert_eq!(config.decoder_program, "/opt/ffmpeg/bin/ffmpeg");
    }

    #[test]
    fn blank_and_invalid_values_are_ignored() {
        let mut config = PipelineConfig::default();
        config.apply_env(env(&[
            ("MODELS_DIR", "  "),
            ("HARK_MAX_PARALLEL", "zero"),
            ("HARK_MODEL_MIRRORS", ","),
        ]));
        assert_eq!(config.models_dir, PathBuf::from("./models"));
        assert_eq!(config.max_parallel, 1);
        assert_eq!(config.model_mirrors, vec![DEFAULT_MODEL_MIRROR]);
    }

    #[test]
    fn deserializes_partial_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"default_model":"small","progress_interval":50}"#).unwrap();
        assert_eq!(config.default_model, "small");
        assert_eq!(config.progress_interval, Duration::from_millis(50));
        assert_eq!(config.decoder_program, "ffmpeg");
    }

    #[test]
    fn invalid_parallelism_is_reported_to_the_subscriber() {
        use std::io::Write;
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let mut config = PipelineConfig::default();
        tracing::subscriber::with_default(subscriber, || {
            config.apply_env(env(&[("HARK_MAX_PARALLEL", "-2")]));
        });

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("ignoring invalid HARK_MAX_PARALLEL"), "{logged}");
        assert_eq!(config.max_parallel, 1);
    }
}
