//! Whisper model alias table and spec normalization.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Known whisper.cpp model aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub alias: &'static str,
    pub filename: &'static str,
    pub description: &'static str,
}

/// Available whisper models
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        alias: "tiny",
        filename: "ggml-tiny.bin",
        description: "~75 MB - Fastest, lower quality",
    },
    ModelInfo {
        alias: "tiny.en",
        filename: "ggml-tiny.en.bin",
        description: "~75 MB - English only",
    },
    ModelInfo {
        alias: "base",
        filename: "ggml-base.bin",
        description: "~142 MB - Fast, decent quality",
    },
    ModelInfo {
        alias: "base.en",
        filename: "ggml-base.en.bin",
        description: "~142 MB - English only",
    },
    ModelInfo {
        alias: "small",
        filename: "ggml-small.bin",
        description: "~466 MB - Balanced",
    },
    ModelInfo {
        alias: "small.en",
        filename: "ggml-small.en.bin",
        description: "~466 MB - English only",
    },
    ModelInfo {
        alias: "medium",
        filename: "ggml-medium.bin",
        description: "~1.5 GB - Better quality, slower",
    },
    ModelInfo {
        alias: "medium.en",
        filename: "ggml-medium.en.bin",
        description: "~1.5 GB - English only",
    },
    ModelInfo {
        alias: "large",
        filename: "ggml-large-v2.bin",
        description: "~2.9 GB - Same as large-v2",
    },
    ModelInfo {
        alias: "large-v2",
        filename: "ggml-large-v2.bin",
        description: "~2.9 GB - High quality",
    },
    ModelInfo {
        alias: "large-v3",
        filename: "ggml-large-v3.bin",
        description: "~2.9 GB - Highest quality, slowest",
    },
    ModelInfo {
        alias: "large-v3-turbo",
        filename: "ggml-large-v3-turbo.bin",
        description: "~1.5 GB - Near large-v3 quality, much faster",
    },
];

/// Extensions treated as an explicit model filename.
pub const MODEL_EXTENSIONS: &[&str] = &[".bin", ".gguf"];

/// Extension appended to unknown bare specs.
pub const DEFAULT_EXTENSION: &str = ".bin";

/// Suffix of an in-progress download. Never a usable artifact.
pub const PART_SUFFIX: &str = ".part";

/// Resolve a model spec to its canonical on-disk filename.
///
/// The result is always a single path component.
pub fn canonical_filename(spec: &str) -> String {
    let trimmed = spec.trim();
    let lower = trimmed.to_lowercase();

    let name = if MODEL_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        trimmed.to_string()
    } else if let Some(info) = MODELS.iter().find(|m| m.alias == lower) {
        info.filename.to_string()
    } else {
        format!("{trimmed}{DEFAULT_EXTENSION}")
    };

    Path::new(&name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
        .unwrap_or(name)
}

/// Download URLs for `filename`, one per mirror, in mirror order.
pub fn candidate_urls(mirrors: &[String], filename: &str) -> Vec<String> {
    mirrors
        .iter()
        .map(|base| format!("{}/{}", base.trim_end_matches('/'), filename))
        .collect()
}

/// Whether `path` holds a usable artifact (regular file, non-zero size).
pub fn is_installed(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
}

/// Installation status of one catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    #[serde(flatten)]
    pub info: ModelInfo,
    pub path: PathBuf,
    pub installed: bool,
}

/// List every known alias with its installation status in `models_dir`.
pub fn list_models(models_dir: &Path) -> Vec<ModelStatus> {
    MODELS
        .iter()
        .map(|info| {
            let path = models_dir.join(info.filename);
            ModelStatus {
                info: *info,
                installed: is_installed(&path),
                path,
            }
        })
        .collect()
}
