//! Error taxonomy for the media-to-transcript pipeline.
//!
//! Acquisition errors (`InvalidUrl`, `UnsupportedMediaType`, `Fetch`,
//! `NoValidMedia`, `ModelDownload`) are batch-fatal. Decode and engine errors
//! are recorded against a single batch item and never abort its siblings.

use std::fmt;

/// Errors produced by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input is not an `http`/`https` URL or fails to parse.
    #[error("invalid media URL: {0}")]
    InvalidUrl(String),

    /// Downloaded bytes do not sniff as audio or video.
    #[error("unsupported media type for {url}: {detected}")]
    UnsupportedMediaType {
        /// The URL the bytes came from.
        url: String,
        /// The detected MIME type, or `unknown`.
        detected: String,
    },

    /// Network or HTTP failure while fetching media.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Some URLs in a batch download failed.
    #[error("failed to download {} media input(s): {}", .0.len(), FailureList(.0))]
    FetchBatch(Vec<FetchFailure>),

    /// Media resolution produced an empty batch.
    #[error("no valid media found")]
    NoValidMedia,

    /// Every model download candidate failed.
    #[error("download {filename} failed: {reason}")]
    ModelDownload {
        /// Canonical model filename.
        filename: String,
        /// The last underlying failure.
        reason: String,
    },

    /// The external decoder is not on the search path.
    #[error("decoder not available: {0}")]
    DecoderUnavailable(String),

    /// A raw PCM byte stream is not aligned to the 4-byte sample width.
    #[error("PCM stream not aligned to 4-byte samples: {0} trailing byte(s)")]
    Alignment(usize),

    /// The external decoder failed to spawn or exited unsuccessfully.
    #[error("decode error: {0}")]
    Decode(String),

    /// The recognition engine failed.
    #[error("engine error: {0}")]
    Engine(String),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Filesystem I/O.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Network-level failure for a single URL.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Non-200 response.
    #[error("download of {url} failed with status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// A 200 response that carried no bytes.
    #[error("download of {url} returned an empty body")]
    EmptyBody {
        /// Requested URL.
        url: String,
    },

    /// Connection, TLS, timeout or body read failure.
    #[error("download of {url} failed: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        reason: String,
    },
}

/// One failed input in a batch download.
#[derive(Debug)]
pub struct FetchFailure {
    /// The input as supplied by the caller.
    pub input: String,
    /// Why it failed.
    pub error: Error,
}

struct FailureList<'a>(&'a [FetchFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.input, failure.error)?;
        }
        Ok(())
    }
}

impl Error {
    /// Whether this error must abort a whole batch rather than one item.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_)
                | Self::UnsupportedMediaType { .. }
                | Self::Fetch(_)
                | Self::FetchBatch(_)
                | Self::NoValidMedia
                | Self::ModelDownload { .. }
                | Self::Cancelled
        )
    }
}

/// Extension trait to reduce `.map_err()` boilerplate when wrapping foreign errors.
pub trait ResultExt<T> {
    /// Wrap the error as [`Error::Decode`] with a `context` prefix.
    fn decode(self, context: &str) -> Result<T>;
    /// Wrap the error as [`Error::Engine`] with a `context` prefix.
    fn engine(self, context: &str) -> Result<T>;
    /// Wrap the error as [`Error::ModelDownload`] for `filename`.
    fn model_download(self, filename: &str) -> Result<T>;
}

impl<T, E: fmt::Display> ResultExt<T> for std::result::Result<T, E> {
    fn decode(self, context: &str) -> Result<T> {
        self.map_err(|e| Error::Decode(format!("{context}: {e}")))
    }

    fn engine(self, context: &str) -> Result<T> {
        self.map_err(|e| Error::Engine(format!("{context}: {e}")))
    }

    fn model_download(self, filename: &str) -> Result<T> {
        self.map_err(|e| Error::ModelDownload {
            filename: filename.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_batch_lists_every_failed_input() {
        let err = Error::FetchBatch(vec![
            FetchFailure {
                input: "http://a/x.mp4".into(),
                error: Error::Fetch(FetchError::Status {
                    url: "http://a/x.mp4".into(),
                    status: 404,
                }),
            },
            FetchFailure {
                input: "ftp://b".into(),
                error: Error::InvalidUrl("ftp://b".into()),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("failed to download 2 media input(s)"), "{msg}");
        assert!(msg.contains("http://a/x.mp4: download of http://a/x.mp4 failed with status 404"));
        assert!(msg.contains("ftp://b: invalid media URL: ftp://b"));
    }

    #[test]
    fn batch_fatal_classification() {
        assert!(Error::NoValidMedia.is_batch_fatal());
        assert!(
            Error::ModelDownload {
                filename: "ggml-tiny.bin".into(),
                reason: "x".into()
            }
            .is_batch_fatal()
        );
        assert!(!Error::Alignment(3).is_batch_fatal());
        assert!(!Error::Decode("boom".into()).is_batch_fatal());
        assert!(!Error::Engine("boom".into()).is_batch_fatal());
    }

    #[test]
    fn result_ext_decode_context() {
        let err: std::result::Result<(), &str> = Err("exit status 1");
        let mapped = err.decode("ffmpeg");
        assert!(matches!(mapped, Err(Error::Decode(s)) if s == "ffmpeg: exit status 1"));
    }

    #[test]
    fn result_ext_engine_context() {
        let err: std::result::Result<(), &str> = Err("bad model");
        let mapped = err.engine("load model");
        assert!(matches!(mapped, Err(Error::Engine(s)) if s == "load model: bad model"));
    }

    #[test]
    fn result_ext_model_download() {
        let err: std::result::Result<(), &str> = Err("no candidate url worked");
        let mapped = err.model_download("ggml-base.bin");
        assert!(matches!(
            mapped,
            Err(Error::ModelDownload { filename, reason })
                if filename == "ggml-base.bin" && reason == "no candidate url worked"
        ));
    }

    #[test]
    fn alignment_message_reports_trailing_bytes() {
        assert_eq!(
            Error::Alignment(3).to_string(),
            "PCM stream not aligned to 4-byte samples: 3 trailing byte(s)"
        );
    }
}
