//! Model Management Module
//!
//! Resolves whisper model specs to on-disk artifacts and downloads them from
//! a list of mirrors when they are missing.
//!
//! # Architecture
//!
//! ```text
//! catalog   - alias table, canonical filenames, mirror URLs
//! store     - ensure(): cached check, per-artifact lock, .part + rename
//! progress  - throttled transfer snapshots, console renderer
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! # async fn demo() -> hark_core::Result<()> {
//! use std::path::Path;
//! use std::time::Duration;
//! use hark_core::model::{ConsoleProgress, ModelStore};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = ModelStore::new(
//!     vec![hark_core::config::DEFAULT_MODEL_MIRROR.to_string()],
//!     Duration::from_secs(1800),
//!     Duration::from_millis(200),
//! )?;
//! let bar = ConsoleProgress::default();
//! let model = store
//!     .ensure(Path::new("./models"), "small", Some(&bar), &CancellationToken::new())
//!     .await?;
//! println!("{}", model.path.display());
//! # Ok(())
//! # }
//! ```

mod catalog;
mod progress;
mod store;

pub use catalog::{
    DEFAULT_EXTENSION, MODEL_EXTENSIONS, MODELS, ModelInfo, ModelStatus, PART_SUFFIX,
    candidate_urls, canonical_filename, is_installed, list_models,
};
pub use progress::{
    ConsoleProgress, ProgressSink, TransferProgress, human_bytes, render_line, short_duration,
};
pub use store::{DEFAULT_MODELS_DIR, EnsuredModel, ModelStore};

// Re-export default model name for convenience
pub const DEFAULT_MODEL: &str = crate::config::DEFAULT_MODEL;
