//! The external decode capability as an injectable strategy.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::DEFAULT_CHUNK_SAMPLES;

/// Receives decoded samples in order. Returning an error stops decoding.
pub type ChunkSink<'s> = dyn for<'a> FnMut(&'a [f32]) -> Result<()> + Send + 's;

/// Turns a media file into 16 kHz mono `f32` samples.
#[async_trait]
pub trait PcmDecoder: Send + Sync {
    /// Check the decoder can run. Implementations should cache the answer.
    async fn probe(&self) -> Result<()>;

    /// Decode the whole file into memory.
    async fn decode_all(&self, path: &Path, cancel: &CancellationToken) -> Result<Vec<f32>>;

    /// Decode `path` and hand the samples to `on_chunk` in order. An error
    /// returned by `on_chunk` stops decoding and is returned as is.
    ///
    /// The default materializes the whole buffer and slices it.
    async fn decode_streaming(
        &self,
        path: &Path,
        chunk_samples: usize,
        on_chunk: &mut ChunkSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let samples = self.decode_all(path, cancel).await?;
        let size = if chunk_samples == 0 {
            DEFAULT_CHUNK_SAMPLES
        } else {
            chunk_samples
        };
        for chunk in samples.chunks(size) {
            on_chunk(chunk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    /// Only implements `decode_all`, so streaming goes through the default.
    struct Fixed(Vec<f32>);

    #[async_trait]
    impl PcmDecoder for Fixed {
        async fn probe(&self) -> Result<()> {
            Ok(())
        }

        async fn decode_all(&self, _path: &Path, _cancel: &CancellationToken) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn default_streaming_chunks_into_borrowed_state() {
        let decoder = Fixed(vec![0.5; 10]);
        let mut sizes = Vec::new();
        let mut total = 0.0f32;
        let mut sink = |chunk: &[f32]| -> Result<()> {
            sizes.push(chunk.len());
            total += chunk.iter().sum::<f32>();
            Ok(())
        };
        decoder
            .decode_streaming(Path::new("a.mp4"), 4, &mut sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(total, 5.0);
    }

    #[tokio::test]
    async fn default_streaming_stops_on_sink_error() {
        let decoder = Fixed(vec![0.0; 10]);
        let mut calls = 0;
        let mut sink = |_: &[f32]| -> Result<()> {
            calls += 1;
            Err(Error::Engine("full".into()))
        };
        let err = decoder
            .decode_streaming(Path::new("a.mp4"), 0, &mut sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        assert_eq!(calls, 1);
    }
}
