//! Raw `f32le` PCM byte streams.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::types::{DEFAULT_CHUNK_SAMPLES, SAMPLE_WIDTH};

/// Reinterpret little-endian 32-bit float bytes as samples.
///
/// Fails with [`Error::Alignment`] instead of dropping a trailing partial sample.
pub fn bytes_to_samples(bytes: &[u8]) -> Result<Vec<f32>> {
    let mut samples = Vec::with_capacity(bytes.len() / SAMPLE_WIDTH);
    extend_samples(&mut samples, bytes)?;
    Ok(samples)
}

fn extend_samples(samples: &mut Vec<f32>, bytes: &[u8]) -> Result<()> {
    let trailing = bytes.len() % SAMPLE_WIDTH;
    if trailing != 0 {
        return Err(Error::Alignment(trailing));
    }
    samples.extend(
        bytes
            .chunks_exact(SAMPLE_WIDTH)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
    );
    Ok(())
}

/// Read a whole PCM stream into memory.
pub async fn read_pcm_all<R>(reader: &mut R) -> Result<Vec<f32>>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await?;
    bytes_to_samples(&bytes)
}

/// Deliver a PCM stream as chunks of `chunk_samples` samples.
///
/// Every chunk is full except possibly the last. A zero chunk size means one
/// second of audio. The stream stops at the first error returned by `on_chunk`.
pub async fn read_pcm_stream<R, F>(reader: &mut R, chunk_samples: usize, mut on_chunk: F) -> Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&[f32]) -> Result<()>,
{
    let chunk_samples = if chunk_samples == 0 {
        DEFAULT_CHUNK_SAMPLES
    } else {
        chunk_samples
    };
    let mut buf = vec![0u8; chunk_samples * SAMPLE_WIDTH];
    let mut samples = Vec::with_capacity(chunk_samples);

    loop {
        let n = fill(reader, &mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        samples.clear();
        extend_samples(&mut samples, &buf[..n])?;
        on_chunk(&samples)?;
        if n < buf.len() {
            return Ok(());
        }
    }
}

/// Read until `buf` is full or the stream ends.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Encode samples as `f32le` bytes.
pub fn samples_to_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32 / len as f32).collect()
    }

    #[test]
    fn converts_le_floats() {
        let bytes = samples_to_bytes(&[1.0, -0.5]);
        assert_eq!(bytes[..4], [0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(bytes_to_samples(&bytes).unwrap(), vec![1.0, -0.5]);
    }

    #[test]
    fn misaligned_bytes_are_rejected() {
        let mut bytes = samples_to_bytes(&[0.25; 3]);
        bytes.push(0);
        assert!(matches!(bytes_to_samples(&bytes), Err(Error::Alignment(1))));
        assert!(matches!(bytes_to_samples(&[1, 2, 3]), Err(Error::Alignment(3))));
    }

    #[tokio::test]
    async fn read_all_rejects_misaligned_stream() {
        let mut bytes = samples_to_bytes(&ramp(10));
        bytes.truncate(bytes.len() - 2);
        let err = read_pcm_all(&mut bytes.as_slice()).await.unwrap_err();
        assert!(matches!(err, Error::Alignment(2)));
    }

    #[tokio::test]
    async fn streams_two_and_a_half_seconds_as_three_chunks() {
        let samples = ramp(40_000);
        let bytes = samples_to_bytes(&samples);
        let mut sizes = Vec::new();
        let mut collected = Vec::new();
        read_pcm_stream(&mut bytes.as_slice(), 16_000, |chunk| {
            sizes.push(chunk.len());
            collected.extend_from_slice(chunk);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(sizes, vec![16_000, 16_000, 8_000]);
        assert_eq!(collected, samples);
    }

    #[tokio::test]
    async fn zero_chunk_size_defaults_to_one_second() {
        let bytes = samples_to_bytes(&ramp(32_000));
        let mut sizes = Vec::new();
        read_pcm_stream(&mut bytes.as_slice(), 0, |chunk| {
            sizes.push(chunk.len());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(sizes, vec![16_000, 16_000]);
    }

    #[tokio::test]
    async fn short_reads_are_coalesced_into_full_chunks() {
        let samples = ramp(100);
        let bytes = samples_to_bytes(&samples);
        let (mut tx, mut rx) = tokio::io::duplex(7);
        let writer = tokio::spawn(async move {
            tx.write_all(&bytes).await.unwrap();
        });

        let mut sizes = Vec::new();
        read_pcm_stream(&mut rx, 30, |chunk| {
            sizes.push(chunk.len());
            Ok(())
        })
        .await
        .unwrap();
        writer.await.unwrap();
        assert_eq!(sizes, vec![30, 30, 30, 10]);
    }

    #[tokio::test]
    async fn misaligned_tail_fails_after_full_chunks() {
        let mut bytes = samples_to_bytes(&ramp(20));
        bytes.push(0xff);
        let mut delivered = 0;
        let err = read_pcm_stream(&mut bytes.as_slice(), 8, |chunk| {
            delivered += chunk.len();
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Alignment(1)));
        assert_eq!(delivered, 16);
    }

    #[tokio::test]
    async fn callback_error_stops_the_stream() {
        let bytes = samples_to_bytes(&ramp(64));
        let mut calls = 0;
        let err = read_pcm_stream(&mut bytes.as_slice(), 16, |_| {
            calls += 1;
            if calls == 2 {
                Err(Error::Decode("consumer gave up".into()))
            } else {
                Ok(())
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Decode(ref m) if m == "consumer gave up"));
        assert_eq!(calls, 2);
    }
}
