//! FFmpeg subprocess decoder.
//!
//! ffmpeg writes raw `f32le` 16 kHz mono samples to its stdout pipe. The pipe
//! is the backpressure point: a slow consumer leaves ffmpeg blocked on write.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::decoder::{ChunkSink, PcmDecoder};
use super::pcm::{read_pcm_all, read_pcm_stream};
use crate::error::{Error, Result, ResultExt};

/// Decodes media by piping it through an ffmpeg binary.
#[derive(Debug)]
pub struct FfmpegDecoder {
    program: String,
    probed: OnceCell<std::result::Result<(), String>>,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegDecoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            probed: OnceCell::new(),
        }
    }

    fn spawn(&self, path: &Path) -> Result<(Child, JoinHandle<String>)> {
        let mut child = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-vn", "-ac", "1", "-ar", "16000", "-f", "f32le", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .decode(&format!("failed to spawn {}", self.program))?;

        let stderr = collect_stderr(child.stderr.take());
        debug!(program = %self.program, path = %path.display(), "decoder spawned");
        Ok((child, stderr))
    }

    fn failure(&self, status: ExitStatus, stderr: &str) -> Error {
        Error::Decode(format!(
            "{} exited with {status}: {}",
            self.program,
            stderr.trim()
        ))
    }
}

#[async_trait]
impl PcmDecoder for FfmpegDecoder {
    async fn probe(&self) -> Result<()> {
        let outcome = self
            .probed
            .get_or_init(|| async {
                let status = Command::new(&self.program)
                    .arg("-version")
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                match status {
                    Ok(s) if s.success() => {
                        info!(program = %self.program, "decoder available");
                        Ok(())
                    }
                    Ok(s) => Err(format!("{} -version exited with {s}", self.program)),
                    Err(e) => Err(format!("{}: {e}", self.program)),
                }
            })
            .await;

        outcome.clone().map_err(|reason| {
            warn!(%reason, "decoder unavailable");
            Error::DecoderUnavailable(reason)
        })
    }

    async fn decode_all(&self, path: &Path, cancel: &CancellationToken) -> Result<Vec<f32>> {
        self.probe().await?;
        let (mut child, stderr) = self.spawn(path)?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Decode("decoder stdout not captured".into()))?;

        let read = tokio::select! {
            () = cancel.cancelled() => {
                let _ = child.kill().await;
                stderr.abort();
                return Err(Error::Cancelled);
            }
            res = read_pcm_all(&mut stdout) => res,
        };
        drop(stdout);

        let status = child.wait().await.decode("failed to wait for decoder")?;
        let stderr = stderr.await.unwrap_or_default();
        if !status.success() {
            return Err(self.failure(status, &stderr));
        }
        read
    }

    async fn decode_streaming(
        &self,
        path: &Path,
        chunk_samples: usize,
        on_chunk: &mut ChunkSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.probe().await?;
        let (mut child, stderr) = self.spawn(path)?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Decode("decoder stdout not captured".into()))?;

        let mut consumer_stopped = false;
        let streamed = tokio::select! {
            () = cancel.cancelled() => {
                let _ = child.kill().await;
                stderr.abort();
                return Err(Error::Cancelled);
            }
            res = read_pcm_stream(&mut stdout, chunk_samples, |chunk| {
                on_chunk(chunk).inspect_err(|_| consumer_stopped = true)
            }) => res,
        };

        // Closing our end lets ffmpeg hit a broken pipe and exit on its own
        drop(stdout);
        let status = child.wait().await.decode("failed to wait for decoder")?;
        let stderr = stderr.await.unwrap_or_default();

        match streamed {
            Err(e) if consumer_stopped => {
                debug!(path = %path.display(), "decode stopped by consumer");
                Err(e)
            }
            _ if !status.success() => Err(self.failure(status, &stderr)),
            other => other,
        }
    }
}

fn collect_stderr(pipe: Option<ChildStderr>) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// Install a shell script standing in for ffmpeg. `-version` always succeeds.
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-ffmpeg");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then exit 0; fi\n{body}\n"
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn decoder(program: &Path) -> FfmpegDecoder {
        FfmpegDecoder::new(program.to_string_lossy())
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let decoder = FfmpegDecoder::new("/nonexistent/hark-ffmpeg");
        let err = decoder.probe().await.unwrap_err();
        assert!(matches!(err, Error::DecoderUnavailable(_)));

        let err = decoder
            .decode_all(Path::new("a.mp4"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DecoderUnavailable(_)));
    }

    #[tokio::test]
    async fn decodes_stdout_as_f32le() {
        let tmp = tempfile::tempdir().unwrap();
        // 1.0f32 twice
        let program = fake_ffmpeg(tmp.path(), r"printf '\000\000\200\077\000\000\200\077'");
        let samples = decoder(&program)
            .decode_all(Path::new("in.mp4"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(samples, vec![1.0, 1.0]);
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let program = fake_ffmpeg(tmp.path(), "echo 'c.wav: No such file or directory' >&2\nexit 1");
        let err = decoder(&program)
            .decode_all(Path::new("c.wav"), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            Error::Decode(msg) => assert!(msg.contains("No such file or directory"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn misaligned_output_is_an_alignment_error() {
        let tmp = tempfile::tempdir().unwrap();
        let program = fake_ffmpeg(tmp.path(), r"printf '\000\000\200'");
        let err = decoder(&program)
            .decode_all(Path::new("in.mp4"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Alignment(3)));
    }

    #[tokio::test]
    async fn streaming_stops_when_consumer_fails() {
        let tmp = tempfile::tempdir().unwrap();
        // 16000 zero samples
        let program = fake_ffmpeg(tmp.path(), "head -c 64000 /dev/zero");
        let mut calls = 0;
        let mut on_chunk = |chunk: &[f32]| -> Result<()> {
            calls += 1;
            assert_eq!(chunk.len(), 1000);
            Err(Error::Decode("enough".into()))
        };
        let err = decoder(&program)
            .decode_streaming(Path::new("in.mp4"), 1000, &mut on_chunk, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(ref m) if m == "enough"));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn streaming_delivers_every_chunk() {
        let tmp = tempfile::tempdir().unwrap();
        // 2.5 s of silence
        let program = fake_ffmpeg(tmp.path(), "head -c 160000 /dev/zero");
        let mut sizes = Vec::new();
        let mut on_chunk = |chunk: &[f32]| -> Result<()> {
            sizes.push(chunk.len());
            Ok(())
        };
        decoder(&program)
            .decode_streaming(Path::new("in.mp4"), 16_000, &mut on_chunk, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(sizes, vec![16_000, 16_000, 8_000]);
    }

    #[tokio::test]
    async fn cancellation_kills_the_decoder() {
        let tmp = tempfile::tempdir().unwrap();
        let program = fake_ffmpeg(tmp.path(), "sleep 30");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let started = std::time::Instant::now();
        let err = decoder(&program)
            .decode_all(Path::new("in.mp4"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
