//! Download progress telemetry.
//!
//! Sinks are observers: they receive a snapshot at most once per interval and
//! once more when the transfer ends. They cannot fail the transfer.

use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Snapshot of an in-flight transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    /// Short name of what is being downloaded.
    pub source: String,
    pub downloaded: u64,
    /// `None` when the server did not send a length.
    pub total: Option<u64>,
    pub bytes_per_sec: f64,
    /// Only known when `total` is.
    pub eta: Option<Duration>,
    /// Cycling activity indicator, set when `total` is unknown.
    pub activity: Option<char>,
    pub finished: bool,
}

impl TransferProgress {
    /// Completed fraction in `0.0..=1.0`, if the total is known.
    pub fn ratio(&self) -> Option<f64> {
        self.total
            .filter(|t| *t > 0)
            .map(|t| (self.downloaded as f64 / t as f64).min(1.0))
    }
}

/// Receives transfer snapshots.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: &TransferProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&TransferProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &TransferProgress) {
        self(progress)
    }
}

/// Time-throttled progress bookkeeping for one transfer.
pub(crate) struct ProgressTracker {
    source: String,
    total: Option<u64>,
    downloaded: u64,
    start: Instant,
    last: Option<Instant>,
    interval: Duration,
    spin: usize,
}

impl ProgressTracker {
    pub(crate) fn new(source: impl Into<String>, total: Option<u64>, interval: Duration) -> Self {
        Self {
            source: source.into(),
            total: total.filter(|t| *t > 0),
            downloaded: 0,
            start: Instant::now(),
            last: None,
            interval,
            spin: 0,
        }
    }

    /// Record `n` more bytes and notify the sink if the interval has elapsed.
    pub(crate) fn advance(&mut self, n: usize, sink: Option<&dyn ProgressSink>) {
        self.downloaded += n as u64;
        let Some(sink) = sink else { return };
        let now = Instant::now();
        if self.last.is_none_or(|last| now.duration_since(last) >= self.interval) {
            self.last = Some(now);
            let snapshot = self.snapshot(now, false);
            sink.on_progress(&snapshot);
        }
    }

    /// Emit the final snapshot.
    pub(crate) fn finish(&mut self, sink: Option<&dyn ProgressSink>) {
        if let Some(sink) = sink {
            let snapshot = self.snapshot(Instant::now(), true);
            sink.on_progress(&snapshot);
        }
    }

    fn snapshot(&mut self, now: Instant, finished: bool) -> TransferProgress {
        let elapsed = now.duration_since(self.start);
        let secs = elapsed.as_secs_f64();
        let bytes_per_sec = if secs > 0.0 {
            self.downloaded as f64 / secs
        } else {
            0.0
        };

        let (eta, activity) = match self.total {
            Some(total) => (estimate_remaining(elapsed, self.downloaded, total), None),
            None => {
                let ch = SPINNER[self.spin % SPINNER.len()];
                self.spin += 1;
                (None, Some(ch))
            }
        };

        TransferProgress {
            source: self.source.clone(),
            downloaded: self.downloaded,
            total: self.total,
            bytes_per_sec,
            eta,
            activity,
            finished,
        }
    }
}

/// `elapsed * (remaining / done)`; unknown until the first byte arrives.
pub(crate) fn estimate_remaining(elapsed: Duration, done: u64, total: u64) -> Option<Duration> {
    if done == 0 {
        return None;
    }
    let remaining = total.saturating_sub(done) as f64;
    Some(elapsed.mul_f64(remaining / done as f64))
}

/// Width of the console bar in cells.
const BAR_WIDTH: usize = 40;

/// Renders a single-line progress bar to stderr.
pub struct ConsoleProgress {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }
}

impl ConsoleProgress {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_progress(&self, progress: &TransferProgress) {
        let line = render_line(progress, BAR_WIDTH);
        // Telemetry only: a poisoned or broken writer is ignored
        if let Ok(mut out) = self.out.lock() {
            let _ = write!(out, "\r{line}");
            if progress.finished {
                let _ = writeln!(out);
            }
            let _ = out.flush();
        }
    }
}

/// Format one progress line.
pub fn render_line(progress: &TransferProgress, width: usize) -> String {
    let speed = human_bytes(progress.bytes_per_sec);
    match (progress.total, progress.ratio()) {
        (Some(total), Some(ratio)) => {
            let done = ((ratio * width as f64) as usize).min(width);
            let bar = format!("{}{}", "█".repeat(done), "░".repeat(width - done));
            let eta = progress.eta.map_or_else(|| "-".to_string(), short_duration);
            format!(
                "[{bar}] {:6.2}%  {} / {}  {speed}/s  ETA {eta}  {}",
                ratio * 100.0,
                human_bytes(progress.downloaded as f64),
                human_bytes(total as f64),
                progress.source,
            )
        }
        _ => format!(
            "[{}] {}  {speed}/s  {}",
            progress.activity.unwrap_or(SPINNER[0]),
            human_bytes(progress.downloaded as f64),
            progress.source,
        ),
    }
}

/// Binary-unit byte count, e.g. `1.50 MiB`.
pub fn human_bytes(bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * KB;
    const GB: f64 = 1024.0 * MB;
    if bytes >= GB {
        format!("{:.2} GiB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.2} MiB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.2} KiB", bytes / KB)
    } else {
        format!("{bytes:.0} B")
    }
}

/// `mm:ss`, or `hh:mm:ss` past an hour.
pub fn short_duration(d: Duration) -> String {
    let total = d.as_secs_f64().round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
