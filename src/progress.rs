//! Spinner for long waits, and a log writer that prints above it.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::future::Future;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Start a spinner with `message`; finish it with `finish_and_clear`
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = multi_progress().add(ProgressBar::new_spinner());
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Show a spinner while `fut` runs. Hidden when `enabled` is false (JSON output).
pub async fn with_spinner<T, F>(enabled: bool, message: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    if !enabled {
        return fut.await;
    }
    let pb = spinner(message);
    let out = fut.await;
    pb.finish_and_clear();
    out
}

fn emit_line(line: &str) {
    let line = line.trim_end_matches('\r');
    let _ = multi_progress().println(line);
}

#[derive(Default, Clone)]
pub struct LogWriterFactory;

/// Buffers log output and hands complete lines to the progress display
pub struct LogWriter {
    buffer: String,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.buffer.find('\n') {
            emit_line(&self.buffer[..idx]);
            self.buffer.drain(..=idx);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            emit_line(self.buffer.trim_end_matches('\n'));
            self.buffer.clear();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: String::new(),
        }
    }
}
