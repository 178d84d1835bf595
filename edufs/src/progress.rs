//! Upload progress rendering on stderr.

use edufs_core::{FileEntry, ProgressObserver, UploadOutcome, UploadResult};
use std::io::{self, Write};
use std::sync::Mutex;

/// Renders one status line per file, rewritten in place while bytes flow.
pub struct TerminalProgress<W: Write + Send> {
    out: Mutex<W>,
}

impl TerminalProgress<io::Stderr> {
    /// Progress on stderr.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> TerminalProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn render(&self, line: std::fmt::Arguments<'_>) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        // Write failures are ignored
        let _ = out.write_fmt(line);
        let _ = out.flush();
    }
}

impl<W: Write + Send> ProgressObserver for TerminalProgress<W> {
    fn file_started(&self, index: usize, total: usize, entry: &FileEntry) {
        self.render(format_args!(
            "[{}/{}] {} ",
            index + 1,
            total,
            entry.relative_path
        ));
    }

    fn bytes_sent(&self, transferred: u64, size_hint: u64) {
        let percent = if size_hint == 0 {
            100
        } else {
            (transferred.min(size_hint) * 100 / size_hint) as u32
        };
        self.render(format_args!("\r\x1b[K  {:>3}% {}", percent, human_bytes(transferred)));
    }

    fn file_finished(&self, index: usize, total: usize, result: &UploadResult) {
        let status = match &result.outcome {
            UploadOutcome::Pinned { .. } => "done",
            UploadOutcome::PinFailed { .. } => "pin failed",
            UploadOutcome::UploadFailed { .. } => "failed",
        };
        self.render(format_args!(
            "\r\x1b[K[{}/{}] {} {}\n",
            index + 1,
            total,
            result.entry.relative_path,
            status
        ));
    }
}

/// Format a byte count with a binary unit.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
