//! Output size reporting (diagnostic only).

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// Raw and gzipped size of one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeReport {
    pub file: String,
    pub original: usize,
    pub gzipped: usize,
}

impl SizeReport {
    /// Measure `contents` and log the result.
    pub fn measure(task: &str, file: &str, contents: &[u8]) -> Self {
        let report =
            Self { file: file.to_string(), original: contents.len(), gzipped: gzip_len(contents) };
        tracing::info!(
            task,
            file,
            size = report.original,
            gzip = report.gzipped,
            "{} {} ({} gzipped)",
            file,
            human_size(report.original),
            human_size(report.gzipped)
        );
        report
    }
}

impl std::fmt::Display for SizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({} gzipped)",
            self.file,
            human_size(self.original),
            human_size(self.gzipped)
        )
    }
}

/// Length of `bytes` after gzip at the default level.
pub fn gzip_len(bytes: &[u8]) -> usize {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    if encoder.write_all(bytes).is_err() {
        return bytes.len();
    }
    encoder.finish().map(|v| v.len()).unwrap_or(bytes.len())
}

/// Format a byte count with decimal units ("1.23 kB").
pub fn human_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["kB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1000.0;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
