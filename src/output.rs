use std::io::{self, Write};

use serde::Serialize;

use crate::app::{FetchResult, LocateResult, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_locate(result: &LocateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Line-oriented progress on stderr for interactive runs.
pub struct ConsoleProgress;

impl ConsoleProgress {
    pub fn render(event: &ProgressEvent) -> String {
        match event {
            ProgressEvent::TileStarted { product_id, files } => {
                format!("==> {product_id} ({files} files)")
            }
            ProgressEvent::FileStarted {
                file, index, total, ..
            } => format!("  [{}/{total}] {file}", index + 1),
            ProgressEvent::FileFinished {
                file,
                index,
                total,
                bytes,
                elapsed,
                ..
            } => format!(
                "  [{}/{total}] {file} done, {} in {:.1}s",
                index + 1,
                human_bytes(*bytes),
                elapsed.as_secs_f64()
            ),
            ProgressEvent::TileFinished {
                product_id,
                scene_dir,
                elapsed,
            } => format!(
                "<== {product_id} -> {scene_dir} ({:.1}s)",
                elapsed.as_secs_f64()
            ),
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        // FileStarted lines would interleave under parallel downloads.
        if matches!(event, ProgressEvent::FileStarted { .. }) {
            return;
        }
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{}", Self::render(&event));
    }
}

pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn human_bytes_scales_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(1536), "1.5 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn render_file_finished_is_one_based() {
        let line = ConsoleProgress::render(&ProgressEvent::FileFinished {
            product_id: "S2A".to_string(),
            file: "B02.jp2".to_string(),
            index: 0,
            total: 13,
            bytes: 2048,
            elapsed: Duration::from_millis(1500),
        });
        assert_eq!(line, "  [1/13] B02.jp2 done, 2.0 KiB in 1.5s");
    }
}
