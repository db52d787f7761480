use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::error::Result;
use crate::transcribe::Segment;

/// Generate an SRT subtitle file from translated segments
pub async fn write_srt<P: AsRef<Path>>(segments: &[Segment], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    fs::write(output_path, render_srt(segments)).await?;
    Ok(())
}

/// Speaker labels are prefixed so viewers can follow who is talking
fn render_srt(segments: &[Segment]) -> String {
    let mut srt_content = String::new();

    for (index, segment) in segments.iter().filter(|s| !s.text.trim().is_empty()).enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n[{}] {}\n\n",
            index + 1,
            format_srt_time(segment.start_ms),
            format_srt_time(segment.end_ms),
            segment.speaker,
            segment.text.trim()
        ));
    }

    srt_content
}

/// Format milliseconds as SRT time (HH:MM:SS,mmm)
fn format_srt_time(ms: i64) -> String {
    let total_milliseconds = ms.max(0) as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
