//! Small helpers shared by the HTTP clients and the report.

use std::path::Path;
use std::time::Duration;

/// Truncate a string to `max_len` characters, appending "..." if truncated.
#[must_use]
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Show the first `head` and last `tail` characters of a secret.
#[must_use]
pub fn key_preview(key: &str, head: usize, tail: usize) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= head + tail {
        return "*".repeat(chars.len());
    }
    let start: String = chars[..head].iter().collect();
    let end: String = chars[chars.len() - tail..].iter().collect();
    format!("{start}...{end}")
}

/// Parse the total from a PostgREST `Content-Range` header.
///
/// `0-0/42` and `*/42` yield `Some(42)`; an unknown total (`0-0/*`) or a
/// malformed header yields `None`.
#[must_use]
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.trim().rsplit_once('/')?;
    total.parse().ok()
}

/// MIME type for a video file, from its extension.
#[must_use]
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("mov" | "qt") => "video/quicktime",
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("mpeg" | "mpg") => "video/mpeg",
        _ => "application/octet-stream",
    }
}

/// Format a duration as `MM:SS`.
#[must_use]
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Bytes as mebibytes, for progress logs.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn as_mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn key_preview_masks_middle() {
        assert_eq!(key_preview("eyJhbGciOiJIUzI1NiJ9.payload.sig", 6, 3), "eyJhbG...sig");
        assert_eq!(key_preview("short", 4, 4), "*****");
    }

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range_total("0-0/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-0/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn mime_types() {
        assert_eq!(mime_type_for_path(Path::new("./test.MOV")), "video/quicktime");
        assert_eq!(mime_type_for_path(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(mime_type_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn countdown_format() {
        assert_eq!(format_countdown(Duration::from_secs(120)), "02:00");
        assert_eq!(format_countdown(Duration::from_secs(95)), "01:35");
    }
}
