//! Report rendering for a classification.
//!
//! The text report mirrors what operators read in a terminal; the JSON and
//! CSV variants carry the same data for scripts and spreadsheets. Every
//! writer targets a generic `io::Write` so reports can go to stdout, a file
//! or a buffer in tests.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::classify::{BucketSummary, Buckets};
use crate::error::Result;
use crate::models::{Bucket, ClassifiedVideo, OutputFormat};
use crate::reanalysis::ReanalysisSummary;

const WIDE_RULE: usize = 80;
const NARROW_RULE: usize = 40;
const NOT_SET: &str = "N/A";

/// Write `buckets` in the requested format.
pub fn write_report<W: Write>(writer: &mut W, buckets: &Buckets, format: OutputFormat, detailed: bool) -> Result<()> {
    match format {
        OutputFormat::Txt => write_text_report(writer, buckets, detailed),
        OutputFormat::Csv => write_csv(writer, buckets),
        OutputFormat::Json => write_json(writer, buckets),
    }
}

/// Write the report to `path`.
///
/// When `path` is an existing directory a timestamped file name is generated
/// inside it. Returns the path actually written.
pub fn write_report_to_file(buckets: &Buckets, format: OutputFormat, path: &Path, detailed: bool) -> Result<PathBuf> {
    let file_path = if path.is_dir() {
        path.join(report_file_name(format, Local::now()))
    } else {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }
        path.to_path_buf()
    };

    let file = File::create(&file_path)?;
    let mut writer = BufWriter::new(file);
    write_report(&mut writer, buckets, format, detailed)?;
    writer.flush()?;

    Ok(file_path)
}

/// File name such as `video-report_2025-01-15_14-30-00.csv`
#[must_use]
pub fn report_file_name(format: OutputFormat, now: DateTime<Local>) -> String {
    format!("video-report_{}.{}", now.format("%Y-%m-%d_%H-%M-%S"), format.extension())
}

/// Message written when the source returned no videos
pub fn write_no_videos<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "No videos found or query failed")?;
    Ok(())
}

/// Human-readable summary, reanalysis list and optional detail sections.
pub fn write_text_report<W: Write>(writer: &mut W, buckets: &Buckets, detailed: bool) -> Result<()> {
    let issues = buckets.needs_attention();

    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(WIDE_RULE))?;
    writeln!(writer, "VIDEO ANALYSIS STATUS REPORT")?;
    writeln!(writer, "{}", "=".repeat(WIDE_RULE))?;
    writeln!(writer, "Completeness rule: {}", buckets.rule().required_fields())?;
    writeln!(writer, "Total videos: {}", buckets.total())?;
    for (bucket, count) in buckets.counts() {
        writeln!(writer, "{}: {}", bucket.label(), count)?;
    }
    writeln!(writer, "Total needing attention: {issues}")?;

    let candidates = buckets.reanalysis_candidates();
    if !candidates.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "VIDEOS TO REANALYZE:")?;
        writeln!(writer, "{}", "-".repeat(NARROW_RULE))?;
        for candidate in candidates {
            writeln!(writer, "reanalyzing video_id: \"{}\"", candidate.video.id)?;
        }
    }

    if issues > 0 {
        if detailed {
            write_detailed_sections(writer, buckets)?;
        } else {
            writeln!(writer)?;
            writeln!(writer, "Run with --detailed to see detailed information")?;
        }
    } else {
        writeln!(writer)?;
        writeln!(writer, "All videos have complete analysis!")?;
    }

    Ok(())
}

fn write_detailed_sections<W: Write>(writer: &mut W, buckets: &Buckets) -> Result<()> {
    for bucket in Bucket::ISSUES {
        let members = buckets.get(bucket);
        if members.is_empty() {
            continue;
        }

        let title = bucket.title();
        writeln!(writer)?;
        writeln!(writer, "{title}")?;
        writeln!(writer, "{}", "-".repeat(title.len()))?;

        for member in members {
            write_video_details(writer, member)?;
        }
    }
    Ok(())
}

fn write_video_details<W: Write>(writer: &mut W, member: &ClassifiedVideo) -> Result<()> {
    let video = &member.video;
    writeln!(writer, "{}", video.display_name())?;
    writeln!(writer, "   ID: {}", video.id)?;
    writeln!(writer, "   Project: {}", video.project_id.as_deref().unwrap_or(NOT_SET))?;
    writeln!(writer, "   File Path: {}", video.file_path.as_deref().unwrap_or(NOT_SET))?;
    writeln!(writer, "   Video Status: {}", video.status.as_deref().unwrap_or(NOT_SET))?;
    writeln!(writer, "   Created: {}", video.created_at.as_deref().unwrap_or(NOT_SET))?;

    match &member.analysis {
        Some(analysis) => {
            writeln!(writer, "   Analysis Status: {}", analysis.status)?;
            writeln!(writer, "   Has Transcription: {}", analysis.has_transcription())?;
            writeln!(writer, "   Has LLM Response: {}", analysis.has_llm_response())?;
            writeln!(writer, "   Has Video Analysis: {}", analysis.has_video_analysis())?;
        },
        None => writeln!(writer, "   Analysis: None")?,
    }
    writeln!(writer)?;
    Ok(())
}

/// Closing tally of a reanalysis batch
pub fn write_reanalysis_summary<W: Write>(writer: &mut W, summary: &ReanalysisSummary) -> Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "=".repeat(60))?;
    writeln!(writer, "REANALYSIS BATCH COMPLETED")?;
    writeln!(writer, "Successful: {}", summary.successful)?;
    writeln!(writer, "Failed: {}", summary.failed)?;
    writeln!(writer, "Total processed: {}", summary.total)?;
    Ok(())
}

/// Write the batch summary next to a report rendered as `report_format`.
///
/// A text report shares `report_out` with the summary. JSON and CSV reports
/// must stay parseable, so their summary goes to `side_out` instead.
pub fn write_batch_summary<W: Write, E: Write>(
    report_out: &mut W,
    side_out: &mut E,
    report_format: OutputFormat,
    summary: &ReanalysisSummary,
) -> Result<()> {
    match report_format {
        OutputFormat::Txt => write_reanalysis_summary(report_out, summary),
        OutputFormat::Csv | OutputFormat::Json => write_reanalysis_summary(side_out, summary),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    #[serde(flatten)]
    summary: BucketSummary,
    buckets: BTreeMap<&'static str, &'a [ClassifiedVideo]>,
}

/// Pretty JSON document: summary counts, ids and full bucket members.
pub fn write_json<W: Write>(writer: &mut W, buckets: &Buckets) -> Result<()> {
    let report = JsonReport {
        generated_at: Utc::now().to_rfc3339(),
        summary: BucketSummary::from(buckets),
        buckets: buckets.iter().map(|(b, members)| (b.key(), members)).collect(),
    };

    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}

#[derive(Serialize)]
struct CsvRow<'a> {
    bucket: &'static str,
    video_id: &'a str,
    project_id: Option<&'a str>,
    original_name: Option<&'a str>,
    file_path: Option<&'a str>,
    video_status: Option<&'a str>,
    analysis_status: Option<&'a str>,
    has_transcription: bool,
    has_llm_response: bool,
    has_video_analysis: bool,
}

impl<'a> CsvRow<'a> {
    fn new(bucket: Bucket, member: &'a ClassifiedVideo) -> Self {
        let video = &member.video;
        let analysis = member.analysis.as_ref();
        Self {
            bucket: bucket.key(),
            video_id: &video.id,
            project_id: video.project_id.as_deref(),
            original_name: video.original_name.as_deref(),
            file_path: video.file_path.as_deref(),
            video_status: video.status.as_deref(),
            analysis_status: analysis.map(|a| a.status.as_str()),
            has_transcription: analysis.is_some_and(|a| a.has_transcription()),
            has_llm_response: analysis.is_some_and(|a| a.has_llm_response()),
            has_video_analysis: analysis.is_some_and(|a| a.has_video_analysis()),
        }
    }
}

/// One CSV row per video, grouped by bucket in report order.
pub fn write_csv<W: Write>(writer: &mut W, buckets: &Buckets) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for (bucket, members) in buckets.iter() {
        for member in members {
            csv_writer.serialize(CsvRow::new(bucket, member))?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, CompletenessRule};
    use crate::models::{AnalysisRecord, Video};
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> Buckets {
        let mut complete = AnalysisRecord::new("1", "completed");
        complete.transcription = Some(json!("x"));
        complete.llm_response = Some(json!("y"));
        classify(
            vec![Video::new("1"), Video::new("2")],
            vec![complete, AnalysisRecord::new("2", "pending")],
            CompletenessRule::default(),
        )
    }

    fn render(buckets: &Buckets, detailed: bool) -> String {
        let mut out = Vec::new();
        write_text_report(&mut out, buckets, detailed).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_summary_lists_reanalysis_targets() {
        let text = render(&sample(), false);
        assert!(text.contains("VIDEO ANALYSIS STATUS REPORT"));
        assert!(text.contains("Total videos: 2"));
        assert!(text.contains("Pending/Processing: 1"));
        assert!(text.contains("Total needing attention: 1"));
        assert!(text.contains("reanalyzing video_id: \"2\""));
        assert!(!text.contains("reanalyzing video_id: \"1\""));
        assert!(text.contains("--detailed"));
    }

    #[test]
    fn test_detailed_section() {
        let text = render(&sample(), true);
        assert!(text.contains("VIDEOS WITH PENDING ANALYSIS"));
        assert!(text.contains("   Analysis Status: pending"));
        assert!(text.contains("   Has Transcription: false"));
        assert!(!text.contains("--detailed"));
    }

    #[test]
    fn test_all_complete_message() {
        let buckets = classify(Vec::new(), Vec::new(), CompletenessRule::default());
        let text = render(&buckets, false);
        assert!(text.contains("All videos have complete analysis!"));
        assert!(!text.contains("VIDEOS TO REANALYZE"));
    }

    #[test]
    fn test_report_file_name() {
        let now = Local.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap();
        assert_eq!(report_file_name(OutputFormat::Csv, now), "video-report_2025-01-15_14-30-00.csv");
    }
}
