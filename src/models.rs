//! Data models for videos, analysis records and report plumbing
//!
//! This module contains the record shapes read from the backend, the
//! completeness buckets, and the PostgREST query builder shared by the
//! REST record source.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// A row of the `videos` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    /// Video identifier
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Owning project identifier
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub project_id: Option<String>,
    /// Stored file name
    #[serde(default)]
    pub file_name: Option<String>,
    /// File name as uploaded by the user
    #[serde(default)]
    pub original_name: Option<String>,
    /// Storage path of the raw upload
    #[serde(default)]
    pub file_path: Option<String>,
    /// Storage path of the processed rendition, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_file_path: Option<String>,
    /// Free-text lifecycle status (`uploaded`, `processing`, ...)
    #[serde(default)]
    pub status: Option<String>,
    /// Creation timestamp as returned by the backend
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Video {
    /// Create a video with only an identifier set
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: None,
            file_name: None,
            original_name: None,
            file_path: None,
            processed_file_path: None,
            status: None,
            created_at: None,
        }
    }

    /// Human-readable name: original name, then stored name, then id
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.original_name
            .as_deref()
            .or(self.file_name.as_deref())
            .unwrap_or(&self.id)
    }

    /// Storage path to hand to downstream processing.
    ///
    /// The processed rendition wins when it is set and non-empty.
    #[must_use]
    pub fn effective_file_path(&self) -> Option<&str> {
        self.processed_file_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| self.file_path.as_deref().filter(|p| !p.is_empty()))
    }
}

/// Lifecycle status of an analysis record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum AnalysisStatus {
    /// Queued, not started
    Pending,
    /// Currently running
    Processing,
    /// Terminated with an error
    Failed,
    /// Finished; payloads should be populated
    Completed,
    /// Any status this tool does not recognize
    Other(String),
}

impl AnalysisStatus {
    /// Whether the analysis is still in flight
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Status as stored in the backend
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Other(s) => s,
        }
    }
}

impl Default for AnalysisStatus {
    fn default() -> Self {
        Self::Other("unknown".to_string())
    }
}

impl From<&str> for AnalysisStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "failed" => Self::Failed,
            "completed" => Self::Completed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<Option<String>> for AnalysisStatus {
    fn from(s: Option<String>) -> Self {
        s.map_or_else(Self::default, |s| Self::from(s.as_str()))
    }
}

impl From<AnalysisStatus> for String {
    fn from(status: AnalysisStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `video_analysis` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Analysis row identifier
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    /// Owning project identifier
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub project_id: Option<String>,
    /// Video this analysis belongs to
    #[serde(deserialize_with = "deserialize_id")]
    pub video_id: String,
    /// Lifecycle status
    #[serde(default)]
    pub status: AnalysisStatus,
    /// Transcription payload
    #[serde(default)]
    pub transcription: Option<Value>,
    /// Language-model response payload
    #[serde(default)]
    pub llm_response: Option<Value>,
    /// Derived video analysis document
    #[serde(default)]
    pub video_analysis: Option<Value>,
}

impl AnalysisRecord {
    /// Create a record for `video_id` with the given status and no payloads
    #[must_use]
    pub fn new(video_id: impl Into<String>, status: impl Into<AnalysisStatus>) -> Self {
        Self {
            id: None,
            project_id: None,
            video_id: video_id.into(),
            status: status.into(),
            transcription: None,
            llm_response: None,
            video_analysis: None,
        }
    }

    /// Whether the transcription payload is populated
    #[must_use]
    pub fn has_transcription(&self) -> bool {
        payload_present(self.transcription.as_ref())
    }

    /// Whether the language-model response is populated
    #[must_use]
    pub fn has_llm_response(&self) -> bool {
        payload_present(self.llm_response.as_ref())
    }

    /// Whether the derived video analysis is populated
    #[must_use]
    pub fn has_video_analysis(&self) -> bool {
        payload_present(self.video_analysis.as_ref())
    }
}

/// Whether a JSON payload carries data.
///
/// SQL NULL, JSON `null`, the string `"null"`, empty strings, empty objects
/// and empty arrays all count as absent.
#[must_use]
pub fn payload_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty() && s != "null",
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Bool(_) | Value::Number(_)) => true,
    }
}

/// Completeness category assigned to a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// No analysis row exists
    NoAnalysis,
    /// Analysis is pending or processing
    Pending,
    /// Analysis failed
    Failed,
    /// Analysis completed but required payloads are missing, or status unknown
    IncompleteData,
    /// Analysis completed with every required payload
    Complete,
}

impl Bucket {
    /// All buckets in report order
    pub const ALL: [Self; 5] = [Self::NoAnalysis, Self::Pending, Self::Failed, Self::IncompleteData, Self::Complete];

    /// Buckets that need attention, in report order
    pub const ISSUES: [Self; 4] = [Self::NoAnalysis, Self::Pending, Self::Failed, Self::IncompleteData];

    /// Stable key used in JSON/CSV output
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::NoAnalysis => "no_analysis",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::IncompleteData => "incomplete_data",
            Self::Complete => "complete",
        }
    }

    /// Label used in the summary
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoAnalysis => "No analysis",
            Self::Pending => "Pending/Processing",
            Self::Failed => "Failed",
            Self::IncompleteData => "Incomplete data",
            Self::Complete => "Complete",
        }
    }

    /// Section title used in the detailed report
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::NoAnalysis => "VIDEOS WITHOUT ANALYSIS",
            Self::Pending => "VIDEOS WITH PENDING ANALYSIS",
            Self::Failed => "VIDEOS WITH FAILED ANALYSIS",
            Self::IncompleteData => "VIDEOS WITH INCOMPLETE DATA",
            Self::Complete => "VIDEOS WITH COMPLETE ANALYSIS",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A video together with its matched analysis record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedVideo {
    /// The video row
    #[serde(flatten)]
    pub video: Video,
    /// The matched analysis row, if any
    pub analysis: Option<AnalysisRecord>,
}

/// Where video and analysis rows are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// PostgREST endpoint of the hosted backend
    Rest,
    /// Direct Postgres connection
    Sql,
}

/// Output format for the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Human-readable text
    Txt,
    /// Comma-separated values, one row per video
    Csv,
    /// JSON document with counts and bucket members
    Json,
}

impl OutputFormat {
    /// Get the file extension for this format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }
}

/// Query builder rendering PostgREST query-string parameters
#[derive(Debug, Default, Clone)]
pub struct QueryBuilder {
    /// Columns to select; empty means `*`
    pub select: Vec<String>,
    /// List of filters to apply
    pub filters: Vec<Filter>,
    /// Column to order results by, with direction
    pub order_by: Option<(String, bool)>,
    /// Maximum number of results to return
    pub limit: Option<usize>,
    /// Number of results to skip
    pub offset: Option<usize>,
}

/// A filter condition
#[derive(Debug, Clone)]
pub struct Filter {
    /// Column name to filter on
    pub field: String,
    /// Comparison operator
    pub operator: Operator,
    /// Value to compare against
    pub value: FilterType,
}

/// Comparison operators supported by PostgREST filters
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    /// `eq.`
    Equal,
    /// `neq.`
    NotEqual,
    /// `in.(...)`
    In,
}

impl Operator {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::NotEqual => "neq",
            Self::In => "in",
        }
    }
}

/// Value types for filter conditions
#[derive(Debug, Clone)]
pub enum FilterType {
    /// Text value
    Text(String),
    /// Array of text values
    TextArray(Vec<String>),
}

impl FilterType {
    fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::TextArray(items) => format!("({})", items.join(",")),
        }
    }
}

impl QueryBuilder {
    /// Create a new empty query builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the given columns
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.select = columns.iter().map(ToString::to_string).collect();
        self
    }

    /// Add `field=eq.value`
    #[must_use]
    pub fn eq(mut self, field: &str, value: impl Into<String>) -> Self {
        self.add_filter(Filter {
            field: field.to_string(),
            operator: Operator::Equal,
            value: FilterType::Text(value.into()),
        });
        self
    }

    /// Add `field=neq.value`
    #[must_use]
    pub fn neq(mut self, field: &str, value: impl Into<String>) -> Self {
        self.add_filter(Filter {
            field: field.to_string(),
            operator: Operator::NotEqual,
            value: FilterType::Text(value.into()),
        });
        self
    }

    /// Add `field=in.(a,b,...)`
    #[must_use]
    pub fn in_list(mut self, field: &str, values: &[String]) -> Self {
        self.add_filter(Filter {
            field: field.to_string(),
            operator: Operator::In,
            value: FilterType::TextArray(values.to_vec()),
        });
        self
    }

    /// Add a filter condition to the query
    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    /// Order results by `column`
    #[must_use]
    pub fn order(mut self, column: &str, descending: bool) -> Self {
        self.order_by = Some((column.to_string(), descending));
        self
    }

    /// Set the maximum number of results to return
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the number of results to skip
    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render as query-string pairs, in a stable order
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 4);
        let select = if self.select.is_empty() { "*".to_string() } else { self.select.join(",") };
        pairs.push(("select".to_string(), select));

        for filter in &self.filters {
            pairs.push((
                filter.field.clone(),
                format!("{}.{}", filter.operator.prefix(), filter.value.render()),
            ));
        }

        if let Some((column, descending)) = &self.order_by {
            let direction = if *descending { "desc" } else { "asc" };
            pairs.push(("order".to_string(), format!("{column}.{direction}")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }

        pairs
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

// Identifiers are UUID strings in production but integers in some fixtures.
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}
