//! Join videos with their analysis rows and bucket them by completeness.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::{AnalysisRecord, AnalysisStatus, Bucket, ClassifiedVideo, Video};

/// Which payloads a completed analysis must carry to count as complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CompletenessRule {
    /// Transcription and language-model response
    #[default]
    TranscriptionAndLlm,
    /// Language-model response and derived video analysis
    LlmAndVideoAnalysis,
}

impl CompletenessRule {
    /// Whether `record` satisfies this rule
    #[must_use]
    pub fn is_satisfied_by(self, record: &AnalysisRecord) -> bool {
        match self {
            Self::TranscriptionAndLlm => record.has_transcription() && record.has_llm_response(),
            Self::LlmAndVideoAnalysis => record.has_llm_response() && record.has_video_analysis(),
        }
    }

    /// Payload names required by this rule, for report text
    #[must_use]
    pub const fn required_fields(self) -> &'static str {
        match self {
            Self::TranscriptionAndLlm => "transcription, llm_response",
            Self::LlmAndVideoAnalysis => "llm_response, video_analysis",
        }
    }
}

/// Bucket for a single video given its (optional) analysis row
#[must_use]
pub fn bucket_for(analysis: Option<&AnalysisRecord>, rule: CompletenessRule) -> Bucket {
    let Some(record) = analysis else {
        return Bucket::NoAnalysis;
    };

    if record.status.is_in_progress() {
        return Bucket::Pending;
    }

    match &record.status {
        AnalysisStatus::Failed => Bucket::Failed,
        AnalysisStatus::Completed if rule.is_satisfied_by(record) => Bucket::Complete,
        _ => Bucket::IncompleteData,
    }
}

/// Videos partitioned into completeness buckets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Buckets {
    rule: CompletenessRule,
    buckets: BTreeMap<Bucket, Vec<ClassifiedVideo>>,
}

impl Buckets {
    fn empty(rule: CompletenessRule) -> Self {
        let buckets = Bucket::ALL.iter().map(|b| (*b, Vec::new())).collect();
        Self { rule, buckets }
    }

    /// Rule the videos were classified with
    #[must_use]
    pub const fn rule(&self) -> CompletenessRule {
        self.rule
    }

    /// Members of `bucket`, in input order
    #[must_use]
    pub fn get(&self, bucket: Bucket) -> &[ClassifiedVideo] {
        self.buckets.get(&bucket).map_or(&[], Vec::as_slice)
    }

    /// Number of videos in `bucket`
    #[must_use]
    pub fn len(&self, bucket: Bucket) -> usize {
        self.get(bucket).len()
    }

    /// Total number of classified videos
    #[must_use]
    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether no video was classified
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Number of videos outside the complete bucket
    #[must_use]
    pub fn needs_attention(&self) -> usize {
        Bucket::ISSUES.iter().map(|b| self.len(*b)).sum()
    }

    /// Counts per bucket, in report order
    #[must_use]
    pub fn counts(&self) -> Vec<(Bucket, usize)> {
        Bucket::ALL.iter().map(|b| (*b, self.len(*b))).collect()
    }

    /// Videos to re-trigger: no analysis, then pending, then incomplete.
    ///
    /// Failed analyses are left out; they need a human look first.
    #[must_use]
    pub fn reanalysis_candidates(&self) -> Vec<&ClassifiedVideo> {
        [Bucket::NoAnalysis, Bucket::Pending, Bucket::IncompleteData]
            .iter()
            .flat_map(|b| self.get(*b))
            .collect()
    }

    /// Iterate over every bucket with its members, in report order
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &[ClassifiedVideo])> {
        self.buckets.iter().map(|(b, v)| (*b, v.as_slice()))
    }
}

/// Join `videos` with `analyses` by video id and bucket every video.
///
/// When several analysis rows reference the same video, the last one wins.
#[must_use]
pub fn classify(videos: Vec<Video>, analyses: Vec<AnalysisRecord>, rule: CompletenessRule) -> Buckets {
    let mut by_video: HashMap<String, AnalysisRecord> = HashMap::with_capacity(analyses.len());
    for record in analyses {
        by_video.insert(record.video_id.clone(), record);
    }

    let mut buckets = Buckets::empty(rule);
    for video in videos {
        let analysis = by_video.get(&video.id).cloned();
        let bucket = bucket_for(analysis.as_ref(), rule);
        buckets
            .buckets
            .entry(bucket)
            .or_default()
            .push(ClassifiedVideo { video, analysis });
    }

    buckets
}

/// Serializable summary of a classification, used by the JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSummary {
    /// Rule the videos were classified with
    pub rule: CompletenessRule,
    /// Total number of videos
    pub total: usize,
    /// Number of videos needing attention
    pub needs_attention: usize,
    /// Count per bucket key
    pub counts: BTreeMap<String, usize>,
    /// Video ids per bucket key
    pub video_ids: BTreeMap<String, Vec<String>>,
}

impl From<&Buckets> for BucketSummary {
    fn from(buckets: &Buckets) -> Self {
        Self {
            rule: buckets.rule(),
            total: buckets.total(),
            needs_attention: buckets.needs_attention(),
            counts: buckets.iter().map(|(b, v)| (b.key().to_string(), v.len())).collect(),
            video_ids: buckets
                .iter()
                .map(|(b, v)| (b.key().to_string(), v.iter().map(|c| c.video.id.clone()).collect()))
                .collect(),
        }
    }
}
