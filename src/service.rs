use tracing::{error, info, warn};

use crate::classify::{classify, Buckets, CompletenessRule};
use crate::error::Result;
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::models::{AnalysisRecord, ClassifiedVideo, Video};
use crate::reanalysis::{ReanalysisRunner, ReanalysisSummary};
use crate::repository::VideoRepository;
use crate::schema::{video_analysis, videos};

/// Result of one audit run
#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    /// The source returned no videos (or the fetch failed)
    NoVideos,
    /// Videos were fetched and classified
    Classified(Buckets),
}

/// Fetches both record sets from a repository and classifies them
pub struct AuditService {
    repository: Box<dyn VideoRepository>,
    rule: CompletenessRule,
    metrics: MetricsCollector,
}

impl AuditService {
    pub fn new(repository: Box<dyn VideoRepository>, rule: CompletenessRule) -> Self {
        Self {
            repository,
            rule,
            metrics: MetricsCollector::default(),
        }
    }

    pub fn repository(&self) -> &dyn VideoRepository {
        self.repository.as_ref()
    }

    pub const fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Test the connection, fetch both tables and classify.
    ///
    /// A failed connection test aborts the run. A failed fetch is logged and
    /// treated as an empty result so the report can still be produced.
    pub async fn run(&mut self) -> Result<AuditOutcome> {
        info!(source = self.repository.name(), "Testing connection");
        if let Err(e) = self.repository.test_connection().await {
            error!(error = %e, "Connection test failed");
            self.metrics.record_error(e.kind(), "test_connection");
            return Err(e);
        }
        info!("Connection successful");

        let videos = self.fetch_videos().await?;
        let analyses = self.fetch_analysis().await?;

        if videos.is_empty() {
            warn!("No videos found");
            return Ok(AuditOutcome::NoVideos);
        }

        let timer = OperationTimer::new("classify");
        let buckets = classify(videos, analyses, self.rule);
        self.metrics.record_classification(&buckets.counts(), timer.finish());

        Ok(AuditOutcome::Classified(buckets))
    }

    async fn fetch_videos(&mut self) -> Result<Vec<Video>> {
        info!("Fetching videos...");
        let timer = OperationTimer::new("fetch_videos");
        match self.repository.fetch_videos().await {
            Ok(rows) => {
                self.metrics.record_fetch(videos::TABLE, rows.len(), timer.finish(), true);
                info!("Found {} videos", rows.len());
                Ok(rows)
            },
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.metrics.record_fetch(videos::TABLE, 0, timer.finish(), false);
                error!(error = %e, "Error fetching videos");
                Ok(Vec::new())
            },
        }
    }

    async fn fetch_analysis(&mut self) -> Result<Vec<AnalysisRecord>> {
        info!("Fetching analysis records...");
        let timer = OperationTimer::new("fetch_analysis");
        match self.repository.fetch_analysis().await {
            Ok(rows) => {
                self.metrics.record_fetch(video_analysis::TABLE, rows.len(), timer.finish(), true);
                info!("Found {} analysis records", rows.len());
                Ok(rows)
            },
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.metrics.record_fetch(video_analysis::TABLE, 0, timer.finish(), false);
                error!(error = %e, "Error fetching analysis");
                Ok(Vec::new())
            },
        }
    }

    /// Row counts of both tables, for the connection test command
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, Option<u64>)>> {
        let mut counts = Vec::with_capacity(2);
        for table in [videos::TABLE, video_analysis::TABLE] {
            let count = self.repository.count_rows(table).await?;
            counts.push((table, count));
        }
        Ok(counts)
    }

    /// Storage path for `video_id`, or `None` when it cannot be resolved
    pub async fn file_path_for(&self, video_id: &str) -> Option<String> {
        match self.repository.video_file_path(video_id).await {
            Ok(path) => path,
            Err(e) => {
                error!(video_id, error = %e, "Error getting file path");
                None
            },
        }
    }

    /// Re-trigger processing for `candidates` through this service's source
    pub async fn reanalyze(&mut self, runner: &ReanalysisRunner, candidates: &[&ClassifiedVideo]) -> ReanalysisSummary {
        runner.run(self.repository.as_ref(), candidates, &mut self.metrics).await
    }
}
