use metrics::{counter, gauge, histogram};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::Bucket;

/// Metric names emitted through the `metrics` facade
pub mod names {
    /// Fetch operations against the record source
    pub const FETCH_OPERATIONS_TOTAL: &str = "video_checker_fetch_operations_total";
    /// Fetch latency
    pub const FETCH_DURATION: &str = "video_checker_fetch_duration_seconds";
    /// Rows returned by fetches
    pub const RECORDS_FETCHED_TOTAL: &str = "video_checker_records_fetched_total";
    /// Videos per bucket after the latest classification
    pub const BUCKET_SIZE: &str = "video_checker_bucket_size";
    /// Classification latency
    pub const CLASSIFY_DURATION: &str = "video_checker_classify_duration_seconds";
    /// Reanalysis trigger calls
    pub const TRIGGERS_TOTAL: &str = "video_checker_reanalysis_triggers_total";
    /// Bytes sent to the file API
    pub const UPLOAD_BYTES_TOTAL: &str = "video_checker_upload_bytes_total";
    /// Errors by kind
    pub const ERRORS_TOTAL: &str = "video_checker_errors_total";
}

/// Metrics collection for one run.
///
/// Every call is forwarded to the global `metrics` recorder (a no-op unless
/// an exporter is installed) and tallied locally so a run summary can be
/// logged without an exporter.
#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    pub fetch_operations_total: u64,
    pub fetch_errors_total: u64,
    pub records_fetched_total: u64,
    pub videos_classified_total: u64,
    pub bucket_sizes: BTreeMap<Bucket, u64>,
    pub triggers_total: u64,
    pub trigger_failures_total: u64,
    pub trigger_fallbacks_total: u64,
    pub upload_bytes_total: u64,
    pub errors_total: u64,
}

impl MetricsCollector {
    /// Record a fetch of `table` that returned `rows` rows
    pub fn record_fetch(&mut self, table: &str, rows: usize, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        counter!(names::FETCH_OPERATIONS_TOTAL, "table" => table.to_string(), "status" => status).increment(1);
        histogram!(names::FETCH_DURATION, "table" => table.to_string()).record(duration.as_secs_f64());

        self.fetch_operations_total += 1;
        if success {
            counter!(names::RECORDS_FETCHED_TOTAL, "table" => table.to_string()).increment(rows as u64);
            self.records_fetched_total += rows as u64;
        } else {
            self.fetch_errors_total += 1;
            self.record_error("fetch", table);
        }
    }

    /// Record the bucket sizes of a classification
    #[allow(clippy::cast_precision_loss)]
    pub fn record_classification(&mut self, counts: &[(Bucket, usize)], duration: Duration) {
        histogram!(names::CLASSIFY_DURATION).record(duration.as_secs_f64());

        self.videos_classified_total = 0;
        for (bucket, count) in counts {
            gauge!(names::BUCKET_SIZE, "bucket" => bucket.key()).set(*count as f64);
            self.bucket_sizes.insert(*bucket, *count as u64);
            self.videos_classified_total += *count as u64;
        }
    }

    /// Record a reanalysis trigger attempt
    pub fn record_trigger(&mut self, success: bool, used_fallback: bool) {
        let route = if used_fallback { "job_payload" } else { "storage_event" };
        let status = if success { "success" } else { "error" };
        counter!(names::TRIGGERS_TOTAL, "route" => route, "status" => status).increment(1);

        self.triggers_total += 1;
        if used_fallback {
            self.trigger_fallbacks_total += 1;
        }
        if !success {
            self.trigger_failures_total += 1;
        }
    }

    /// Record bytes sent in an upload chunk
    pub fn record_upload_chunk(&mut self, bytes: u64) {
        counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
        self.upload_bytes_total += bytes;
    }

    /// Record error metrics
    pub fn record_error(&mut self, error_type: &str, operation: &str) {
        counter!(
            names::ERRORS_TOTAL,
            "type" => error_type.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
        self.errors_total += 1;
    }

    /// Log the local tallies at debug level
    pub fn log_summary(&self) {
        tracing::debug!(
            fetches = self.fetch_operations_total,
            fetch_errors = self.fetch_errors_total,
            records = self.records_fetched_total,
            classified = self.videos_classified_total,
            triggers = self.triggers_total,
            trigger_failures = self.trigger_failures_total,
            upload_bytes = self.upload_bytes_total,
            errors = self.errors_total,
            "Run metrics"
        );
    }
}
