//! Re-trigger downstream processing for videos that need attention.
//!
//! The processing pipeline starts when a raw clip lands in object storage.
//! [`TriggerClient`] replays that by posting a synthetic storage event for
//! the video's file path, and falls back to the pipeline's direct job
//! payload when the event is rejected. [`ReanalysisRunner`] walks the
//! candidates one at a time with a fixed pause between calls.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::ReanalysisConfig;
use crate::error::{CheckerError, Result};
use crate::metrics::MetricsCollector;
use crate::models::ClassifiedVideo;
use crate::repository::VideoRepository;
use crate::utils::{format_countdown, truncate_string};

const DEFAULT_MESSAGE: &str = "processed successfully";

/// Result of one trigger attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    /// Whether either payload was accepted
    pub success: bool,
    /// Whether the job payload fallback was used
    pub used_fallback: bool,
    /// Endpoint message or failure description
    pub message: String,
}

/// Client for the serverless reanalysis endpoint
#[derive(Clone, Debug)]
pub struct TriggerClient {
    client: Client,
    endpoint: String,
    s3_bucket: String,
    aws_region: String,
}

impl TriggerClient {
    pub fn new(endpoint: &str, s3_bucket: &str, aws_region: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            s3_bucket: s3_bucket.to_string(),
            aws_region: aws_region.to_string(),
        })
    }

    pub fn from_config(config: &ReanalysisConfig) -> Result<Self> {
        Self::new(
            &config.endpoint,
            &config.s3_bucket,
            &config.aws_region,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Trigger processing of `video_id`, falling back to the job payload.
    pub async fn trigger(&self, video_id: &str, project_id: Option<&str>, file_path: &str) -> TriggerOutcome {
        info!(video_id, file_path, "Sending storage trigger event");
        let event = s3_event_payload(video_id, file_path, &self.s3_bucket, &self.aws_region);

        match self.post(&event).await {
            Ok(message) => {
                return TriggerOutcome {
                    success: true,
                    used_fallback: false,
                    message: format!("S3 trigger: {message}"),
                };
            },
            Err(e) => warn!(video_id, error = %e, "Storage trigger failed, trying job payload"),
        }

        match self.post(&job_payload(video_id, project_id)).await {
            Ok(message) => TriggerOutcome {
                success: true,
                used_fallback: true,
                message: format!("Job payload: {message}"),
            },
            Err(e) => TriggerOutcome {
                success: false,
                used_fallback: true,
                message: format!("Job payload failed: {e}"),
            },
        }
    }

    async fn post(&self, payload: &Value) -> Result<String> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckerError::Trigger(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_string(&body, 500)
            )));
        }

        let body: Option<Value> = response.json().await.ok();
        Ok(body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_MESSAGE)
            .to_string())
    }
}

/// Synthetic `ObjectCreated:Put` event for `file_path` in `bucket`.
#[must_use]
pub fn s3_event_payload(video_id: &str, file_path: &str, bucket: &str, region: &str) -> Value {
    json!({
        "Records": [{
            "eventVersion": "2.0",
            "eventSource": "aws:s3",
            "awsRegion": region,
            "eventTime": "1970-01-01T00:00:00.000Z",
            "eventName": "ObjectCreated:Put",
            "userIdentity": { "principalId": "REANALYSIS_TRIGGER" },
            "requestParameters": { "sourceIPAddress": "127.0.0.1" },
            "responseElements": {
                "x-amz-request-id": format!("REANALYSIS-{video_id}"),
                "x-amz-id-2": "REANALYSIS/TRIGGER/REQUEST"
            },
            "s3": {
                "s3SchemaVersion": "1.0",
                "configurationId": "reanalysisConfigRule",
                "bucket": {
                    "name": bucket,
                    "ownerIdentity": { "principalId": "REANALYSIS_TRIGGER" },
                    "arn": format!("arn:aws:s3:::{bucket}")
                },
                "object": {
                    "key": file_path,
                    "size": 1024,
                    "eTag": format!("reanalysis{video_id}"),
                    "sequencer": format!("REANALYSIS{video_id}")
                }
            }
        }]
    })
}

/// Direct job payload processed synchronously by the pipeline.
#[must_use]
pub fn job_payload(video_id: &str, project_id: Option<&str>) -> Value {
    json!({
        "video_id": video_id,
        "project_id": project_id,
        "additional_context": "",
        "storyboard_content": "",
        "has_storyboard": false,
        "trigger_source": "queue_processor"
    })
}

/// Tally of a reanalysis batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReanalysisSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Sequential, rate-limited reanalysis of a candidate list
pub struct ReanalysisRunner {
    trigger: TriggerClient,
    delay: Duration,
    countdown_step: Duration,
}

impl ReanalysisRunner {
    pub const fn new(trigger: TriggerClient, delay: Duration, countdown_step: Duration) -> Self {
        Self {
            trigger,
            delay,
            countdown_step,
        }
    }

    pub fn from_config(config: &ReanalysisConfig) -> Result<Self> {
        Ok(Self::new(
            TriggerClient::from_config(config)?,
            Duration::from_secs(config.delay_secs),
            Duration::from_secs(config.countdown_step_secs),
        ))
    }

    /// Trigger every candidate in order.
    ///
    /// A candidate whose file path cannot be resolved counts as failed and
    /// is skipped without pausing.
    pub async fn run(
        &self,
        repository: &dyn VideoRepository,
        candidates: &[&ClassifiedVideo],
        metrics: &mut MetricsCollector,
    ) -> ReanalysisSummary {
        let total = candidates.len();
        let mut summary = ReanalysisSummary {
            total,
            ..ReanalysisSummary::default()
        };
        if total == 0 {
            info!("No videos need reanalysis");
            return summary;
        }

        info!(
            total,
            delay_secs = self.delay.as_secs(),
            "Starting reanalysis, estimated {} minutes",
            (self.delay.as_secs() * total.saturating_sub(1) as u64) / 60
        );

        for (index, candidate) in candidates.iter().enumerate() {
            let video = &candidate.video;
            info!(video_id = %video.id, "[{}/{}] Processing: {}", index + 1, total, video.display_name());

            let file_path = match repository.video_file_path(&video.id).await {
                Ok(Some(path)) => path,
                Ok(None) => {
                    error!(video_id = %video.id, "Could not find file path");
                    metrics.record_error("missing_file_path", "reanalysis");
                    summary.failed += 1;
                    continue;
                },
                Err(e) => {
                    error!(video_id = %video.id, error = %e, "Error getting file path");
                    metrics.record_error(e.kind(), "reanalysis");
                    summary.failed += 1;
                    continue;
                },
            };

            let outcome = self.trigger.trigger(&video.id, video.project_id.as_deref(), &file_path).await;
            metrics.record_trigger(outcome.success, outcome.used_fallback);
            if outcome.success {
                info!(video_id = %video.id, "SUCCESS: {}", outcome.message);
                summary.successful += 1;
            } else {
                error!(video_id = %video.id, "FAILED: {}", outcome.message);
                summary.failed += 1;
            }

            if index + 1 < total {
                self.pause().await;
            }
        }

        info!(
            successful = summary.successful,
            failed = summary.failed,
            total = summary.total,
            "Reanalysis batch completed"
        );
        summary
    }

    async fn pause(&self) {
        if self.delay.is_zero() {
            return;
        }
        let step = if self.countdown_step.is_zero() { self.delay } else { self.countdown_step };

        let mut remaining = self.delay;
        while !remaining.is_zero() {
            info!("{} remaining", format_countdown(remaining));
            let wait = step.min(remaining);
            tokio::time::sleep(wait).await;
            remaining = remaining.saturating_sub(wait);
        }
        info!("00:00 - Proceeding to next video");
    }
}
