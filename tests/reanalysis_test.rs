//! Reanalysis trigger and runner tests

use async_trait::async_trait;
use mockall::mock;
use mockito::{Matcher, Server};
use std::time::{Duration, Instant};
use video_analysis_checker::error::{CheckerError, Result};
use video_analysis_checker::metrics::MetricsCollector;
use video_analysis_checker::models::{AnalysisRecord, ClassifiedVideo, Video};
use video_analysis_checker::reanalysis::{ReanalysisRunner, ReanalysisSummary, TriggerClient};
use video_analysis_checker::repository::VideoRepository;

mock! {
    pub Repo {}

    #[async_trait]
    impl VideoRepository for Repo {
        async fn test_connection(&self) -> Result<()>;
        async fn fetch_videos(&self) -> Result<Vec<Video>>;
        async fn fetch_analysis(&self) -> Result<Vec<AnalysisRecord>>;
        async fn video_file_path(&self, video_id: &str) -> Result<Option<String>>;
        async fn count_rows(&self, table: &str) -> Result<Option<u64>>;
        fn name(&self) -> &'static str;
    }
}

fn trigger_client(server: &Server) -> TriggerClient {
    TriggerClient::new(&server.url(), "raw-clips-global", "us-east-1", Duration::from_secs(5)).unwrap()
}

fn candidate(id: &str) -> ClassifiedVideo {
    let mut video = Video::new(id);
    video.project_id = Some("p1".into());
    ClassifiedVideo { video, analysis: None }
}

fn repo_with_paths() -> MockRepo {
    let mut repo = MockRepo::new();
    repo.expect_video_file_path().returning(|video_id: &str| match video_id {
        "missing" => Ok(None),
        "broken" => Err(CheckerError::Other("lookup failed".into())),
        id => Ok(Some(format!("raw/{id}.mov"))),
    });
    repo
}

#[tokio::test]
async fn test_storage_event_accepted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_header("content-type", "application/json")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("ObjectCreated:Put".into()),
            Matcher::Regex(r#""key":"raw/v1.mov""#.into()),
        ]))
        .with_status(200)
        .with_body(r#"{"message":"queued"}"#)
        .create_async()
        .await;

    let outcome = trigger_client(&server).trigger("v1", Some("p1"), "raw/v1.mov").await;

    mock.assert_async().await;
    assert!(outcome.success);
    assert!(!outcome.used_fallback);
    assert_eq!(outcome.message, "S3 trigger: queued");
}

#[tokio::test]
async fn test_falls_back_to_job_payload() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .match_body(Matcher::Regex("ObjectCreated:Put".into()))
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;
    let fallback = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "video_id": "v1",
            "project_id": "p1",
            "trigger_source": "queue_processor"
        })))
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let outcome = trigger_client(&server).trigger("v1", Some("p1"), "raw/v1.mov").await;

    fallback.assert_async().await;
    assert!(outcome.success);
    assert!(outcome.used_fallback);
    assert_eq!(outcome.message, "Job payload: processed successfully");
}

#[tokio::test]
async fn test_both_payloads_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(500)
        .with_body("internal error")
        .expect(2)
        .create_async()
        .await;

    let outcome = trigger_client(&server).trigger("v1", None, "raw/v1.mov").await;

    assert!(!outcome.success);
    assert!(outcome.used_fallback);
    assert!(outcome.message.contains("HTTP 500"));
    assert!(outcome.message.contains("internal error"));
}

#[tokio::test]
async fn test_runner_counts_missing_paths_as_failed() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body("{}")
        .expect(2)
        .create_async()
        .await;

    let runner = ReanalysisRunner::new(trigger_client(&server), Duration::ZERO, Duration::ZERO);
    let videos = [candidate("a"), candidate("missing"), candidate("broken"), candidate("b")];
    let candidates: Vec<&ClassifiedVideo> = videos.iter().collect();
    let mut metrics = MetricsCollector::default();

    let summary = runner.run(&repo_with_paths(), &candidates, &mut metrics).await;

    mock.assert_async().await;
    assert_eq!(
        summary,
        ReanalysisSummary {
            total: 4,
            successful: 2,
            failed: 2
        }
    );
    assert_eq!(metrics.triggers_total, 2);
    assert_eq!(metrics.errors_total, 2);
}

#[tokio::test]
async fn test_runner_waits_between_triggers_only() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let delay = Duration::from_millis(40);
    let runner = ReanalysisRunner::new(trigger_client(&server), delay, Duration::from_millis(15));
    let videos = [candidate("a"), candidate("b")];
    let candidates: Vec<&ClassifiedVideo> = videos.iter().collect();
    let mut metrics = MetricsCollector::default();

    let started = Instant::now();
    let summary = runner.run(&repo_with_paths(), &candidates, &mut metrics).await;

    assert_eq!(summary.successful, 2);
    assert!(started.elapsed() >= delay);
}

#[tokio::test]
async fn test_runner_with_no_candidates() {
    let server = Server::new_async().await;
    let runner = ReanalysisRunner::new(trigger_client(&server), Duration::from_secs(3600), Duration::ZERO);
    let mut metrics = MetricsCollector::default();

    let summary = runner.run(&MockRepo::new(), &[], &mut metrics).await;

    assert_eq!(summary, ReanalysisSummary::default());
    assert_eq!(metrics.triggers_total, 0);
}
