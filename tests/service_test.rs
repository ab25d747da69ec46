//! AuditService tests with a mocked record source

use async_trait::async_trait;
use mockall::mock;
use video_analysis_checker::classify::CompletenessRule;
use video_analysis_checker::error::{CheckerError, Result};
use video_analysis_checker::models::{AnalysisRecord, Bucket, Video};
use video_analysis_checker::repository::VideoRepository;
use video_analysis_checker::service::{AuditOutcome, AuditService};

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

fn connected_repo() -> MockRepo {
    let mut repo = MockRepo::new();
    repo.expect_name().return_const("mock");
    repo.expect_test_connection().returning(|| Ok(()));
    repo
}

fn server_error() -> CheckerError {
    CheckerError::Status {
        status: 500,
        url: "http://localhost/rest/v1/videos".into(),
        body: "boom".into(),
    }
}

#[tokio::test]
async fn test_failed_connection_aborts() {
    let mut repo = MockRepo::new();
    repo.expect_name().return_const("mock");
    repo.expect_test_connection()
        .returning(|| Err(CheckerError::Unauthorized("videos".into())));
    repo.expect_fetch_videos().never();
    repo.expect_fetch_analysis().never();

    let mut service = AuditService::new(Box::new(repo), CompletenessRule::default());
    let err = service.run().await.unwrap_err();

    assert!(matches!(err, CheckerError::Unauthorized(_)));
    assert_eq!(service.metrics().errors_total, 1);
}

#[tokio::test]
async fn test_classifies_fetched_records() {
    let mut repo = connected_repo();
    repo.expect_fetch_videos()
        .returning(|| Ok(vec![Video::new("a"), Video::new("b"), Video::new("c")]));
    repo.expect_fetch_analysis().returning(|| {
        let mut done = AnalysisRecord::new("a", "completed");
        done.transcription = Some(serde_json::json!("t"));
        done.llm_response = Some(serde_json::json!("l"));
        Ok(vec![done, AnalysisRecord::new("b", "failed")])
    });

    let mut service = AuditService::new(Box::new(repo), CompletenessRule::TranscriptionAndLlm);
    let AuditOutcome::Classified(buckets) = service.run().await.unwrap() else {
        panic!("expected a classification");
    };

    assert_eq!(buckets.len(Bucket::Complete), 1);
    assert_eq!(buckets.len(Bucket::Failed), 1);
    assert_eq!(buckets.len(Bucket::NoAnalysis), 1);
    assert_eq!(service.metrics().records_fetched_total, 5);
    assert_eq!(service.metrics().videos_classified_total, 3);
}

#[tokio::test]
async fn test_failed_video_fetch_reports_no_videos() {
    let mut repo = connected_repo();
    repo.expect_fetch_videos().returning(|| Err(server_error()));
    repo.expect_fetch_analysis().returning(|| Ok(Vec::new()));

    let mut service = AuditService::new(Box::new(repo), CompletenessRule::default());
    let outcome = service.run().await.unwrap();

    assert_eq!(outcome, AuditOutcome::NoVideos);
    assert_eq!(service.metrics().fetch_errors_total, 1);
}

#[tokio::test]
async fn test_failed_analysis_fetch_treated_as_empty() {
    let mut repo = connected_repo();
    repo.expect_fetch_videos().returning(|| Ok(vec![Video::new("a"), Video::new("b")]));
    repo.expect_fetch_analysis()
        .returning(|| Err(CheckerError::TableNotFound("video_analysis".into())));

    let mut service = AuditService::new(Box::new(repo), CompletenessRule::default());
    let AuditOutcome::Classified(buckets) = service.run().await.unwrap() else {
        panic!("expected a classification");
    };

    assert_eq!(buckets.len(Bucket::NoAnalysis), 2);
    assert_eq!(buckets.needs_attention(), 2);
    assert_eq!(service.metrics().fetch_errors_total, 1);
}

#[tokio::test]
async fn test_fatal_fetch_error_propagates() {
    let mut repo = connected_repo();
    repo.expect_fetch_videos()
        .returning(|| Err(CheckerError::Unauthorized("videos".into())));
    repo.expect_fetch_analysis().never();

    let mut service = AuditService::new(Box::new(repo), CompletenessRule::default());
    assert!(service.run().await.is_err());
}

#[tokio::test]
async fn test_file_path_for_swallows_errors() {
    let mut repo = MockRepo::new();
    repo.expect_video_file_path().returning(|video_id: &str| match video_id {
        "v1" => Ok(Some("raw/v1.mov".to_string())),
        "v2" => Ok(None),
        _ => Err(CheckerError::Other("lookup failed".into())),
    });

    let service = AuditService::new(Box::new(repo), CompletenessRule::default());
    assert_eq!(service.file_path_for("v1").await.as_deref(), Some("raw/v1.mov"));
    assert_eq!(service.file_path_for("v2").await, None);
    assert_eq!(service.file_path_for("v3").await, None);
}

#[tokio::test]
async fn test_table_counts() {
    let mut repo = MockRepo::new();
    repo.expect_count_rows().returning(|table: &str| match table {
        "videos" => Ok(Some(12)),
        _ => Ok(None),
    });

    let service = AuditService::new(Box::new(repo), CompletenessRule::default());
    let counts = service.table_counts().await.unwrap();
    assert_eq!(counts, vec![("videos", Some(12)), ("video_analysis", None)]);
}
