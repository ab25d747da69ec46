use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{CheckerError, Result};
use crate::models::{AnalysisRecord, QueryBuilder, Video};
use crate::rest::RestClient;
use crate::schema::{self, video_analysis, videos};

/// Read access to the `videos` and `video_analysis` record sets.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Cheap request proving credentials and schema are usable
    async fn test_connection(&self) -> Result<()>;
    /// All videos, newest first where the source supports ordering
    async fn fetch_videos(&self) -> Result<Vec<Video>>;
    /// All analysis records
    async fn fetch_analysis(&self) -> Result<Vec<AnalysisRecord>>;
    /// Storage path for a video: processed rendition, else raw upload
    async fn video_file_path(&self, video_id: &str) -> Result<Option<String>>;
    /// Exact row count of one of the known tables
    async fn count_rows(&self, table: &str) -> Result<Option<u64>>;
    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Record source backed by the PostgREST endpoint
pub struct RestRepository {
    client: RestClient,
}

#[derive(Deserialize)]
struct FilePathRow {
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    processed_file_path: Option<String>,
}

impl RestRepository {
    pub const fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VideoRepository for RestRepository {
    async fn test_connection(&self) -> Result<()> {
        self.client.probe(videos::TABLE).await.map(|_| ())
    }

    async fn fetch_videos(&self) -> Result<Vec<Video>> {
        let query = QueryBuilder::new()
            .select(&videos::REPORT_COLUMNS)
            .order(videos::CREATED_AT, true);
        self.client.select_all(videos::TABLE, &query).await
    }

    async fn fetch_analysis(&self) -> Result<Vec<AnalysisRecord>> {
        let query = QueryBuilder::new()
            .select(&video_analysis::REPORT_COLUMNS)
            .order(video_analysis::ID, false);
        self.client.select_all(video_analysis::TABLE, &query).await
    }

    async fn video_file_path(&self, video_id: &str) -> Result<Option<String>> {
        let query = QueryBuilder::new()
            .select(&[videos::FILE_PATH, videos::PROCESSED_FILE_PATH])
            .eq(videos::ID, video_id)
            .limit(1);
        let rows: Vec<FilePathRow> = self.client.select(videos::TABLE, &query).await?;

        Ok(rows.into_iter().next().and_then(|row| {
            let mut video = Video::new(video_id);
            video.file_path = row.file_path;
            video.processed_file_path = row.processed_file_path;
            video.effective_file_path().map(ToString::to_string)
        }))
    }

    async fn count_rows(&self, table: &str) -> Result<Option<u64>> {
        if !schema::is_known_table(table) {
            return Err(CheckerError::TableNotFound(table.to_string()));
        }
        self.client.count(table).await
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}
