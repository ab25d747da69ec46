//! Direct Postgres record source.
//!
//! Only compiled with the `direct-sql` feature. Queries run on a small r2d2
//! pool inside `spawn_blocking` so the async service can drive them like the
//! REST source.

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use diesel::sql_types::{BigInt, Jsonb, Nullable, Text};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{CheckerError, Result};
use crate::models::{AnalysisRecord, AnalysisStatus, Video};
use crate::repository::VideoRepository;
use crate::schema;
use crate::validation::InputValidator;

type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

const VIDEOS_QUERY: &str = "SELECT id::text AS id, project_id::text AS project_id, file_name, original_name, \
     file_path, processed_file_path, status, created_at::text AS created_at \
     FROM videos ORDER BY created_at DESC";

const ANALYSIS_QUERY: &str = "SELECT id::text AS id, project_id::text AS project_id, video_id::text AS video_id, \
     status, transcription, llm_response, video_analysis FROM video_analysis";

const FILE_PATH_QUERY: &str = "SELECT COALESCE(NULLIF(processed_file_path, ''), NULLIF(file_path, '')) AS path \
     FROM videos WHERE id::text = $1 LIMIT 1";

#[derive(QueryableByName)]
struct VideoRow {
    #[diesel(sql_type = Text)]
    id: String,
    #[diesel(sql_type = Nullable<Text>)]
    project_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    file_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    original_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    file_path: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    processed_file_path: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    status: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    created_at: Option<String>,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            file_name: row.file_name,
            original_name: row.original_name,
            file_path: row.file_path,
            processed_file_path: row.processed_file_path,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(QueryableByName)]
struct AnalysisRow {
    #[diesel(sql_type = Nullable<Text>)]
    id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    project_id: Option<String>,
    #[diesel(sql_type = Text)]
    video_id: String,
    #[diesel(sql_type = Nullable<Text>)]
    status: Option<String>,
    #[diesel(sql_type = Nullable<Jsonb>)]
    transcription: Option<serde_json::Value>,
    #[diesel(sql_type = Nullable<Jsonb>)]
    llm_response: Option<serde_json::Value>,
    #[diesel(sql_type = Nullable<Jsonb>)]
    video_analysis: Option<serde_json::Value>,
}

impl From<AnalysisRow> for AnalysisRecord {
    fn from(row: AnalysisRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            video_id: row.video_id,
            status: AnalysisStatus::from(row.status),
            transcription: row.transcription,
            llm_response: row.llm_response,
            video_analysis: row.video_analysis,
        }
    }
}

#[derive(QueryableByName)]
struct PathRow {
    #[diesel(sql_type = Nullable<Text>)]
    path: Option<String>,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Record source reading Postgres directly
#[derive(Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    /// Create a new database connection pool
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        InputValidator::validate_database_url(&config.url)?;

        let manager = ConnectionManager::<PgConnection>::new(&config.url);
        let pool = r2d2::Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)?;

        info!("Connected to database");
        Ok(Self { pool })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| CheckerError::Database(format!("query task failed: {e}")))?
    }
}

#[async_trait]
impl VideoRepository for PgRepository {
    async fn test_connection(&self) -> Result<()> {
        self.blocking(|conn| {
            diesel::sql_query("SELECT 1 AS count").execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn fetch_videos(&self) -> Result<Vec<Video>> {
        self.blocking(|conn| {
            let rows: Vec<VideoRow> = diesel::sql_query(VIDEOS_QUERY).load(conn)?;
            Ok(rows.into_iter().map(Video::from).collect())
        })
        .await
    }

    async fn fetch_analysis(&self) -> Result<Vec<AnalysisRecord>> {
        self.blocking(|conn| {
            let rows: Vec<AnalysisRow> = diesel::sql_query(ANALYSIS_QUERY).load(conn)?;
            Ok(rows.into_iter().map(AnalysisRecord::from).collect())
        })
        .await
    }

    async fn video_file_path(&self, video_id: &str) -> Result<Option<String>> {
        let video_id = video_id.to_string();
        self.blocking(move |conn| {
            let row: Option<PathRow> = diesel::sql_query(FILE_PATH_QUERY)
                .bind::<Text, _>(video_id)
                .get_result(conn)
                .optional()?;
            Ok(row.and_then(|r| r.path))
        })
        .await
    }

    async fn count_rows(&self, table: &str) -> Result<Option<u64>> {
        if !schema::is_known_table(table) {
            return Err(CheckerError::TableNotFound(table.to_string()));
        }
        // Table names come from the fixed schema list, never from input.
        let sql = format!("SELECT COUNT(*) AS count FROM {table}");
        self.blocking(move |conn| {
            let row: CountRow = diesel::sql_query(sql).get_result(conn)?;
            Ok(u64::try_from(row.count).ok())
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sql"
    }
}
