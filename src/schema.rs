//! Database schema definitions
//!
//! Table and column names of the hosted backend, shared by the REST and
//! direct-SQL record sources.

/// Videos table schema
pub mod videos {
    /// Table name
    pub const TABLE: &str = "videos";
    /// Primary key column
    pub const ID: &str = "id";
    /// Owning project column
    pub const PROJECT_ID: &str = "project_id";
    /// Stored file name column
    pub const FILE_NAME: &str = "file_name";
    /// Original upload name column
    pub const ORIGINAL_NAME: &str = "original_name";
    /// Raw storage path column
    pub const FILE_PATH: &str = "file_path";
    /// Processed storage path column
    pub const PROCESSED_FILE_PATH: &str = "processed_file_path";
    /// Lifecycle status column
    pub const STATUS: &str = "status";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";

    /// Columns fetched for the report
    pub const REPORT_COLUMNS: [&str; 7] = [ID, PROJECT_ID, FILE_NAME, ORIGINAL_NAME, FILE_PATH, STATUS, CREATED_AT];
}

/// Video analysis table schema
pub mod video_analysis {
    /// Table name
    pub const TABLE: &str = "video_analysis";
    /// Primary key column
    pub const ID: &str = "id";
    /// Owning project column
    pub const PROJECT_ID: &str = "project_id";
    /// Foreign key to videos table
    pub const VIDEO_ID: &str = "video_id";
    /// Lifecycle status column
    pub const STATUS: &str = "status";
    /// Transcription JSON column
    pub const TRANSCRIPTION: &str = "transcription";
    /// Language-model response JSON column
    pub const LLM_RESPONSE: &str = "llm_response";
    /// Derived analysis JSON column
    pub const VIDEO_ANALYSIS: &str = "video_analysis";

    /// Columns fetched for the report
    pub const REPORT_COLUMNS: [&str; 7] = [ID, PROJECT_ID, VIDEO_ID, STATUS, TRANSCRIPTION, LLM_RESPONSE, VIDEO_ANALYSIS];
}

/// Projects table schema
pub mod projects {
    /// Table name
    pub const TABLE: &str = "projects";
}

/// Tables probed by the auth debugger
pub const PROBED_TABLES: [&str; 3] = [videos::TABLE, video_analysis::TABLE, projects::TABLE];

/// Whether `table` is one this tool is allowed to query
#[must_use]
pub fn is_known_table(table: &str) -> bool {
    PROBED_TABLES.contains(&table)
}
