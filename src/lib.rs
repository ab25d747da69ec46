//! Video Analysis Checker - Pipeline Completeness Audit
//!
//! A Rust library for auditing a video-processing pipeline backed by a
//! hosted Postgres/PostgREST backend and a generative-AI file API.
//!
//! # Features
//!
//! - Fetch videos and analysis records over REST or direct SQL
//! - Classify every video into a completeness bucket
//! - Report as text, JSON or CSV
//! - Re-trigger processing for videos that need attention
//! - Upload large videos to the file API and request an analysis
//! - Debug service-key authentication

/// Service key helpers and auth debugging
pub mod auth;
/// Completeness classification
pub mod classify;
/// Configuration management
pub mod config;
/// Direct Postgres record source
#[cfg(feature = "direct-sql")]
pub mod db;
/// Error types
pub mod error;
/// Generative-AI file API client
pub mod gemini;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Reanalysis triggering
pub mod reanalysis;
/// Report rendering
pub mod report;
/// Record source abstraction
pub mod repository;
/// PostgREST client
pub mod rest;
/// Database schema definitions
pub mod schema;
/// Audit orchestration
pub mod service;
/// Shared helpers
pub mod utils;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use classify::{classify, Buckets, CompletenessRule};
pub use config::AppConfig;
pub use error::{CheckerError, Result};
pub use models::{AnalysisRecord, AnalysisStatus, Bucket, OutputFormat, RecordSource, Video};
pub use repository::{RestRepository, VideoRepository};
pub use service::{AuditOutcome, AuditService};
