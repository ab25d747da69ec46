//! Client for the generative-AI file API.
//!
//! Large videos go through the resumable upload protocol: a `start` request
//! returns an upload URL, then the file is posted in fixed-size chunks with
//! explicit offsets, the last one carrying `upload, finalize`. Uploaded files
//! are processed asynchronously and must be polled until `ACTIVE` before
//! they can be referenced in a `generateContent` call.

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::config::GeminiConfig;
use crate::error::{CheckerError, Result};
use crate::metrics::MetricsCollector;
use crate::utils::{as_mib, mime_type_for_path, truncate_string};
use crate::validation::InputValidator;

const MIB: u64 = 1024 * 1024;

/// File resource as returned by the file API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, `files/<id>`
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<String>,
    /// URI used to reference the file in prompts
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl UploadedFile {
    /// Processing state; a missing state means the file is still processing
    #[must_use]
    pub fn state(&self) -> &str {
        self.state.as_deref().unwrap_or("PROCESSING")
    }
}

#[derive(Deserialize)]
struct FileEnvelope {
    file: Option<UploadedFile>,
}

/// Client for upload, polling and content generation
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    chunk_size: u64,
    poll_interval: Duration,
    max_polls: u32,
    temperature: f64,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            chunk_size: 64 * MIB,
            poll_interval: Duration::from_secs(5),
            max_polls: 360,
            temperature: 0.7,
            max_output_tokens: 8192,
        })
    }

    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(CheckerError::MissingConfig("GEMINI_API_KEY".into()));
        }
        InputValidator::validate_chunk_size_mb(config.chunk_size_mb)?;

        let mut client = Self::new(&config.base_url, &config.api_key, &config.model)?;
        client.chunk_size = config.chunk_size_mb * MIB;
        client.poll_interval = Duration::from_secs(config.poll_interval_secs);
        client.max_polls = config.max_polls;
        client.temperature = config.temperature;
        client.max_output_tokens = config.max_output_tokens;
        Ok(client)
    }

    /// Use `bytes`-sized upload chunks
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: u64) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    #[must_use]
    pub const fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Upload `path` with the resumable protocol.
    pub async fn upload_file(&self, path: &Path, metrics: &mut MetricsCollector) -> Result<UploadedFile> {
        let file_size = InputValidator::validate_video_path(path)?;
        let mime_type = mime_type_for_path(path);
        let display_name = path
            .file_name()
            .map_or_else(|| "video".to_string(), |n| n.to_string_lossy().into_owned());

        info!(
            path = %path.display(),
            mime_type,
            "Uploading video ({:.2} GB)",
            as_mib(file_size) / 1024.0
        );

        let upload_url = self.start_upload(&display_name, file_size, mime_type).await?;
        debug!("Got upload URL");

        let mut file = tokio::fs::File::open(path).await?;
        let mut offset: u64 = 0;
        let mut last_response = None;

        while offset < file_size {
            let mut chunk = Vec::with_capacity(usize::try_from(self.chunk_size.min(file_size - offset)).unwrap_or(0));
            let read = (&mut file).take(self.chunk_size).read_to_end(&mut chunk).await?;
            if read == 0 {
                return Err(CheckerError::Upload(format!(
                    "file ended at {offset} bytes, expected {file_size}"
                )));
            }

            let end = offset + read as u64;
            let command = if end < file_size { "upload" } else { "upload, finalize" };
            let response = self
                .client
                .post(&upload_url)
                .header("X-Goog-Upload-Command", command)
                .header("X-Goog-Upload-Offset", offset.to_string())
                .body(chunk)
                .send()
                .await?;
            let response = ensure_success(response).await?;

            metrics.record_upload_chunk(read as u64);
            offset = end;

            #[allow(clippy::cast_precision_loss)]
            let percent = offset as f64 * 100.0 / file_size as f64;
            info!(
                "Uploaded {:.1} MB / {:.1} MB ({:.1}%)",
                as_mib(offset),
                as_mib(file_size),
                percent
            );
            last_response = Some(response);
        }

        let response = last_response.ok_or_else(|| CheckerError::Upload("no chunks were sent".into()))?;
        let raw: Value = response.json().await?;
        let envelope: FileEnvelope = serde_json::from_value(raw.clone())?;
        envelope.file.ok_or_else(|| {
            CheckerError::Upload(format!("Unexpected response format: {}", truncate_string(&raw.to_string(), 500)))
        })
    }

    async fn start_upload(&self, display_name: &str, file_size: u64, mime_type: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .query(&[("key", &self.api_key)])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", file_size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| CheckerError::Upload("response carried no X-Goog-Upload-URL header".into()))
    }

    /// Fetch the current state of an uploaded file
    pub async fn get_file(&self, name: &str) -> Result<UploadedFile> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .query(&[("key", &self.api_key)])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Poll `name` until it is `ACTIVE`.
    pub async fn wait_until_active(&self, name: &str) -> Result<UploadedFile> {
        for attempt in 1..=self.max_polls {
            let file = self.get_file(name).await?;
            info!(name, state = file.state(), attempt, "File state");

            match file.state() {
                "ACTIVE" => return Ok(file),
                "FAILED" => {
                    return Err(CheckerError::Processing(format!("{name} reported state FAILED")));
                },
                _ => {},
            }

            if attempt < self.max_polls {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(CheckerError::Processing(format!(
            "{name} not active after {} polls",
            self.max_polls
        )))
    }

    /// Ask the model to analyze an uploaded file and return its text.
    pub async fn generate_content(&self, file_uri: &str, mime_type: &str, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    { "fileData": { "mimeType": mime_type, "fileUri": file_uri } }
                ]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens
            }
        });

        let response = self
            .client
            .post(format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let raw: Value = response.json().await?;

        first_candidate_text(&raw)
            .map(ToString::to_string)
            .ok_or_else(|| CheckerError::Generation(truncate_string(&raw.to_string(), 500)))
    }
}

/// Text of the first part of the first candidate
#[must_use]
pub fn first_candidate_text(response: &Value) -> Option<&str> {
    response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

// The request URL carries the API key, so it is reported without its query.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut url = response.url().clone();
    url.set_query(None);
    let body = response.text().await.unwrap_or_default();
    Err(CheckerError::Status {
        status: status.as_u16(),
        url: url.to_string(),
        body: truncate_string(&body, 500),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_state_is_processing() {
        let file: UploadedFile = serde_json::from_value(json!({"name": "files/abc"})).unwrap();
        assert_eq!(file.state(), "PROCESSING");
    }

    #[test]
    fn test_uploaded_file_camel_case() {
        let file: UploadedFile = serde_json::from_value(json!({
            "name": "files/abc",
            "displayName": "test.MOV",
            "mimeType": "video/quicktime",
            "sizeBytes": "2048",
            "uri": "https://example.com/files/abc",
            "state": "ACTIVE"
        }))
        .unwrap();
        assert_eq!(file.display_name.as_deref(), Some("test.MOV"));
        assert_eq!(file.mime_type.as_deref(), Some("video/quicktime"));
        assert_eq!(file.state(), "ACTIVE");
    }

    #[test]
    fn test_first_candidate_text() {
        let response = json!({"candidates": [{"content": {"parts": [{"text": "scene 1"}]}}]});
        assert_eq!(first_candidate_text(&response), Some("scene 1"));
        assert_eq!(first_candidate_text(&json!({"error": {}})), None);
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = crate::config::AppConfig::default().gemini;
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(CheckerError::MissingConfig(_))
        ));
    }
}
