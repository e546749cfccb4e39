use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::DomainError;
use crate::ports::AudioSource;

/// Audio resources over HTTP(S), plus `file://` URLs for local cues.
pub struct HttpAudioSource {
    client: Client,
}

impl HttpAudioSource {
    pub fn new(timeout: Duration) -> Result<Self, DomainError> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(format!("MeetClock/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn parse(url: &str) -> Result<Url, DomainError> {
        let parsed = Url::parse(url).map_err(|e| unreachable(url, e.to_string()))?;
        match parsed.scheme() {
            "http" | "https" | "file" => Ok(parsed),
            other => Err(unreachable(url, format!("unsupported scheme '{}'", other))),
        }
    }

    async fn head_or_get(&self, url: &Url) -> Result<Response, reqwest::Error> {
        let response = self.client.head(url.as_str()).send().await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!(url = %url, "HEAD not allowed, probing with GET");
            return self.client.get(url.as_str()).send().await;
        }
        Ok(response)
    }
}

fn unreachable(url: &str, reason: String) -> DomainError {
    DomainError::UnreachableAudio {
        url: url.to_string(),
        reason,
    }
}

/// Whether a Content-Type header value names an audio format.
fn is_audio_content_type(value: &str) -> bool {
    value
        .split(';')
        .next()
        .map(|mime| mime.trim().to_ascii_lowercase().starts_with("audio/"))
        .unwrap_or(false)
}

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "oga", "opus", "flac", "m4a", "aac"];

/// Stand-in for a content type on local files.
fn has_audio_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl AudioSource for HttpAudioSource {
    async fn probe(&self, url: &str) -> Result<(), DomainError> {
        let parsed = Self::parse(url)?;

        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|_| unreachable(url, "invalid file path".to_string()))?;
            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|e| unreachable(url, e.to_string()))?;
            if !metadata.is_file() {
                return Err(unreachable(url, "not a file".to_string()));
            }
            if !has_audio_extension(&path) {
                return Err(unreachable(url, "file is not an audio format".to_string()));
            }
            return Ok(());
        }

        let response = self
            .head_or_get(&parsed)
            .await
            .map_err(|e| unreachable(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = url, %status, "Audio probe failed");
            return Err(unreachable(url, format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !is_audio_content_type(content_type) {
            warn!(
                url = url,
                content_type = content_type,
                "Audio probe returned non-audio content"
            );
            return Err(unreachable(
                url,
                format!("content type '{}' is not audio", content_type),
            ));
        }

        info!(url = url, content_type = content_type, "Audio source reachable");
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DomainError> {
        let parsed = Self::parse(url).map_err(|e| DomainError::AudioLoad(e.to_string()))?;

        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|_| DomainError::AudioLoad(format!("invalid file path: {}", url)))?;
            return tokio::fs::read(&path)
                .await
                .map_err(|e| DomainError::AudioLoad(e.to_string()));
        }

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| DomainError::AudioLoad(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::AudioLoad(format!("HTTP {} for {}", status, url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DomainError::AudioLoad(e.to_string()))?;

        debug!(url = url, size = bytes.len(), "Audio fetched");
        Ok(bytes.to_vec())
    }
}
