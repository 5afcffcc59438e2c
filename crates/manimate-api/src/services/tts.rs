//! Text-to-speech client.
//!
//! Speaks to an ElevenLabs-style endpoint: POST the text, get binary audio
//! back. Non-200 responses and empty bodies are hard failures; there is no
//! retry here — unlike the render loop, a flaky TTS provider is not something
//! the pipeline can self-correct.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// TTS service configuration.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub base_url: String,
    pub api_key: String,
    /// Default voice identifier.
    pub voice_id: String,
    pub request_timeout: Duration,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: String::new(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Text-to-speech HTTP client.
pub struct TtsClient {
    config: TtsConfig,
    client: Client,
}

impl TtsClient {
    pub fn new(config: TtsConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::internal(format!("TTS client build failed: {e}")))?;
        Ok(Self { config, client })
    }

    /// Synthesize `text` and write the audio to `{out_dir}/narration.mp3`.
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: Option<&str>,
        out_dir: &Path,
    ) -> ApiResult<PathBuf> {
        let voice = voice_id.unwrap_or(&self.config.voice_id);
        let url = format!(
            "{}/v1/text-to-speech/{voice}",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .json(&json!({
                "text": text,
                "model_id": "eleven_multilingual_v2",
            }))
            .send()
            .await
            .map_err(|e| ApiError::TtsFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::TtsFailed(format!("status {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| ApiError::TtsFailed(format!("body read failed: {e}")))?;
        if audio.is_empty() {
            return Err(ApiError::TtsFailed("empty audio body".to_string()));
        }

        let out_path = out_dir.join("narration.mp3");
        tokio::fs::write(&out_path, &audio).await?;

        info!(
            voice,
            chars = text.len(),
            bytes = audio.len(),
            path = %out_path.display(),
            "Narration synthesized"
        );
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> TtsClient {
        TtsClient::new(TtsConfig {
            base_url,
            api_key: "tts-key".to_string(),
            voice_id: "voice-1".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_writes_audio_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .and(header("xi-api-key", "tts-key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3fakeaudio".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let out = test_client(server.uri())
            .synthesize("Gravity pulls things down.", None, dir.path())
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&out).await.unwrap(), b"ID3fakeaudio");
    }

    #[tokio::test]
    async fn test_non_success_status_is_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = test_client(server.uri())
            .synthesize("text", None, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::TtsFailed(msg) if msg.contains("bad key")));
    }

    #[tokio::test]
    async fn test_empty_body_is_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let err = test_client(server.uri())
            .synthesize("text", None, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::TtsFailed(msg) if msg.contains("empty")));
    }

    #[tokio::test]
    async fn test_explicit_voice_overrides_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-other"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let out = test_client(server.uri())
            .synthesize("text", Some("voice-other"), dir.path())
            .await;
        assert!(out.is_ok());
    }
}
