//! HTTP client for the Gemini `generateContent` API.
//!
//! Uses reqwest with the API key in the `x-goog-api-key` header. Requests
//! target `{api_base}/v1beta/models/{model}:generateContent`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use super::speech;
use crate::error::TutorError;
use crate::storage::config::TutorConfig;
use crate::storage::{ChatMessage, ChatRole};

/// One turn of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: ChatRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }
}

impl From<&ChatMessage> for Turn {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            text: message.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GenerateResponse {
    /// Why the response carried nothing usable, if the API said.
    fn empty_reason(&self) -> Option<String> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
            .or_else(|| self.candidates.first().and_then(|c| c.finish_reason.clone()))
    }

    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }
}

pub struct GeminiClient {
    client: reqwest::Client,
    base: Url,
    api_key: String,
    model: String,
    tts_model: String,
    voice: String,
    temperature: f64,
}

impl GeminiClient {
    /// # Errors
    /// Returns an error if `api_base` is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn new(config: &TutorConfig, api_key: &str) -> Result<Self, TutorError> {
        if api_key.trim().is_empty() {
            return Err(TutorError::MissingApiKey);
        }
        let mut base = config.api_base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|_| TutorError::InvalidBaseUrl(config.api_base.clone()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            base,
            api_key: api_key.trim().to_string(),
            model: config.model.clone(),
            tts_model: config.tts_model.clone(),
            voice: config.voice.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self, model: &str) -> Result<Url, TutorError> {
        self.base
            .join(&format!("v1beta/models/{model}:generateContent"))
            .map_err(|_| TutorError::InvalidBaseUrl(self.base.to_string()))
    }

    async fn post(&self, model: &str, body: serde_json::Value) -> Result<GenerateResponse, TutorError> {
        let url = self.endpoint(model)?;
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        tracing::debug!(model, status = status.as_u16(), "gemini response");
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| {
                    if text.trim().is_empty() {
                        status.canonical_reason().unwrap_or("request failed").to_string()
                    } else {
                        text
                    }
                });
            return Err(TutorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json::<GenerateResponse>().await?)
    }

    /// Ask the chat model for the next reply.
    ///
    /// Returns the concatenated text parts of the first candidate.
    pub async fn generate(&self, system: &str, history: &[Turn]) -> Result<String, TutorError> {
        let contents: Vec<_> = history
            .iter()
            .map(|turn| json!({ "role": turn.role.as_str(), "parts": [{ "text": turn.text }] }))
            .collect();
        let mut body = json!({
            "contents": contents,
            "generationConfig": { "temperature": self.temperature },
        });
        if !system.trim().is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let response = self.post(&self.model, body).await?;
        let text: String = response
            .first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            return Err(TutorError::EmptyResponse(response.empty_reason()));
        }
        Ok(text)
    }

    /// Read `text` aloud with the configured voice. Returns a WAV file.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TutorError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.voice } }
                }
            }
        });

        let response = self.post(&self.tts_model, body).await?;
        let audio = response
            .first_parts()
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .ok_or_else(|| TutorError::EmptyResponse(response.empty_reason()))?;

        let pcm = speech::decode_base64(&audio.data)?;
        let rate = audio
            .mime_type
            .as_deref()
            .and_then(speech::sample_rate_from_mime)
            .unwrap_or(speech::DEFAULT_SAMPLE_RATE);
        Ok(speech::pcm_to_wav(&pcm, rate))
    }
}
