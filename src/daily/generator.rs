//! Optional external challenge generator.
//!
//! Only `chat/completions` is used, asking for a strict JSON object. Calls log
//! model name, latency and token usage, never the API key or the content.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::GeneratorConfig;
use crate::models::challenge::{ChallengeTemplate, Difficulty};

const SYSTEM_PROMPT: &str = "You are an expert etymologist. Generate educational etymology challenges. Respond only with valid JSON.";

const TEMPERATURE: f32 = 0.9;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*\n?|\n?```").expect("static regex"));

/// What a generator is asked for, per difficulty slot.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub difficulty: Difficulty,
    /// Recent titles the new challenge must not repeat.
    pub avoid_titles: Vec<String>,
}

#[async_trait]
pub trait ChallengeGenerator: Send + Sync {
    /// Any error is recovered by the caller with bank content.
    async fn generate(&self, request: &GenerationRequest) -> Result<ChallengeTemplate, String>;
}

pub fn build_prompt(request: &GenerationRequest) -> String {
    let avoid = if request.avoid_titles.is_empty() {
        "(none)".to_string()
    } else {
        request.avoid_titles.join(", ")
    };

    format!(
        "Generate a COMPLETELY UNIQUE etymology challenge for {difficulty} level.

CRITICAL: Create something totally different from recent challenges.
Recent titles to AVOID: {avoid}

Generate JSON with:
- title: Catchy title about word origin (must be unique)
- description: Brief description
- question: Multiple choice question about etymology
- options: Array of 4 possible answers
- correct_answer: Index (0-3) of correct answer
- explanation: Detailed explanation
- hint: Helpful hint

Focus on: unusual word origins, surprising etymology, cultural word migrations, words that changed meaning dramatically.",
        difficulty = request.difficulty,
        avoid = avoid,
    )
}

/// Removes Markdown code fences some models wrap around JSON.
pub fn strip_code_fences(content: &str) -> String {
    CODE_FENCE.replace_all(content.trim(), "").trim().to_string()
}

#[derive(Clone)]
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiGenerator {
    /// Returns `None` if the HTTP client cannot be built.
    pub fn from_config(config: &GeneratorConfig) -> Option<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| tracing::error!("Failed to build generator HTTP client: {}", e))
            .ok()?;

        Some(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChallengeGenerator for OpenAiGenerator {
    #[instrument(level = "info", skip(self, request), fields(difficulty = %request.difficulty, model = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> Result<ChallengeTemplate, String> {
        let url = format!("{}/chat/completions", self.base_url);
        let req = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessageReq { role: "system".into(), content: SYSTEM_PROMPT.into() },
                ChatMessageReq { role: "user".into(), content: build_prompt(request) },
            ],
            temperature: TEMPERATURE,
            response_format: ResponseFormat { r#type: "json_object".into() },
        };

        let start = std::time::Instant::now();
        let res = self
            .client
            .post(&url)
            .header(USER_AGENT, concat!("challenges-backend/", env!("CARGO_PKG_VERSION")))
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            let msg = extract_api_error(&body).unwrap_or(body);
            return Err(format!("generator HTTP {}: {}", status, msg));
        }

        let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
        if let Some(usage) = &body.usage {
            info!(
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                elapsed = ?start.elapsed(),
                "Generator usage"
            );
        }

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| "generator response has no content".to_string())?;

        serde_json::from_str::<ChallengeTemplate>(&strip_code_fences(content))
            .map_err(|e| format!("JSON parse error: {}", e))
    }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessageReq>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessageReq {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResp,
}

#[derive(Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

fn extract_api_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Wrapper {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }
    serde_json::from_str::<Wrapper>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
    }

    #[test]
    fn prompt_names_difficulty_and_titles_to_avoid() {
        let prompt = build_prompt(&GenerationRequest {
            difficulty: Difficulty::Hard,
            avoid_titles: vec!["Roman Heritage".into(), "Plague Times".into()],
        });
        assert!(prompt.contains("for Hard level"));
        assert!(prompt.contains("Recent titles to AVOID: Roman Heritage, Plague Times"));
        assert!(prompt.contains("correct_answer"));
    }

    #[test]
    fn api_error_message_is_extracted() {
        let body = r#"{"error": {"message": "Rate limit reached", "type": "requests"}}"#;
        assert_eq!(extract_api_error(body).as_deref(), Some("Rate limit reached"));
        assert_eq!(extract_api_error("<html>bad gateway</html>"), None);
    }

    #[test]
    fn fenced_generator_output_parses_as_template() {
        let content = "```json\n{\"title\": \"T\", \"description\": \"D\", \"question\": \"Q\", \
            \"options\": [\"a\", \"b\", \"c\", \"d\"], \"correct_answer\": 2, \
            \"explanation\": \"E\", \"hint\": \"H\"}\n```";
        let parsed: ChallengeTemplate = serde_json::from_str(&strip_code_fences(content)).unwrap();
        assert_eq!(parsed.correct_answer, 2);
        assert_eq!(parsed.options.len(), 4);
    }
}
