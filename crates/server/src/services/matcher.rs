//! Smart opportunity matching.
//!
//! Validates the two free-text inputs, renders them into a fixed prompt, and
//! forwards the prompt to a hosted text-generation model. The model does all
//! of the matching; this module only shapes its output into two fields.

use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    config::MatcherConfig,
    error::{AppError, Result},
};

const MIN_INPUT_LEN: usize = 10;

const PROMPT_TEMPLATE: &str = "You are an AI agent specializing in matching students with freelance opportunities and hackathon teams.

You will analyze the student's profile and the available opportunities to recommend the most relevant options.

Consider the student's skills, experience, and interests when making your recommendations. Explain your reasoning.

Student Profile: {studentProfile}

Available Opportunities: {availableOpportunities}";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    #[serde(default)]
    pub student_profile: String,
    #[serde(default)]
    pub available_opportunities: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub recommended_opportunities: String,
    pub reasoning: String,
}

impl MatchRequest {
    /// Collects every length violation rather than stopping at the first.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Vec::new();
        if self.student_profile.chars().count() < MIN_INPUT_LEN {
            issues.push("Student profile must be at least 10 characters.".to_string());
        }
        if self.available_opportunities.chars().count() < MIN_INPUT_LEN {
            issues.push("Available opportunities must be at least 10 characters.".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(AppError::Issues(issues))
        }
    }

    pub fn prompt(&self) -> String {
        PROMPT_TEMPLATE
            .replace("{studentProfile}", &self.student_profile)
            .replace("{availableOpportunities}", &self.available_opportunities)
    }
}

/// A hosted model that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct MatchingService {
    generator: Arc<dyn TextGenerator>,
}

impl MatchingService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn from_config(config: &MatcherConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(GeminiClient::new(config)?)))
    }

    pub async fn find_matches(&self, request: &MatchRequest) -> Result<MatchResult> {
        request.validate()?;

        let text = self.generator.generate(&request.prompt()).await?;
        tracing::debug!(len = text.len(), "matching model responded");

        Ok(split_output(&text))
    }
}

/// Parses the model output. Structured JSON is preferred; plain text is split
/// on its section labels.
pub fn split_output(text: &str) -> MatchResult {
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(result) = serde_json::from_str::<MatchResult>(trimmed) {
        return result;
    }

    const RECOMMENDED: &str = "Recommended Opportunities:";
    const REASONING: &str = "Reasoning:";

    let recommended_at = text.find(RECOMMENDED);
    let reasoning_at = text.find(REASONING);

    match (recommended_at, reasoning_at) {
        (Some(r), Some(s)) if r < s => MatchResult {
            recommended_opportunities: text[r + RECOMMENDED.len()..s].trim().to_string(),
            reasoning: text[s + REASONING.len()..].trim().to_string(),
        },
        (Some(r), Some(s)) => MatchResult {
            recommended_opportunities: text[r + RECOMMENDED.len()..].trim().to_string(),
            reasoning: text[s + REASONING.len()..r].trim().to_string(),
        },
        (None, Some(s)) => MatchResult {
            recommended_opportunities: text[..s].trim().to_string(),
            reasoning: text[s + REASONING.len()..].trim().to_string(),
        },
        (Some(r), None) => MatchResult {
            recommended_opportunities: text[r + RECOMMENDED.len()..].trim().to_string(),
            reasoning: String::new(),
        },
        (None, None) => MatchResult {
            recommended_opportunities: text.trim().to_string(),
            reasoning: String::new(),
        },
    }
}

/// Google Generative Language `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &MatcherConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn request_body(prompt: &str) -> serde_json::Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "recommendedOpportunities": {
                            "type": "STRING",
                            "description": "A list of freelance opportunities and hackathon teams recommended for the student."
                        },
                        "reasoning": {
                            "type": "STRING",
                            "description": "The reasoning behind the recommendations."
                        }
                    },
                    "required": ["recommendedOpportunities", "reasoning"]
                }
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("Matching service is not configured".to_string()))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Matching service unavailable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "matching model returned an error");
            return Err(AppError::Upstream(format!(
                "Matching service error ({})",
                status.as_u16()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed matching response: {e}")))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AppError::Upstream(
                "Matching service returned no output".to_string(),
            ));
        }

        Ok(text)
    }
}
