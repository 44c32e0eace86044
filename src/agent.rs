//! LLM agents for the rewrite ("spin") and review passes.
//!
//! Both passes are single-turn text-in, text-out calls behind [`TextModel`];
//! the Gemini implementation goes through rstructor.

use crate::config::{Config, ConfigError};
use async_trait::async_trait;
use rstructor::{GeminiClient, GeminiModel as GeminiModelId, LLMClient};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

/// Voice preset applied during the rewrite pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Default,
    Formal,
    Creative,
}

impl Style {
    pub const ALL: [Style; 3] = [Style::Default, Style::Formal, Style::Creative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Default => "default",
            Style::Formal => "formal",
            Style::Creative => "creative",
        }
    }

    /// The voice the writer is asked to adopt
    pub fn voice(&self) -> &'static str {
        match self {
            Style::Default => "a clear, reader-friendly narrative style",
            Style::Formal => "a formal, academic prose style suitable for publication",
            Style::Creative => "an engaging, vivid storytelling style that sparks imagination",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Style::Default),
            "formal" => Ok(Style::Formal),
            "creative" => Ok(Style::Creative),
            _ => Err(ConfigError::Unsupported {
                kind: "style",
                value: s.to_string(),
            }),
        }
    }
}

/// A generative model taking one prompt and returning plain text.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Model identifier, for logs
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Gemini through rstructor. The API key is checked when a call is made,
/// so read-only commands work without one.
pub struct GeminiModel {
    api_key: Option<String>,
    model: String,
}

impl GeminiModel {
    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        let api_key = match config.api_key() {
            Ok(key) => Some(key.to_string()),
            Err(ConfigError::MissingApiKey(_)) => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            api_key,
            model: config.agent.model.clone(),
        })
    }
}

#[async_trait]
impl TextModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingApiKey("gemini".to_string()))?;

        // Build the client
        let client = GeminiClient::new(api_key)
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?
            .model(parse_gemini_model(&self.model));

        let result = client
            .generate_with_metadata(prompt)
            .await
            .map_err(|e| AgentError::RequestFailed(e.to_string()))?;
        Ok(result.text)
    }
}

/// Parse a model string into a GeminiModel
fn parse_gemini_model(model: &str) -> GeminiModelId {
    match model {
        "gemini-2.0-flash" => GeminiModelId::Gemini20Flash,
        "gemini-2.5-pro" => GeminiModelId::Gemini25Pro,
        _ => GeminiModelId::Gemini25Flash,
    }
}

/// Prompt for the writer pass
pub fn build_writer_prompt(text: &str, style: Style, tone: Option<&str>) -> String {
    let tone = match tone.map(str::trim) {
        Some(t) if !t.is_empty() => format!(" with a {t} tone"),
        _ => String::new(),
    };
    format!(
        "You are **Writer-Bot**, an expert AI rewriter.\n\
         Rewrite the following chapter in {voice}{tone}.\n\
         • Preserve meaning and factual content.\n\
         • Do **NOT** add side comments, explanations, markdown, or questions.\n\
         Return *only* the rewritten text.\n\n\
         === BEGIN ORIGINAL TEXT ===\n\
         {text}\n\
         === END ORIGINAL TEXT ===",
        voice = style.voice(),
    )
}

/// Prompt for the reviewer pass
pub fn build_reviewer_prompt(text: &str) -> String {
    format!(
        "You are **Reviewer-Bot**, an editorial AI.\n\
         Refine the text below for grammar, fluency, and cohesion while keeping the author's voice.\n\
         Do **NOT** change facts or meaning.\n\
         Return the improved text only, with no extra comments.\n\n\
         {text}"
    )
}

/// Rewrite `text` in the given style and optional tone
pub async fn rewrite(
    model: &dyn TextModel,
    text: &str,
    style: Style,
    tone: Option<&str>,
) -> Result<String, AgentError> {
    let prompt = build_writer_prompt(text, style, tone);
    tracing::info!(model = model.name(), %style, chars = text.len(), "rewriting");
    complete(model, &prompt).await
}

/// Polish grammar and flow without touching facts
pub async fn review(model: &dyn TextModel, text: &str) -> Result<String, AgentError> {
    let prompt = build_reviewer_prompt(text);
    tracing::info!(model = model.name(), chars = text.len(), "reviewing");
    complete(model, &prompt).await
}

async fn complete(model: &dyn TextModel, prompt: &str) -> Result<String, AgentError> {
    let output = model.generate(prompt).await?;
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(AgentError::EmptyResponse);
    }
    Ok(trimmed.to_string())
}
