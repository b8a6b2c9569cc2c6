use crate::error::{Result, SearchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GENERATION_URL: &str = "http://localhost:11434";
pub const DEFAULT_GENERATION_MODEL: &str = "mistral";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Produces an answer from a question and assembled context
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String>;
}

/// Prompt sent to a completion model: instructions, context, then the question.
#[must_use]
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a helpful customer support assistant.\n\n\
         Your role is to answer customer questions based ONLY on the following knowledge base.\n\
         If a question cannot be answered using the knowledge base, politely say that you don't have that information.\n\n\
         IMPORTANT RULES:\n\
         1. Only use information from the knowledge base below\n\
         2. Be concise and direct in your answers\n\
         3. If you're not sure, say so - don't make up information\n\
         4. Be friendly and professional\n\
         5. If the question is about something not in the knowledge base, respond with: \"I don't have information about that in my knowledge base.\"\n\n\
         KNOWLEDGE BASE:\n\
         {context}\n\n\
         Customer Question: {question}\n\n\
         Assistant Answer:"
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    stop: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Completion via an Ollama-compatible `POST /api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaGenerator {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Generation(format!("failed to build HTTP client: {e}")))?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(question, context),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
                stop: vec!["Customer Question:", "\n\n"],
            },
        };

        log::info!("Sending question to {}: {}", self.model, preview(question, 50));

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Generation(format!("request to {url} timed out"))
                } else {
                    SearchError::Generation(format!("request to {url} failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Generation(format!(
                "Ollama API error {status}: {body}"
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Generation(format!("invalid generate response: {e}")))?;
        let answer = result.response.trim().to_string();
        if answer.is_empty() {
            return Err(SearchError::Generation("model returned an empty answer".to_string()));
        }

        log::info!("Received answer ({} chars)", answer.chars().count());
        Ok(answer)
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_places_context_before_question() {
        let prompt = build_prompt("How do refunds work?", "Q: Refund?\nA: 30 days.");
        let context_at = prompt.find("KNOWLEDGE BASE:\nQ: Refund?\nA: 30 days.").unwrap();
        let question_at = prompt.find("Customer Question: How do refunds work?").unwrap();
        assert!(context_at < question_at);
        assert!(prompt.ends_with("Assistant Answer:"));
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("short", 50), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_generation_error() {
        let generator =
            OllamaGenerator::new("http://127.0.0.1:9", "mistral", Duration::from_secs(2)).unwrap();
        let err = generator.generate("hi", "ctx").await.unwrap_err();
        assert!(matches!(err, SearchError::Generation(_)));
    }
}
