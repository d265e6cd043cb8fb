// LLM decision provider
//
// Sends the market summary to an OpenAI-compatible chat-completions
// endpoint and parses the reply into a validated trading decision.

pub mod prompt;

use serde::{Deserialize, Serialize};

use crate::error::BotError;
use crate::models::{Decision, Direction};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.2;
const RETRY_DELAY_SECS: u64 = 10;

const MIN_LEVERAGE: i64 = 1;
const MAX_LEVERAGE: i64 = 5;
const MIN_POSITION_SIZE: f64 = 0.1;
const MAX_POSITION_SIZE: f64 = 1.0;
const MIN_SL_PCT: f64 = 0.5;
const MAX_SL_PCT: f64 = 10.0;
const MIN_TP_PCT: f64 = 1.0;
const MAX_TP_PCT: f64 = 20.0;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    content: String,
}

/// The decision schema the model must produce, before validation
#[derive(Debug, Deserialize)]
struct RawDecision {
    direction: String,
    recommended_position_size: f64,
    recommended_leverage: f64,
    stop_loss_percentage: f64,
    take_profit_percentage: f64,
    reasoning: String,
}

pub struct DecisionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    max_reasoning_length: usize,
}

impl DecisionClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        max_retries: u32,
        max_reasoning_length: usize,
    ) -> Self {
        Self::with_api_url(
            api_key,
            model,
            max_retries,
            max_reasoning_length,
            OPENROUTER_API_URL,
        )
    }

    pub fn with_api_url(
        api_key: String,
        model: Option<String>,
        max_retries: u32,
        max_reasoning_length: usize,
        api_url: &str,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_retries: max_retries.max(1),
            max_reasoning_length,
        }
    }

    /// Ask the model for a trading decision given the market summary
    ///
    /// Network errors, rate limits and unparseable replies are retried
    /// with a fixed delay. After the retry budget is spent the last
    /// failure is returned and the caller skips this cycle.
    pub async fn request_decision(&self, market_summary: &str) -> Result<Decision, BotError> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: prompt::SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: market_summary.to_string(),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let mut retry_count = 0;
        loop {
            if retry_count > 0 {
                tokio::time::sleep(std::time::Duration::from_secs(RETRY_DELAY_SECS)).await;
            }

            let response = match self
                .client
                .post(&self.api_url)
                .header("Authorization", format!("Bearer {}", &self.api_key))
                .header("HTTP-Referer", "https://github.com")
                .header("X-Title", "btcbot")
                .json(&request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    retry_count += 1;
                    if retry_count >= self.max_retries {
                        return Err(BotError::Io(anyhow::anyhow!("Network error: {}", e)));
                    }
                    tracing::warn!("Decision request failed ({}), retrying", e);
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();

                if status.as_u16() == 429 || status.is_server_error() {
                    retry_count += 1;
                    if retry_count >= self.max_retries {
                        return Err(BotError::Io(anyhow::anyhow!(
                            "Decision API error {}: {}",
                            status,
                            body
                        )));
                    }
                    tracing::warn!("Decision API error {}, retrying", status);
                    continue;
                }

                return Err(BotError::Io(anyhow::anyhow!(
                    "Decision API error {}: {}",
                    status,
                    body
                )));
            }

            let chat: ChatResponse = match response.json().await {
                Ok(r) => r,
                Err(e) => {
                    retry_count += 1;
                    if retry_count >= self.max_retries {
                        return Err(BotError::MalformedDecision(format!(
                            "response envelope: {}",
                            e
                        )));
                    }
                    tracing::warn!("Decision envelope decode failed ({}), retrying", e);
                    continue;
                }
            };

            let Some(choice) = chat.choices.first() else {
                retry_count += 1;
                if retry_count >= self.max_retries {
                    return Err(BotError::MalformedDecision("empty choices".to_string()));
                }
                continue;
            };

            match parse_decision(&choice.message.content, self.max_reasoning_length) {
                Ok(decision) => return Ok(decision),
                Err(e) => {
                    retry_count += 1;
                    if retry_count >= self.max_retries {
                        return Err(e);
                    }
                    tracing::warn!("Decision parse failed ({}), retrying", e);
                }
            }
        }
    }
}

/// Parse and validate a model reply into a `Decision`
///
/// The reply must be a JSON object matching the decision schema; the
/// only tolerated decoration is a markdown code fence. Out-of-range
/// numeric fields are clamped, an unknown direction falls back to
/// NO_POSITION, and the reasoning is truncated for storage.
pub fn parse_decision(text: &str, max_reasoning_length: usize) -> Result<Decision, BotError> {
    let mut text = text.trim();

    // Strip markdown code blocks (```json ... ``` or ``` ... ```)
    if text.starts_with("```") {
        text = text
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
    }

    let raw: RawDecision = serde_json::from_str(text)
        .map_err(|e| BotError::MalformedDecision(format!("{} (text: {})", e, text)))?;

    let direction = match raw.direction.trim().to_uppercase().as_str() {
        "LONG" => Direction::Long,
        "SHORT" => Direction::Short,
        "NO_POSITION" => Direction::NoPosition,
        other => {
            tracing::warn!("Unknown direction '{}', defaulting to NO_POSITION", other);
            Direction::NoPosition
        }
    };

    let leverage = (raw.recommended_leverage.round() as i64).clamp(MIN_LEVERAGE, MAX_LEVERAGE);
    let position_size_pct = raw
        .recommended_position_size
        .clamp(MIN_POSITION_SIZE, MAX_POSITION_SIZE);
    let sl_pct = raw.stop_loss_percentage.clamp(MIN_SL_PCT, MAX_SL_PCT);
    let tp_pct = raw.take_profit_percentage.clamp(MIN_TP_PCT, MAX_TP_PCT);

    let reasoning = if raw.reasoning.chars().count() > max_reasoning_length {
        let truncated: String = raw.reasoning.chars().take(max_reasoning_length).collect();
        format!("{}...", truncated)
    } else {
        raw.reasoning
    };

    Ok(Decision {
        direction,
        position_size_pct,
        leverage: leverage as u32,
        sl_pct,
        tp_pct,
        reasoning,
    })
}
