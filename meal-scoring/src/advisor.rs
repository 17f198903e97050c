//! AI Advisor Integration
//!
//! The advisor is a shared, stateless text-completion capability injected
//! into the scoring engine. It may fail, time out, or answer free text; the
//! engine handles all three.

use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, AdvisorResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// AI advisor contract
#[async_trait]
pub trait AiAdvisor: Send + Sync {
    /// Complete `prompt`, producing at most `max_tokens` tokens
    async fn complete(&self, prompt: &str, max_tokens: u32) -> AdvisorResult<String>;
}

// ============================================================
// HTTP advisor
// ============================================================

const SYSTEM_PROMPT: &str = "You assess how urgently a school's meal delivery problems need \
attention. Answer exactly in the requested format.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions style HTTP advisor
pub struct HttpAdvisor {
    client: Client,
    config: AdvisorConfig,
}

impl HttpAdvisor {
    /// Create a new advisor client
    pub fn new(config: AdvisorConfig) -> AdvisorResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdvisorError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl AiAdvisor for HttpAdvisor {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> AdvisorResult<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.config.model,
            max_tokens: max_tokens.min(self.config.max_tokens),
            temperature: 0.2,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AdvisorError::Timeout {
                    secs: self.config.timeout_secs,
                }
            } else {
                AdvisorError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Transport(format!("unreadable response: {}", e)))?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AdvisorError::EmptyReply)?;

        debug!(model = %self.config.model, chars = text.len(), "Advisor replied");
        Ok(text)
    }
}

// ============================================================
// Mock advisor
// ============================================================

/// Scripted behaviour of the mock advisor
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Answer with this text
    Reply(String),
    /// Fail immediately
    Fail(AdvisorError),
    /// Never answer; only the engine's deadline ends the call
    Hang,
}

/// Mock advisor for testing
///
/// Uses the default behaviour unless a rule's needle occurs in the prompt.
pub struct MockAdvisor {
    default: MockBehavior,
    rules: Vec<(String, MockBehavior)>,
    calls: AtomicUsize,
    prompts: RwLock<Vec<String>>,
}

impl MockAdvisor {
    pub fn new(default: MockBehavior) -> Self {
        Self {
            default,
            rules: Vec::new(),
            calls: AtomicUsize::new(0),
            prompts: RwLock::new(Vec::new()),
        }
    }

    /// Always answer `text`
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Reply(text.into()))
    }

    /// Always fail with `error`
    pub fn failing(error: AdvisorError) -> Self {
        Self::new(MockBehavior::Fail(error))
    }

    /// Never answer
    pub fn hanging() -> Self {
        Self::new(MockBehavior::Hang)
    }

    /// Use `behavior` for prompts containing `needle`, such as a school id
    pub fn with_rule(mut self, needle: impl Into<String>, behavior: MockBehavior) -> Self {
        self.rules.push((needle.into(), behavior));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.read().await.clone()
    }
}

#[async_trait]
impl AiAdvisor for MockAdvisor {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> AdvisorResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.write().await.push(prompt.to_string());

        let behavior = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, behavior)| behavior)
            .unwrap_or(&self.default);

        match behavior {
            MockBehavior::Reply(text) => Ok(text.clone()),
            MockBehavior::Fail(error) => Err(error.clone()),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(AdvisorError::EmptyReply)
            }
        }
    }
}
