use std::path::Path;

use anyhow::Context as _;
use serde::Serialize;

use crate::cli::{CheckArgs, NetworkArgs, SummaryArgs};

pub const DEFAULT_BASE_URL: &str = "https://api.siliconflow.cn/v1";
pub const DEFAULT_MODEL: &str = "Pro/deepseek-ai/DeepSeek-V3";
pub const API_KEY_ENV: &str = "PAPERDIGEST_API_KEY";

pub fn chat_completions_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

/// Reads the bearer token: the first line of `key_file` when given, otherwise
/// the `PAPERDIGEST_API_KEY` environment variable.
pub fn load_api_key(key_file: Option<&Path>) -> anyhow::Result<String> {
    let key = match key_file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("read api key file: {}", path.display()))?;
            contents.lines().next().unwrap_or_default().trim().to_owned()
        }
        None => std::env::var(API_KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{API_KEY_ENV} is not set and no --api-key-file given"))?
            .trim()
            .to_owned(),
    };
    if key.is_empty() {
        anyhow::bail!("api key is empty");
    }
    Ok(key)
}

/// Generation parameters sent with every request.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub frequency_penalty: f32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.3,
            top_p: 0.7,
            top_k: 50,
            frequency_penalty: 0.5,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    max_tokens: u32,
    stop: [&'static str; 1],
    temperature: f32,
    top_p: f32,
    top_k: u32,
    frequency_penalty: f32,
    n: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct SummaryClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    instructions: String,
    sampling: Sampling,
}

impl SummaryClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: String,
        model: String,
        language: &str,
    ) -> Self {
        Self {
            client,
            endpoint: chat_completions_endpoint(base_url),
            api_key,
            model,
            instructions: summary_instructions(language),
            sampling: Sampling::default(),
        }
    }

    pub fn from_args(args: &SummaryArgs, network: &NetworkArgs) -> anyhow::Result<Self> {
        let api_key = load_api_key(args.api_key_file.as_deref())?;
        let client = crate::net::build_client(&network.to_config())?;
        let sampling = Sampling {
            max_tokens: args.max_tokens,
            temperature: args.temperature,
            ..Sampling::default()
        };
        Ok(Self::new(
            client,
            &args.base_url,
            api_key,
            args.model.clone(),
            &args.language,
        )
        .with_sampling(sampling))
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Requests a summary of `text` and returns the response body untouched,
    /// whatever the HTTP status. Only transport failures are errors.
    pub async fn summarize(&self, text: &str) -> anyhow::Result<String> {
        self.complete(Some(&self.instructions), text).await
    }

    /// Sends a single user message with no system instruction.
    pub async fn ping(&self, message: &str) -> anyhow::Result<String> {
        self.complete(None, message).await
    }

    async fn complete(&self, system: Option<&str>, user: &str) -> anyhow::Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            max_tokens: self.sampling.max_tokens,
            stop: ["null"],
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
            top_k: self.sampling.top_k,
            frequency_penalty: self.sampling.frequency_penalty,
            n: 1,
            response_format: ResponseFormat { kind: "text" },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .context("read summarization response body")?;
        if !status.is_success() {
            tracing::warn!(%status, endpoint = %self.endpoint, "summarization service returned an error status");
        }
        Ok(raw)
    }
}

/// Sends a greeting to the service and prints the reply. Fails when the
/// reply is not a usable completion.
pub async fn check(args: CheckArgs) -> anyhow::Result<()> {
    let client = SummaryClient::from_args(&args.summary, &args.network)?;
    tracing::info!(endpoint = client.endpoint(), model = %args.summary.model, "check service");

    let raw = client.ping(&args.message).await?;
    let Some(content) = crate::record::validate_response(&raw) else {
        anyhow::bail!("summarization service returned an unusable response: {raw}");
    };
    println!("{content}");
    Ok(())
}

fn summary_instructions(language: &str) -> String {
    format!(
        "You are a professional article summarizer. Analyze the provided paper text and write a \
clear, accurate and concise summary in {language}.\n\
- Capture the main points, arguments and conclusions; focus on what the paper itself does and why it matters.\n\
- Avoid redundancy and do not omit important content.\n\
- Do NOT translate or copy the paper's Abstract verbatim.\n\
- Aim for about 500 characters and never exceed 800.\n\
- Start by listing several keywords of the paper.\n"
    )
}
