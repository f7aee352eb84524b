//! LM server client.
//!
//! Phases talk to the model through `LlmClient::ask`, which never fails: a
//! transport error, a non-success status, or a body without a `response`
//! string is logged and comes back as an empty answer so the caller can
//! continue degraded. Only the connectivity probe is fatal.
//! Implementations provide `try_ask`, which keeps the failure visible to
//! wrappers such as `LoggedClient`.
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::Settings;
use crate::error::RunError;
use crate::llm_log::{LlmLog, LlmLogBuilder};
use crate::util::preview;

/// Something that can answer a prompt with a given model.
pub trait LlmClient {
    /// Ask `model` to answer `prompt`; `task` labels the call in logs.
    fn try_ask(&self, model: &str, task: &str, prompt: &str) -> Result<String>;

    /// Like `try_ask`, but a failure is logged and yields the empty string.
    fn ask(&self, model: &str, task: &str, prompt: &str) -> String {
        self.try_ask(model, task, prompt).unwrap_or_else(|err| {
            tracing::error!(model, task, error = %format!("{err:#}"), "LM request failed");
            String::new()
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// What the connectivity probe learned about the server.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub version: String,
    pub models: Vec<String>,
}

/// Blocking client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaClient {
    agent: ureq::Agent,
    base: String,
    generate_url: String,
}

impl OllamaClient {
    pub fn new(settings: &Settings) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base: settings.server_base(),
            generate_url: settings.generate_url(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.base
    }

    /// Probe `/api/version` and `/api/tags`. Failure means no phase can run.
    pub fn check_connection(&self) -> Result<ServerInfo, RunError> {
        let connectivity = |reason: String| RunError::Connectivity {
            endpoint: self.base.clone(),
            reason,
        };
        let version: VersionResponse = self
            .get_json("/api/version")
            .map_err(|err| connectivity(err.to_string()))?;
        let models = self
            .available_models()
            .map_err(|err| connectivity(err.to_string()))?;
        let info = ServerInfo {
            version: version.version.unwrap_or_else(|| "unknown".to_string()),
            models,
        };
        tracing::info!(
            endpoint = %self.base,
            version = %info.version,
            models = info.models.len(),
            "connected to LM server"
        );
        Ok(info)
    }

    /// Model names the server reports as installed.
    pub fn available_models(&self) -> Result<Vec<String>> {
        let tags: TagsResponse = self.get_json("/api/tags")?;
        Ok(tags.models.into_iter().map(|tag| tag.name).collect())
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        let mut response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| anyhow!("request failed: {url}: {err}"))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(anyhow!("request failed: {url}: HTTP {status}: {}", body.trim()));
        }
        response
            .body_mut()
            .read_json::<T>()
            .map_err(|err| anyhow!("failed to parse JSON from {url}: {err}"))
    }

    /// Send one non-streaming generate request.
    pub fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = &self.generate_url;
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let mut response = self
            .agent
            .post(url)
            .send_json(&request)
            .map_err(|err| anyhow!("request failed: {url}: {err}"))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| anyhow!("read response from {url}: {err}"))?;
        parse_generate_body(status, &body)
    }
}

impl LlmClient for OllamaClient {
    fn try_ask(&self, model: &str, task: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let answer = self.generate(model, prompt)?;
        tracing::info!(
            model,
            task,
            chars = answer.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            preview = %preview(&answer, 100),
            "LM response"
        );
        Ok(answer)
    }
}

/// Interpret a generate response body. Anything but a success status with a
/// string `response` field is a failure.
pub fn parse_generate_body(status: u16, body: &str) -> Result<String> {
    if !(200..300).contains(&status) {
        return Err(anyhow!("HTTP {status}: {}", preview(body.trim(), 200)));
    }
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|err| anyhow!("unexpected response format ({err}): {}", preview(body, 200)))?;
    Ok(parsed.response)
}

/// Wraps a client and appends one log line per call to the run's LM log.
pub struct LoggedClient<'a> {
    inner: &'a dyn LlmClient,
    log: LlmLog,
}

impl<'a> LoggedClient<'a> {
    pub fn new(inner: &'a dyn LlmClient, log: LlmLog) -> Self {
        Self { inner, log }
    }
}

impl LlmClient for LoggedClient<'_> {
    fn try_ask(&self, model: &str, task: &str, prompt: &str) -> Result<String> {
        let builder = LlmLogBuilder::new(model, task).with_prompt_preview(prompt);
        let result = self.inner.try_ask(model, task, prompt);
        let entry = match &result {
            Ok(answer) if answer.is_empty() => builder.empty(),
            Ok(answer) => builder.success(answer.len()),
            Err(err) => builder.failed(format!("{err:#}")),
        };
        if let Err(err) = self.log.append(&entry) {
            tracing::warn!(error = %err, "failed to append LM log entry");
        }
        result
    }
}
