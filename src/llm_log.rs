//! Per-run LM invocation log.
//!
//! Every model call made during a run is appended to `llm_log.jsonl` in the
//! run directory, one JSON object per line:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"model":"mistral","task":"complaint.pdf q1/5","duration_ms":4200,"outcome":"success","response_chars":812,...}
//! ```
//!
//! The log is for auditing a run after the fact; failing to append never
//! fails the run.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::util::truncate_chars;

/// Current schema version for llm_log.jsonl entries.
pub const LLM_LOG_SCHEMA_VERSION: u32 = 1;

const PROMPT_PREVIEW_CHARS: usize = 500;

/// Outcome of an LM invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmOutcome {
    Success,
    /// The server answered with an empty response.
    Empty,
    /// Transport error, bad status, or malformed body.
    Failed,
}

/// A single LM invocation log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmLogEntry {
    /// Schema version for forwards compatibility.
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the entry was written.
    pub ts: u64,

    pub model: String,

    /// Label of the call (document and question index, or artifact name).
    pub task: String,

    pub duration_ms: u64,

    pub outcome: LlmOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_chars: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// First few hundred characters of the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
}

/// Builder for constructing log entries with timing.
pub struct LlmLogBuilder {
    start: Instant,
    model: String,
    task: String,
    prompt_preview: Option<String>,
}

impl LlmLogBuilder {
    pub fn new(model: &str, task: &str) -> Self {
        Self {
            start: Instant::now(),
            model: model.to_string(),
            task: task.to_string(),
            prompt_preview: None,
        }
    }

    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        let head = truncate_chars(prompt.trim(), PROMPT_PREVIEW_CHARS);
        self.prompt_preview = Some(if head.len() < prompt.trim().len() {
            format!("{head}...")
        } else {
            head.to_string()
        });
        self
    }

    pub fn success(self, response_chars: usize) -> LlmLogEntry {
        self.build(LlmOutcome::Success, Some(response_chars), None)
    }

    pub fn empty(self) -> LlmLogEntry {
        self.build(LlmOutcome::Empty, Some(0), None)
    }

    pub fn failed(self, error: impl Into<String>) -> LlmLogEntry {
        self.build(LlmOutcome::Failed, None, Some(error.into()))
    }

    fn build(
        self,
        outcome: LlmOutcome,
        response_chars: Option<usize>,
        error: Option<String>,
    ) -> LlmLogEntry {
        LlmLogEntry {
            schema_version: LLM_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            model: self.model,
            task: self.task,
            duration_ms: self.start.elapsed().as_millis() as u64,
            outcome,
            response_chars,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Append-only handle on a run's LM log file.
#[derive(Debug, Clone)]
pub struct LlmLog {
    path: PathBuf,
}

impl LlmLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, entry: &LlmLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("create run directory for llm_log")?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open llm_log for append: {}", self.path.display()))?;
        let line = serde_json::to_string(entry).context("serialize llm_log entry")?;
        writeln!(file, "{}", line).context("write llm_log entry")?;
        Ok(())
    }
}

/// Read all entries, skipping lines that fail to parse.
pub fn read_entries(path: &std::path::Path) -> Result<Vec<LlmLogEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.context("read llm_log line")?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(entry) = serde_json::from_str::<LlmLogEntry>(&line) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_preview_is_bounded() {
        let long = "x".repeat(2000);
        let entry = LlmLogBuilder::new("m", "t")
            .with_prompt_preview(&long)
            .success(10);
        let preview = entry.prompt_preview.expect("preview");
        assert_eq!(preview.len(), PROMPT_PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn entries_round_trip_through_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = LlmLog::new(dir.path().join("run").join("llm_log.jsonl"));
        log.append(&LlmLogBuilder::new("m", "a.pdf q1/2").success(42))
            .expect("append success");
        log.append(&LlmLogBuilder::new("m", "a.pdf q2/2").failed("HTTP 500"))
            .expect("append failure");

        let entries = read_entries(&dir.path().join("run").join("llm_log.jsonl")).expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome, LlmOutcome::Success);
        assert_eq!(entries[0].response_chars, Some(42));
        assert_eq!(entries[1].error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn failed_entry_omits_response_chars() {
        let entry = LlmLogBuilder::new("m", "t").failed("boom");
        let json = serde_json::to_value(&entry).expect("serialize");
        assert!(json.get("response_chars").is_none());
        assert_eq!(json["outcome"], "failed");
    }
}
