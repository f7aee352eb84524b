//! Run identity and the typed layout of a run directory.
//!
//! A run is named `<case>/<YYYYMMDD>_<sanitized model>`. Both phases derive
//! every path from one `RunDescriptor`, and a standalone phase 2 recomputes
//! the same name to find what phase 1 wrote.
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RunError;

pub const DEFENSE_DIR: &str = "defense_materials";
pub const CACHE_FILE: &str = "analysis_cache.json";
pub const LLM_LOG_FILE: &str = "llm_log.jsonl";

/// Characters that cannot appear in a file or directory name on common
/// filesystems.
const PATH_ILLEGAL: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make a model identifier safe for file and directory names.
pub fn sanitize_model(model: &str) -> String {
    model
        .trim()
        .chars()
        .map(|ch| {
            if PATH_ILLEGAL.contains(&ch) || ch.is_control() || ch.is_whitespace() {
                '_'
            } else {
                ch
            }
        })
        .collect()
}

pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Where one run's outputs live. Computed once per command and never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDescriptor {
    case_dir: PathBuf,
    model_id: String,
    sanitized_model: String,
    run_dir: PathBuf,
    created_on: NaiveDate,
}

impl RunDescriptor {
    /// Resolve a run for today's date and create its directory.
    pub fn for_today(
        case_dir: &Path,
        model: &str,
        explicit_run_dir: Option<&Path>,
    ) -> Result<Self> {
        Self::resolve(case_dir, model, explicit_run_dir, Local::now().date_naive())
    }

    /// Resolve a run for `date` and create its directory (idempotent).
    pub fn resolve(
        case_dir: &Path,
        model: &str,
        explicit_run_dir: Option<&Path>,
        date: NaiveDate,
    ) -> Result<Self> {
        let descriptor = Self::derive(case_dir, model, explicit_run_dir, date);
        fs::create_dir_all(&descriptor.run_dir)
            .with_context(|| format!("create run directory {}", descriptor.run_dir.display()))?;
        Ok(descriptor)
    }

    /// Compute the descriptor without touching the filesystem.
    pub fn derive(
        case_dir: &Path,
        model: &str,
        explicit_run_dir: Option<&Path>,
        date: NaiveDate,
    ) -> Self {
        let sanitized_model = sanitize_model(model);
        let run_dir = match explicit_run_dir {
            Some(dir) => dir.to_path_buf(),
            None => case_dir.join(format!("{}_{}", date_stamp(date), sanitized_model)),
        };
        Self {
            case_dir: case_dir.to_path_buf(),
            model_id: model.to_string(),
            sanitized_model,
            run_dir,
            created_on: date,
        }
    }

    pub fn case_dir(&self) -> &Path {
        &self.case_dir
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn analysis_stem(&self) -> String {
        format!("document_analysis_{}", self.sanitized_model)
    }

    /// `run/document_analysis_<model>.json`
    pub fn analysis_json_path(&self) -> PathBuf {
        self.run_dir.join(format!("{}.json", self.analysis_stem()))
    }

    /// `run/document_analysis_<model>.md`
    pub fn analysis_markdown_path(&self) -> PathBuf {
        self.run_dir.join(format!("{}.md", self.analysis_stem()))
    }

    /// `case/document_analysis_<model>.json`, the pre-run-directory location.
    pub fn legacy_analysis_path(&self) -> PathBuf {
        self.case_dir.join(format!("{}.json", self.analysis_stem()))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.run_dir.join(CACHE_FILE)
    }

    pub fn llm_log_path(&self) -> PathBuf {
        self.run_dir.join(LLM_LOG_FILE)
    }

    pub fn defense_dir(&self) -> PathBuf {
        self.run_dir.join(DEFENSE_DIR)
    }

    /// `case/<date>_<model>.md`, the merged report.
    pub fn combined_report_path(&self) -> PathBuf {
        self.case_dir.join(format!(
            "{}_{}.md",
            date_stamp(self.created_on),
            self.sanitized_model
        ))
    }

    /// Find the phase-1 output: explicit path, then run directory, then the
    /// legacy case-root location. First existing file wins.
    pub fn locate_analysis(&self, explicit: Option<&Path>) -> Result<PathBuf, RunError> {
        let mut checked = Vec::new();
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            tracing::warn!(path = %path.display(), "requested analysis file does not exist");
            checked.push(path.to_path_buf());
        }
        for candidate in [self.analysis_json_path(), self.legacy_analysis_path()] {
            if candidate.is_file() {
                return Ok(candidate);
            }
            checked.push(candidate);
        }
        Err(RunError::AnalysisMissing { checked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date")
    }

    #[test]
    fn sanitize_replaces_path_illegal_characters() {
        assert_eq!(sanitize_model("llama3:8b"), "llama3_8b");
        assert_eq!(sanitize_model("library/mistral:7b"), "library_mistral_7b");
        assert_eq!(sanitize_model("deepseek-r1"), "deepseek-r1");
        assert_eq!(sanitize_model(" a b "), "a_b");
    }

    #[test]
    fn run_directory_is_dated_and_model_named() {
        let run = RunDescriptor::derive(Path::new("/cases/x"), "llama3:8b", None, day());
        assert_eq!(run.run_dir(), Path::new("/cases/x/20250314_llama3_8b"));
        assert_eq!(
            run.analysis_json_path(),
            Path::new("/cases/x/20250314_llama3_8b/document_analysis_llama3_8b.json")
        );
        assert_eq!(
            run.combined_report_path(),
            Path::new("/cases/x/20250314_llama3_8b.md")
        );
        assert_eq!(
            run.defense_dir(),
            Path::new("/cases/x/20250314_llama3_8b/defense_materials")
        );
    }

    #[test]
    fn explicit_run_directory_wins() {
        let run = RunDescriptor::derive(
            Path::new("/cases/x"),
            "m",
            Some(Path::new("/elsewhere/run")),
            day(),
        );
        assert_eq!(run.run_dir(), Path::new("/elsewhere/run"));
        assert_eq!(run.cache_path(), Path::new("/elsewhere/run/analysis_cache.json"));
    }

    #[test]
    fn resolve_creates_directory_idempotently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = RunDescriptor::resolve(dir.path(), "m:1", None, day()).expect("first");
        let second = RunDescriptor::resolve(dir.path(), "m:1", None, day()).expect("second");
        assert!(first.run_dir().is_dir());
        assert_eq!(first, second);
    }

    #[test]
    fn standalone_phase_two_rediscovers_phase_one_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let phase_one = RunDescriptor::resolve(dir.path(), "llama3:8b", None, day()).expect("p1");
        fs::write(phase_one.analysis_json_path(), "[]").expect("write analysis");

        let phase_two = RunDescriptor::resolve(dir.path(), "llama3:8b", None, day()).expect("p2");
        let found = phase_two.locate_analysis(None).expect("found");
        assert_eq!(
            found,
            dir.path()
                .join("20250314_llama3_8b")
                .join("document_analysis_llama3_8b.json")
        );
    }

    #[test]
    fn locate_falls_back_to_legacy_location() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run = RunDescriptor::resolve(dir.path(), "m", None, day()).expect("run");
        fs::write(run.legacy_analysis_path(), "[]").expect("write legacy");
        assert_eq!(
            run.locate_analysis(None).expect("found"),
            run.legacy_analysis_path()
        );
    }

    #[test]
    fn explicit_analysis_path_is_checked_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run = RunDescriptor::resolve(dir.path(), "m", None, day()).expect("run");
        let explicit = dir.path().join("custom.json");
        fs::write(&explicit, "[]").expect("write custom");
        fs::write(run.analysis_json_path(), "[]").expect("write run copy");
        assert_eq!(run.locate_analysis(Some(&explicit)).expect("found"), explicit);
    }

    #[test]
    fn locate_reports_every_checked_location() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run = RunDescriptor::resolve(dir.path(), "m", None, day()).expect("run");
        match run.locate_analysis(None) {
            Err(RunError::AnalysisMissing { checked }) => {
                assert_eq!(
                    checked,
                    vec![run.analysis_json_path(), run.legacy_analysis_path()]
                );
            }
            other => panic!("expected AnalysisMissing, got {other:?}"),
        }
    }
}
