//! Sequential multi-model runs and the comparison page that links them.
use anyhow::Result;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::defense::DefenseArtifact;
use crate::run::{date_stamp, RunDescriptor};
use crate::util::{display_path, write_atomic};

/// Which models completed the full process and which did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchOutcome {
    pub fn all_failed(&self) -> bool {
        self.successful.is_empty()
    }
}

/// Run `process` once per model in order. A failing model is recorded and
/// the batch moves on.
pub fn run_models<F>(models: &[String], mut process: F) -> BatchOutcome
where
    F: FnMut(&str) -> Result<()>,
{
    let mut outcome = BatchOutcome::default();
    for (idx, model) in models.iter().enumerate() {
        eprintln!("\n=== Model {}/{}: {} ===", idx + 1, models.len(), model);
        match process(model) {
            Ok(()) => outcome.successful.push(model.clone()),
            Err(err) => {
                tracing::error!(model = %model, error = %format!("{err:#}"), "model run failed");
                eprintln!("model {model} failed: {err:#}");
                outcome.failed.push((model.clone(), format!("{err:#}")));
            }
        }
    }
    outcome
}

/// `case/model_comparison_<date>.md`
pub fn comparison_path(case_dir: &Path, date: NaiveDate) -> PathBuf {
    case_dir.join(format!("model_comparison_{}.md", date_stamp(date)))
}

fn link_or_missing(label: &str, path: &Path, case_dir: &Path) -> String {
    if path.is_file() {
        format!("[{}]({})", label, display_path(path, Some(case_dir)))
    } else {
        "missing".to_string()
    }
}

pub fn render_comparison(
    case_dir: &Path,
    date: NaiveDate,
    outcome: &BatchOutcome,
    generated_at: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Model Comparison\n\n");
    out.push_str(&format!("Generated on {generated_at}\n\n"));
    out.push_str("## Models Compared\n\n### Successful Models\n\n");
    for (idx, model) in outcome.successful.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", idx + 1, model));
    }
    if !outcome.failed.is_empty() {
        out.push_str("\n### Failed Models\n\n");
        for (idx, (model, reason)) in outcome.failed.iter().enumerate() {
            out.push_str(&format!("{}. {} ({})\n", idx + 1, model, reason));
        }
    }

    out.push_str("\n## Results\n\n");
    out.push_str("| Model | Analysis | Defense Strategy | Combined Report |\n");
    out.push_str("|-------|----------|------------------|-----------------|\n");
    for model in &outcome.successful {
        let run = RunDescriptor::derive(case_dir, model, None, date);
        let strategy = run
            .defense_dir()
            .join(DefenseArtifact::Strategy.file_name());
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            model,
            link_or_missing("Analysis", &run.analysis_markdown_path(), case_dir),
            link_or_missing("Strategy", &strategy, case_dir),
            link_or_missing("Report", &run.combined_report_path(), case_dir),
        ));
    }
    out
}

/// Write the comparison page. Returns `None` when no model succeeded.
pub fn write_comparison(
    case_dir: &Path,
    date: NaiveDate,
    outcome: &BatchOutcome,
    generated_at: &str,
) -> Result<Option<PathBuf>> {
    if outcome.all_failed() {
        return Ok(None);
    }
    let path = comparison_path(case_dir, date);
    let text = render_comparison(case_dir, date, outcome, generated_at);
    write_atomic(&path, text.as_bytes())?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::fs;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).expect("date")
    }

    #[test]
    fn failing_model_does_not_stop_the_batch() {
        let models = vec!["a".to_string(), "b:7b".to_string(), "c".to_string()];
        let mut seen = Vec::new();
        let outcome = run_models(&models, |model| {
            seen.push(model.to_string());
            if model == "b:7b" {
                Err(anyhow!("server went away"))
            } else {
                Ok(())
            }
        });
        assert_eq!(seen, models);
        assert_eq!(outcome.successful, vec!["a", "c"]);
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.failed[0].1.contains("server went away"));
        assert!(!outcome.all_failed());
    }

    #[test]
    fn comparison_links_existing_outputs_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run = RunDescriptor::resolve(dir.path(), "llama3:8b", None, day()).expect("run");
        fs::write(run.analysis_markdown_path(), "# summary").expect("write md");
        let outcome = BatchOutcome {
            successful: vec!["llama3:8b".to_string()],
            failed: vec![("broken".to_string(), "timeout".to_string())],
        };

        let path = write_comparison(dir.path(), day(), &outcome, "2025-03-14 at 09:00")
            .expect("write")
            .expect("path");
        assert_eq!(path, dir.path().join("model_comparison_20250314.md"));
        let text = fs::read_to_string(path).expect("read");
        assert!(text.contains(
            "| llama3:8b | [Analysis](20250314_llama3_8b/document_analysis_llama3_8b.md) | missing | missing |"
        ));
        assert!(text.contains("### Failed Models\n\n1. broken (timeout)"));
    }

    #[test]
    fn no_page_when_every_model_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = BatchOutcome {
            successful: vec![],
            failed: vec![("m".to_string(), "x".to_string())],
        };
        assert!(write_comparison(dir.path(), day(), &outcome, "now")
            .expect("write")
            .is_none());
        assert!(!comparison_path(dir.path(), day()).exists());
    }
}
