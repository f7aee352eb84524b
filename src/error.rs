//! Error kinds the command boundary needs to tell apart.
//!
//! Everything else travels as `anyhow::Error`; these variants are recovered
//! from the chain in `main` to pick a remediation hint.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("cannot reach the LM server at {endpoint}: {reason}")]
    Connectivity { endpoint: String, reason: String },

    #[error("analysis not found (checked {})", join_paths(.checked))]
    AnalysisMissing { checked: Vec<PathBuf> },

    #[error("analysis file {} is malformed: {source}", .path.display())]
    AnalysisMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("analysis cache {} is malformed: {source}", .path.display())]
    CacheMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no supported documents found in {}", .case_dir.display())]
    NoDocuments { case_dir: PathBuf },
}

impl RunError {
    /// Follow-up advice printed under the error line.
    pub fn remediation(&self, model: &str) -> String {
        match self {
            Self::Connectivity { .. } => {
                "start the server or pass --ollama-host/--ollama-port".to_string()
            }
            Self::AnalysisMissing { .. } => format!(
                "run `docket analyze --dir <case-dir> {model}` first to generate the analysis file"
            ),
            Self::AnalysisMalformed { path, .. } => format!(
                "the analysis state is corrupted; delete {} and rerun `docket analyze`",
                path.display()
            ),
            Self::CacheMalformed { path, .. } => format!(
                "the cache is corrupted; delete {} to start fresh",
                path.display()
            ),
            Self::NoDocuments { .. } => {
                "add .pdf or .txt documents to the case directory".to_string()
            }
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Find the first `RunError` in an error chain.
pub fn find_run_error(err: &anyhow::Error) -> Option<&RunError> {
    err.chain().find_map(|cause| cause.downcast_ref::<RunError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn missing_analysis_names_every_checked_location() {
        let err = RunError::AnalysisMissing {
            checked: vec![
                PathBuf::from("/case/20250101_m/document_analysis_m.json"),
                PathBuf::from("/case/document_analysis_m.json"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("/case/20250101_m/document_analysis_m.json"));
        assert!(text.contains("/case/document_analysis_m.json"));
        assert!(err.remediation("m").contains("docket analyze"));
    }

    #[test]
    fn run_error_is_found_through_context() {
        let result: anyhow::Result<()> = Err(RunError::NoDocuments {
            case_dir: PathBuf::from("/case"),
        })
        .context("analyze phase");
        let err = result.expect_err("error");
        assert!(matches!(
            find_run_error(&err),
            Some(RunError::NoDocuments { .. })
        ));
    }

    #[test]
    fn malformed_and_missing_have_different_remediation() {
        let source = serde_json::from_str::<serde_json::Value>("{").expect_err("bad json");
        let malformed = RunError::AnalysisMalformed {
            path: PathBuf::from("/case/a.json"),
            source,
        };
        let missing = RunError::AnalysisMissing { checked: vec![] };
        assert_ne!(malformed.remediation("m"), missing.remediation("m"));
    }
}
