//! Merge the phase-1 summary and the phase-2 artifacts into one report.
//!
//! Best effort: a missing input becomes a caveat in the report and in the
//! returned `CombineReport`, never an error.
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::defense::DefenseArtifact;
use crate::run::RunDescriptor;
use crate::util::{display_path, write_atomic};

/// The four inputs of a combined report, in report order.
#[derive(Debug, Clone)]
pub struct CombineInputs {
    pub analysis_summary: PathBuf,
    pub defense_strategy: PathBuf,
    pub action_items: PathBuf,
    pub timeline: PathBuf,
}

impl CombineInputs {
    /// The standard locations inside `run`.
    pub fn for_run(run: &RunDescriptor) -> Self {
        let defense = run.defense_dir();
        Self {
            analysis_summary: run.analysis_markdown_path(),
            defense_strategy: defense.join(DefenseArtifact::Strategy.file_name()),
            action_items: defense.join(DefenseArtifact::ActionItems.file_name()),
            timeline: defense.join(DefenseArtifact::Timeline.file_name()),
        }
    }

    fn sections(&self) -> [(&'static str, &Path); 4] {
        [
            ("Document Analysis", self.analysis_summary.as_path()),
            (DefenseArtifact::Strategy.title(), self.defense_strategy.as_path()),
            (DefenseArtifact::ActionItems.title(), self.action_items.as_path()),
            (DefenseArtifact::Timeline.title(), self.timeline.as_path()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct CombineReport {
    pub output: PathBuf,
    pub included: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

/// Write `case/<date>_<model>.md` from whichever inputs exist.
pub fn combine(run: &RunDescriptor, inputs: &CombineInputs) -> Result<CombineReport> {
    let output = run.combined_report_path();
    let mut included = Vec::new();
    let mut missing = Vec::new();
    let mut body = String::new();

    for (title, path) in inputs.sections() {
        match fs::read_to_string(path) {
            Ok(text) => {
                body.push_str(&format!("<a id='{}'></a>\n\n", anchor(title)));
                body.push_str(text.trim_end());
                body.push_str("\n\n---\n\n");
                included.push(path.to_path_buf());
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "combined report input missing");
                missing.push(path.to_path_buf());
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!("# Case Report: {}\n\n", run.model_id()));
    out.push_str(&format!(
        "*Run directory: {}*\n\n",
        display_path(run.run_dir(), Some(run.case_dir()))
    ));
    if !missing.is_empty() {
        out.push_str("> **Incomplete report.** These inputs were not available:\n");
        for path in &missing {
            out.push_str(&format!(
                "> - {}\n",
                display_path(path, Some(run.case_dir()))
            ));
        }
        out.push('\n');
    }
    out.push_str("## Contents\n\n");
    for (title, path) in inputs.sections() {
        if included.iter().any(|item| item == path) {
            out.push_str(&format!("- [{}](#{})\n", title, anchor(title)));
        }
    }
    out.push_str("\n---\n\n");
    out.push_str(&body);

    write_atomic(&output, out.as_bytes())?;
    Ok(CombineReport {
        output,
        included,
        missing,
    })
}

fn anchor(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}
