//! Phase 2: defense materials synthesized from the phase-1 analysis.
//!
//! Three artifacts are generated by independent LM calls. An empty answer for
//! one artifact is written as-is and does not stop the others.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RunError;
use crate::llm::LlmClient;
use crate::run::RunDescriptor;
use crate::types::DocumentAnalysis;
use crate::util::{truncate_chars, write_atomic};

/// Characters of the analysis summary embedded in the strategy prompt.
pub const SUMMARY_BUDGET: usize = 6000;

/// The fixed set of phase-2 outputs.
///
/// Only `Strategy` conditions on the analysis. `ActionItems` and `Timeline`
/// use fixed instructional prompts that carry no case content; whether they
/// should is unresolved, so they are kept as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefenseArtifact {
    Strategy,
    ActionItems,
    Timeline,
}

impl DefenseArtifact {
    pub const ALL: [DefenseArtifact; 3] = [Self::Strategy, Self::ActionItems, Self::Timeline];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Strategy => "defense_strategy.md",
            Self::ActionItems => "action_items.md",
            Self::Timeline => "case_timeline.md",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Strategy => "Defense Strategy",
            Self::ActionItems => "Action Items",
            Self::Timeline => "Case Timeline",
        }
    }

    /// Label used for progress output and the LM log.
    pub fn task(self) -> &'static str {
        match self {
            Self::Strategy => "defense strategy",
            Self::ActionItems => "action items",
            Self::Timeline => "timeline",
        }
    }

    fn prompt(self, documents: &[DocumentAnalysis]) -> String {
        match self {
            Self::Strategy => strategy_prompt(documents),
            Self::ActionItems => ACTION_ITEMS_PROMPT.to_string(),
            Self::Timeline => TIMELINE_PROMPT.to_string(),
        }
    }
}

const ACTION_ITEMS_PROMPT: &str = "Based on the defense strategy, please generate a list of specific action items that need to be completed.
Include:
1. Evidence collection tasks
2. Witness interviews needed
3. Legal research requirements
4. Motion filing deadlines
5. Expert consultation needs
Format as a detailed checklist with priorities and responsible parties.
";

const TIMELINE_PROMPT: &str = "Based on the document analysis, create a chronological timeline of events relevant to the case.
Include:
1. Key dates and events
2. Filing deadlines
3. Important procedural dates
4. Relevant historical events
Format as a clear chronological sequence from earliest to latest date, with importance flags.
";

/// Every document name and question/answer pair, in analysis order.
pub fn analysis_summary(documents: &[DocumentAnalysis]) -> String {
    let mut summary = String::from("Document Analysis Summary:\n\n");
    for doc in documents {
        summary.push_str(&format!("Document: {}\n", doc.filename));
        for (question, answer) in doc.analysis.iter() {
            summary.push_str(&format!("{question}\n{answer}\n\n"));
        }
    }
    summary
}

pub fn strategy_prompt(documents: &[DocumentAnalysis]) -> String {
    let summary = analysis_summary(documents);
    format!(
        "Based on the following case document analysis, generate a comprehensive legal defense strategy.
Please include:
1. Key defense arguments
2. Potential weaknesses in the prosecution's case
3. Recommended counter-arguments
4. Suggested evidence to gather or present
5. Possible legal precedents to cite
6. Strategic recommendations

Analysis Summary:
{}
",
        truncate_chars(&summary, SUMMARY_BUDGET)
    )
}

/// Read a phase-1 output file. A missing file and an unparseable one are
/// distinct errors.
pub fn load_analysis(path: &Path) -> Result<Vec<DocumentAnalysis>> {
    if !path.is_file() {
        return Err(RunError::AnalysisMissing {
            checked: vec![path.to_path_buf()],
        }
        .into());
    }
    let bytes = fs::read(path).with_context(|| format!("read analysis {}", path.display()))?;
    let documents: Vec<DocumentAnalysis> =
        serde_json::from_slice(&bytes).map_err(|source| RunError::AnalysisMalformed {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(path = %path.display(), documents = documents.len(), "loaded analysis");
    Ok(documents)
}

/// The generated artifact texts, without headings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefenseMaterials {
    pub strategy: String,
    pub action_items: String,
    pub timeline: String,
}

impl DefenseMaterials {
    pub fn get(&self, artifact: DefenseArtifact) -> &str {
        match artifact {
            DefenseArtifact::Strategy => &self.strategy,
            DefenseArtifact::ActionItems => &self.action_items,
            DefenseArtifact::Timeline => &self.timeline,
        }
    }

    fn set(&mut self, artifact: DefenseArtifact, text: String) {
        match artifact {
            DefenseArtifact::Strategy => self.strategy = text,
            DefenseArtifact::ActionItems => self.action_items = text,
            DefenseArtifact::Timeline => self.timeline = text,
        }
    }
}

pub struct DefenseSynthesizer<'a> {
    run: &'a RunDescriptor,
    client: &'a dyn LlmClient,
}

impl<'a> DefenseSynthesizer<'a> {
    pub fn new(run: &'a RunDescriptor, client: &'a dyn LlmClient) -> Self {
        Self { run, client }
    }

    /// Generate all three artifacts from `documents`.
    pub fn synthesize(&self, documents: &[DocumentAnalysis]) -> DefenseMaterials {
        let mut materials = DefenseMaterials::default();
        for artifact in DefenseArtifact::ALL {
            eprintln!("Generating {}...", artifact.task());
            let text = self
                .client
                .ask(self.run.model_id(), artifact.task(), &artifact.prompt(documents));
            if text.is_empty() {
                tracing::warn!(artifact = artifact.task(), "LM returned no content");
            }
            materials.set(artifact, text);
        }
        materials
    }

    /// Write each artifact under the run's defense directory with its
    /// heading. Returns the written paths in artifact order.
    pub fn write(&self, materials: &DefenseMaterials) -> Result<Vec<PathBuf>> {
        let dir = self.run.defense_dir();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let mut written = Vec::new();
        for artifact in DefenseArtifact::ALL {
            let path = dir.join(artifact.file_name());
            let body = format!("# {}\n\n{}", artifact.title(), materials.get(artifact));
            write_atomic(&path, body.as_bytes())?;
            written.push(path);
        }
        Ok(written)
    }

    /// Synthesize from `documents` and write the results.
    pub fn run(&self, documents: &[DocumentAnalysis]) -> Result<DefenseMaterials> {
        let materials = self.synthesize(documents);
        self.write(&materials)?;
        Ok(materials)
    }
}
