//! Phase 1: per-document question answering.
//!
//! Documents are processed one at a time in file-name order and questions in
//! the order given. A failed extraction or a failed LM call degrades to empty
//! answers; only an empty case directory fails the phase.
use anyhow::Result;
use std::path::Path;

use crate::cache::{AnalysisCache, CacheOutcome};
use crate::error::RunError;
use crate::extract::{discover_documents, TextExtractor};
use crate::fingerprint::{document_name, Fingerprint};
use crate::llm::LlmClient;
use crate::run::RunDescriptor;
use crate::types::{Answers, DocumentAnalysis, QuestionSet};
use crate::util::{preview, truncate_chars};

/// Characters of document text embedded in each question prompt.
pub const DOCUMENT_TEXT_BUDGET: usize = 4000;

/// Phase-1 results plus counters for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub documents: Vec<DocumentAnalysis>,
    pub cache_hits: usize,
    pub blank_documents: usize,
    pub empty_answers: usize,
}

pub struct CaseAnalyzer<'a> {
    run: &'a RunDescriptor,
    client: &'a dyn LlmClient,
    extractor: &'a dyn TextExtractor,
    cache: AnalysisCache,
}

impl<'a> CaseAnalyzer<'a> {
    /// Load the run's cache. Fails if the cache file exists but is corrupt.
    pub fn new(
        run: &'a RunDescriptor,
        client: &'a dyn LlmClient,
        extractor: &'a dyn TextExtractor,
    ) -> Result<Self> {
        let cache = AnalysisCache::load(&run.cache_path())?;
        Ok(Self {
            run,
            client,
            extractor,
            cache,
        })
    }

    /// Analyze every supported document in the case directory.
    pub fn run(&mut self, questions: &QuestionSet) -> Result<AnalysisReport> {
        let documents = discover_documents(self.run.case_dir())?;
        if documents.is_empty() {
            return Err(RunError::NoDocuments {
                case_dir: self.run.case_dir().to_path_buf(),
            }
            .into());
        }
        eprintln!("Found {} documents to analyze", documents.len());

        let mut report = AnalysisReport::default();
        let total = documents.len();
        for (idx, path) in documents.iter().enumerate() {
            eprintln!(
                "Processing document {}/{}: {}",
                idx + 1,
                total,
                document_name(path)
            );
            let (analysis, outcome) = self.analyze_document(path, questions)?;
            if outcome == CacheOutcome::Hit {
                report.cache_hits += 1;
            }
            let empty = analysis.analysis.empty_count();
            let blank = !analysis.analysis.is_empty() && empty == analysis.analysis.len();
            if blank && outcome != CacheOutcome::Hit {
                report.blank_documents += 1;
            }
            report.empty_answers += empty;
            report.documents.push(analysis);
        }
        Ok(report)
    }

    /// Analyze one document, serving it from the cache when its fingerprint
    /// was seen before. A document that cannot be read has no fingerprint; it
    /// is recorded with blank answers and left out of the cache.
    pub fn analyze_document(
        &mut self,
        path: &Path,
        questions: &QuestionSet,
    ) -> Result<(DocumentAnalysis, CacheOutcome)> {
        let fingerprint = match Fingerprint::for_document(path, questions) {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                let filename = document_name(path);
                tracing::error!(document = %filename, error = %format!("{err:#}"), "cannot read document");
                eprintln!("  cannot read {filename}; recording blank answers");
                return Ok((
                    DocumentAnalysis::blank(&filename, questions),
                    CacheOutcome::Uncached,
                ));
            }
        };
        let client = self.client;
        let extractor = self.extractor;
        let run = self.run;
        let model = run.model_id();
        let result = self.cache.get_or_compute(&fingerprint, || {
            compute_analysis(client, extractor, model, path, questions)
        })?;
        if result.1 == CacheOutcome::Hit {
            tracing::info!(document = %path.display(), %fingerprint, "using cached analysis");
            eprintln!("  using cached analysis");
        }
        Ok(result)
    }
}

fn compute_analysis(
    client: &dyn LlmClient,
    extractor: &dyn TextExtractor,
    model: &str,
    path: &Path,
    questions: &QuestionSet,
) -> DocumentAnalysis {
    let filename = document_name(path);
    let text = extractor.extract(path);
    if text.trim().is_empty() {
        tracing::error!(document = %filename, "no text could be extracted");
        eprintln!("  no text could be extracted from {filename}; recording blank answers");
        return DocumentAnalysis::blank(&filename, questions);
    }

    let excerpt = truncate_chars(&text, DOCUMENT_TEXT_BUDGET);
    let total = questions.len();
    let mut answers = Answers::default();
    for (idx, question) in questions.iter().enumerate() {
        eprintln!("  question {}/{}: {}", idx + 1, total, preview(question, 40));
        let task = format!("{filename} q{}/{total}", idx + 1);
        let answer = client.ask(model, &task, &question_prompt(question, excerpt));
        if answer.is_empty() {
            tracing::warn!(document = %filename, question = idx + 1, "empty answer recorded");
        }
        answers.insert(question, answer);
    }
    DocumentAnalysis {
        filename,
        analysis: answers,
    }
}

pub fn question_prompt(question: &str, excerpt: &str) -> String {
    format!(
        "Based on the following legal document, please answer this question:\n\
         {question}\n\n\
         Document text:\n\
         {excerpt}\n"
    )
}
