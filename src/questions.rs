//! Question list loading.
//!
//! A questions file is markdown where every line starting with a number and
//! `.` or `)` is a question; everything else is commentary.
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::types::QuestionSet;

/// Used when no questions file can be loaded.
pub const FALLBACK_QUESTIONS: &[&str] = &[
    "What are the central claims or charges against the defendant in this document?",
    "What key evidence is presented to support these allegations, including any specific details related to cryptocurrency, digital assets, transactions, or witness statements?",
    "Are there any apparent weaknesses, inconsistencies, or procedural errors in the prosecution's case (such as lack of evidence, jurisdictional issues, or prior conduct references) that could be leveraged in the defense?",
    "What legal precedents, statutes, or regulatory frameworks are referenced, particularly those pertaining to cryptocurrency, digital assets, or asset classification, and how might they impact the case?",
    "What are the imminent deadlines, procedural requirements, or upcoming events (such as status conferences, hearings, detention conditions, or bond matters) that the defense must address promptly?",
];

/// `1.` or `2)` at the start of a line. The pattern is a literal and
/// always compiles.
static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s*").expect("numbered question pattern"));

/// Extract numbered questions from markdown text, in file order.
pub fn parse_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| {
            let found = NUMBERED_LINE.find(line)?;
            let question = line[found.end()..].trim();
            (!question.is_empty()).then(|| question.to_string())
        })
        .collect()
}

/// Load questions from `path`. `None` when the file is missing, unreadable,
/// or contains no numbered lines.
pub fn load_questions(path: &Path) -> Option<QuestionSet> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "questions file not loaded");
            return None;
        }
    };
    let questions = QuestionSet::new(parse_questions(&text));
    if questions.is_empty() {
        tracing::warn!(path = %path.display(), "questions file has no numbered questions");
        return None;
    }
    tracing::info!(path = %path.display(), count = questions.len(), "loaded questions");
    Some(questions)
}

pub fn fallback_questions() -> QuestionSet {
    QuestionSet::new(FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect())
}

/// Where the question set for a run came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionSource {
    File(std::path::PathBuf),
    Fallback,
}

/// Explicit file, then the configured default file, then built-in questions.
pub fn resolve_questions(
    explicit: Option<&Path>,
    default_file: &Path,
) -> (QuestionSet, QuestionSource) {
    for candidate in explicit.into_iter().chain(std::iter::once(default_file)) {
        if let Some(questions) = load_questions(candidate) {
            return (questions, QuestionSource::File(candidate.to_path_buf()));
        }
    }
    (fallback_questions(), QuestionSource::Fallback)
}
