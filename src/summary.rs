//! Human-readable markdown rendering of phase-1 results.
use crate::types::DocumentAnalysis;

/// Anchor id for a question heading, mirroring the quick-links list.
fn section_id(question: &str) -> String {
    let slug: String = question
        .to_lowercase()
        .chars()
        .filter(|ch| !matches!(ch, '?' | ',' | '\'' | '"' | '(' | ')'))
        .map(|ch| if ch.is_whitespace() { '-' } else { ch })
        .collect();
    slug.chars().take(30).collect()
}

/// Render the analysis summary. `generated_at` is a preformatted timestamp.
pub fn render_analysis_summary(
    documents: &[DocumentAnalysis],
    model: &str,
    generated_at: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Document Analysis Summary\n\n");
    out.push_str(&format!(
        "*Generated using the {model} model on {generated_at}*\n\n"
    ));
    out.push_str("## Overview\n\n### Analyzed Documents\n\n");
    for (idx, doc) in documents.iter().enumerate() {
        out.push_str(&format!("{}. **{}**\n", idx + 1, doc.filename));
    }
    out.push('\n');

    out.push_str("## Document Details\n\n");
    for (doc_idx, doc) in documents.iter().enumerate() {
        out.push_str(&format!("### {}\n\n", doc.filename));
        out.push_str("**Quick Links:**\n\n");
        for (idx, (question, _)) in doc.analysis.iter().enumerate() {
            out.push_str(&format!(
                "- [{}. {}](#d{}-{})\n",
                idx + 1,
                question,
                doc_idx + 1,
                section_id(question)
            ));
        }
        out.push('\n');
        for (question, answer) in doc.analysis.iter() {
            out.push_str(&format!(
                "<a id='d{}-{}'></a>\n",
                doc_idx + 1,
                section_id(question)
            ));
            out.push_str(&format!("#### {question}\n\n"));
            if answer.is_empty() {
                out.push_str("*No answer was produced.*\n\n");
            } else {
                out.push_str(&format!("{answer}\n\n"));
            }
            out.push_str("---\n\n");
        }
    }
    out.push_str("\n*End of Document Analysis Summary*\n");
    out
}
