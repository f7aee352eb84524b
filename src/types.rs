//! Persisted shapes shared by both phases.
//!
//! `DocumentAnalysis` is the unit written to the phase-1 output file, stored
//! in the cache, and read back by phase 2. Answers keep question order on
//! disk, so the JSON object is written and read in insertion order.
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Ordered questions for one run. Order drives output order and is part of
/// every fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionSet(Vec<String>);

impl QuestionSet {
    pub fn new(questions: Vec<String>) -> Self {
        Self(questions)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical serialized form used for fingerprinting.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

/// Question to answer mapping that preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers(Vec<(String, String)>);

impl Answers {
    /// Every question answered with the empty string.
    pub fn blank(questions: &QuestionSet) -> Self {
        let mut answers = Self::default();
        for question in questions.iter() {
            answers.insert(question, String::new());
        }
        answers
    }

    /// Insert or replace the answer for `question`, keeping its first position.
    pub fn insert(&mut self, question: &str, answer: String) {
        match self.0.iter_mut().find(|(existing, _)| existing == question) {
            Some((_, slot)) => *slot = answer,
            None => self.0.push((question.to_string(), answer)),
        }
    }

    #[cfg(test)]
    pub fn get(&self, question: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == question)
            .map(|(_, answer)| answer.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(question, answer)| (question.as_str(), answer.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn empty_count(&self) -> usize {
        self.0.iter().filter(|(_, answer)| answer.is_empty()).count()
    }
}

impl Serialize for Answers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (question, answer) in &self.0 {
            map.serialize_entry(question, answer)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Answers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AnswersVisitor;

        impl<'de> Visitor<'de> for AnswersVisitor {
            type Value = Answers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of question to answer strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Answers, A::Error> {
                let mut answers = Answers::default();
                while let Some((question, answer)) = access.next_entry::<String, String>()? {
                    answers.insert(&question, answer);
                }
                Ok(answers)
            }
        }

        deserializer.deserialize_map(AnswersVisitor)
    }
}

/// Answers for one document. Write-once per fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub filename: String,
    pub analysis: Answers,
}

impl DocumentAnalysis {
    pub fn blank(filename: &str, questions: &QuestionSet) -> Self {
        Self {
            filename: filename.to_string(),
            analysis: Answers::blank(questions),
        }
    }
}
