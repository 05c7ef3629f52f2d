//! Question deduplication.
//!
//! Generated questions are compared on a normalized key: surrounding
//! whitespace and quote characters are stripped, letters are lowercased and
//! internal whitespace runs collapse to a single space. Two questions that
//! differ only in those respects count as the same question.

use std::collections::HashSet;

/// Quote characters models like to wrap questions in.
const QUOTES: &[char] = &[
    '"', '\'', '`', '\u{201C}', '\u{201D}', '\u{201E}', '\u{2018}', '\u{2019}', '\u{201A}',
    '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
];

/// Strips surrounding whitespace and quotes, keeping the question's casing.
///
/// Quotes and whitespace are removed repeatedly, so `" 'Wie?' "` becomes
/// `Wie?`.
#[must_use]
pub fn clean_question(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || QUOTES.contains(&c))
        .to_string()
}

/// Returns the comparison key for a question.
#[must_use]
pub fn normalize(question: &str) -> String {
    clean_question(question)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Remembers every question issued in the current session.
#[derive(Debug, Clone, Default)]
pub struct QuestionDeduplicator {
    asked: HashSet<String>,
}

impl QuestionDeduplicator {
    /// Creates an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a deduplicator that already knows `questions`.
    #[must_use]
    pub fn with_questions<I, S>(questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dedup = Self::new();
        for question in questions {
            dedup.accept(question.as_ref());
        }
        dedup
    }

    /// Returns `true` if `candidate` is non-empty and has not been asked yet.
    ///
    /// Does not record anything.
    #[must_use]
    pub fn is_novel(&self, candidate: &str) -> bool {
        let key = normalize(candidate);
        !key.is_empty() && !self.asked.contains(&key)
    }

    /// Records `candidate` if it is novel and reports whether it was.
    ///
    /// Empty candidates are never accepted.
    pub fn accept(&mut self, candidate: &str) -> bool {
        let key = normalize(candidate);
        if key.is_empty() {
            return false;
        }
        self.asked.insert(key)
    }

    /// Number of distinct questions recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.asked.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.asked.is_empty()
    }

    /// Forgets every recorded question.
    pub fn clear(&mut self) {
        self.asked.clear();
    }
}
