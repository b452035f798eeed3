//! Text analysis primitives used by the thinking parser.
//!
//! Everything here is a deterministic keyword/regex heuristic. Reproducing
//! the exact pattern sets and weights matters more than linguistic nuance:
//! two runs over the same text must score identically.

use std::collections::{HashMap, HashSet};

use regex::Regex;

/// Number of keywords kept per segment.
pub const KEYWORD_LIMIT: usize = 5;

const BASE_CONFIDENCE: f64 = 0.70;
const CERTAINTY_WEIGHT: f64 = 0.05;
const HEDGING_WEIGHT: f64 = 0.08;
const QUESTION_WEIGHT: f64 = 0.05;

const CERTAINTY_PATTERNS: &[&str] = &[
    r"\b(clearly|obviously|definitely|certainly|surely|must|will)\b",
    r"\b(always|never|absolutely|undoubtedly|unquestionably)\b",
    r"\b(correct|right|true|exact|precise)\b",
];

const HEDGING_PATTERNS: &[&str] = &[
    r"\b(maybe|perhaps|possibly|probably|might|could|may)\b",
    r"\b(uncertain|unsure|unclear|ambiguous|vague)\b",
    r"\b(seems|appears|suggests|indicates)\b",
    r"\b(somewhat|slightly|fairly|rather|quite)\b",
    r"\b(i think|i believe|i guess|i assume)\b",
];

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "and", "or", "but", "in", "with", "to", "for",
    "of", "as", "by", "that", "this", "from", "are", "was", "were", "been", "be", "have", "has",
    "had", "do", "does", "did", "will", "would", "could", "should", "may", "might", "can", "it",
    "its", "they", "them", "their", "we", "our", "you", "your", "i", "my", "me", "he", "she",
    "him", "her",
];

/// Whole-word referential/causal cues detected in a segment.
///
/// All eight cues are computed; the dependency linking rule currently reads
/// only five of them (`so`, `thus` and `hence` are surfaced but unused by
/// the rule — kept as-is pending product review).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinguisticCues {
    /// Whole-word "therefore" present.
    pub has_therefore: bool,
    /// Whole-word "since" present.
    pub has_since: bool,
    /// Whole-word "this" present.
    pub has_this: bool,
    /// Whole-word "that" present.
    pub has_that: bool,
    /// Whole-word "because" present.
    pub has_because: bool,
    /// Whole-word "so" present (unused by the linking rule).
    pub has_so: bool,
    /// Whole-word "thus" present (unused by the linking rule).
    pub has_thus: bool,
    /// Whole-word "hence" present (unused by the linking rule).
    pub has_hence: bool,
}

impl LinguisticCues {
    /// Whether the segment refers back to earlier reasoning.
    pub fn is_referential(&self) -> bool {
        self.has_this || self.has_that || self.has_therefore || self.has_since || self.has_because
    }
}

/// Compiled pattern sets for keyword extraction, confidence scoring and
/// cue detection. Compile once, reuse per segment.
#[derive(Debug, Clone)]
pub struct TextAnalyzer {
    word_re: Regex,
    certainty: Vec<Regex>,
    hedging: Vec<Regex>,
    cue_therefore: Regex,
    cue_since: Regex,
    cue_this: Regex,
    cue_that: Regex,
    cue_because: Regex,
    cue_so: Regex,
    cue_thus: Regex,
    cue_hence: Regex,
    stop_words: HashSet<&'static str>,
}

impl TextAnalyzer {
    /// Compile the built-in pattern sets.
    pub fn new() -> Self {
        Self {
            word_re: compile(r"\b[a-z]{3,}\b"),
            certainty: CERTAINTY_PATTERNS.iter().map(|p| compile(p)).collect(),
            hedging: HEDGING_PATTERNS.iter().map(|p| compile(p)).collect(),
            cue_therefore: compile(r"\btherefore\b"),
            cue_since: compile(r"\bsince\b"),
            cue_this: compile(r"\bthis\b"),
            cue_that: compile(r"\bthat\b"),
            cue_because: compile(r"\bbecause\b"),
            cue_so: compile(r"\bso\b"),
            cue_thus: compile(r"\bthus\b"),
            cue_hence: compile(r"\bhence\b"),
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Extract up to [`KEYWORD_LIMIT`] keywords ranked by frequency.
    ///
    /// Tokens are lowercase alphabetic runs of length >= 3 with stop words
    /// removed. Frequency ties break on first occurrence, so the output
    /// order is stable for a given text.
    pub fn extract_keywords(&self, text: &str) -> Vec<String> {
        self.keywords(text, KEYWORD_LIMIT)
    }

    /// Extract up to `top_n` keywords ranked by frequency.
    pub fn keywords(&self, text: &str, top_n: usize) -> Vec<String> {
        let lower = text.to_lowercase();

        // (count, first occurrence index) per distinct token
        let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();
        let mut order = 0usize;
        for m in self.word_re.find_iter(&lower) {
            let token = m.as_str();
            if self.stop_words.contains(token) {
                continue;
            }
            let entry = stats.entry(token).or_insert((0, order));
            entry.0 += 1;
            order += 1;
        }

        let mut ranked: Vec<(&str, (usize, usize))> = stats.into_iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
        ranked
            .into_iter()
            .take(top_n)
            .map(|(token, _)| token.to_string())
            .collect()
    }

    /// Score how certain a segment sounds, in [0.0, 1.0].
    ///
    /// Starts at 0.70; each certainty match adds 0.05, each hedging match
    /// subtracts 0.08, each literal `?` subtracts 0.05.
    pub fn confidence(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();

        let certainty: usize = self
            .certainty
            .iter()
            .map(|re| re.find_iter(&lower).count())
            .sum();
        let hedging: usize = self
            .hedging
            .iter()
            .map(|re| re.find_iter(&lower).count())
            .sum();
        let questions = text.matches('?').count();

        let score = BASE_CONFIDENCE + certainty as f64 * CERTAINTY_WEIGHT
            - hedging as f64 * HEDGING_WEIGHT
            - questions as f64 * QUESTION_WEIGHT;

        score.clamp(0.0, 1.0)
    }

    /// Detect referential/causal cues via whole-word matches.
    pub fn linguistic_cues(&self, text: &str) -> LinguisticCues {
        let lower = text.to_lowercase();
        LinguisticCues {
            has_therefore: self.cue_therefore.is_match(&lower),
            has_since: self.cue_since.is_match(&lower),
            has_this: self.cue_this.is_match(&lower),
            has_that: self.cue_that.is_match(&lower),
            has_because: self.cue_because.is_match(&lower),
            has_so: self.cue_so.is_match(&lower),
            has_thus: self.cue_thus.is_match(&lower),
            has_hence: self.cue_hence.is_match(&lower),
        }
    }
}

impl Default for TextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Count keywords shared between two keyword lists (set intersection).
pub fn shared_keyword_count(a: &[String], b: &[String]) -> usize {
    let set: HashSet<&str> = a.iter().map(String::as_str).collect();
    b.iter().filter(|k| set.contains(k.as_str())).count()
}

fn compile(pattern: &str) -> Regex {
    // Patterns are compile-time constants; a failure here is a defect in
    // this file, not a runtime condition.
    Regex::new(pattern).expect("built-in pattern compiles")
}
