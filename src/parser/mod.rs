//! Incremental thinking parser: segmentation, classification and
//! dependency inference.
//!
//! Streamed reasoning text arrives mid-sentence, so the parser buffers
//! fragments and only cuts segments at sentence boundaries once enough
//! words have accumulated. Each completed segment becomes at most one
//! [`ThoughtNode`].

use std::collections::VecDeque;

use chrono::Utc;
use regex::Regex;
use tracing::debug;

use crate::analysis::{shared_keyword_count, TextAnalyzer};
use crate::error::SegmentError;
use crate::thought::{Position, ThoughtNode, ThoughtType};

/// Segments shorter than this (trimmed) never become nodes.
pub const MIN_SEGMENT_CHARS: usize = 10;

/// How many recent nodes are retained for dependency detection.
const RECENT_WINDOW: usize = 5;
/// How many of the most recent nodes are scanned for shared keywords.
const DEPENDENCY_SCAN: usize = 3;
/// Shared-keyword threshold for a topical dependency link.
const SHARED_KEYWORD_LINK: usize = 2;

const X_STEP: f64 = 200.0;
const Y_STEP: f64 = 100.0;

/// Fixed classification table in tie-break priority order: the most
/// specific signal wins a tied score, so implementation outranks
/// verification, which outranks decision, alternative and analysis.
const CLASSIFIER_TABLE: &[(ThoughtType, &[&str])] = &[
    (
        ThoughtType::Implementation,
        &[
            "implement",
            "code",
            "function",
            "class",
            "def",
            "create",
            "build",
            "write",
            "develop",
            "construct",
        ],
    ),
    (
        ThoughtType::Verification,
        &[
            "check",
            "verify",
            "confirm",
            "ensure",
            "test",
            "validate",
            "prove",
            "demonstrate",
            "show that",
        ],
    ),
    (
        ThoughtType::Decision,
        &[
            "will use",
            "best approach",
            "should",
            "choose",
            "decide",
            "select",
            "opt for",
            "go with",
            "prefer",
        ],
    ),
    (
        ThoughtType::Alternative,
        &[
            "alternatively",
            "another option",
            "could also",
            "or",
            "instead",
            "different approach",
            "other way",
            "else",
        ],
    ),
    (
        ThoughtType::Analysis,
        &[
            "need to",
            "first",
            "let's",
            "consider",
            "analyze",
            "understand",
            "examine",
            "look at",
            "review",
            "assess",
        ],
    ),
];

/// Classify a segment by scoring each thought type's keyword set.
///
/// Scoring is case-insensitive substring presence (one point per keyword
/// found). Highest score wins; ties resolve to the earlier table entry;
/// an all-zero score defaults to analysis.
pub fn classify(text: &str) -> ThoughtType {
    let lower = text.to_lowercase();
    let mut best = ThoughtType::Analysis;
    let mut best_score = 0usize;
    for (kind, keywords) in CLASSIFIER_TABLE {
        let score = keywords.iter().filter(|kw| lower.contains(**kw)).count();
        if score > best_score {
            best_score = score;
            best = *kind;
        }
    }
    best
}

/// Per-session incremental parser.
///
/// Holds the accumulation buffer, the node counter, the rolling window of
/// recent nodes, and the layout cursor. One instance per session; never
/// shared across sessions.
#[derive(Debug)]
pub struct ThinkingParser {
    session_id: String,
    min_segment_words: usize,
    analyzer: TextAnalyzer,
    sentence_re: Regex,
    buffer: String,
    node_counter: u64,
    recent: VecDeque<ThoughtNode>,
    x: f64,
    y: f64,
}

impl ThinkingParser {
    /// Create a parser for one session.
    pub fn new(session_id: impl Into<String>, min_segment_words: usize) -> Self {
        Self {
            session_id: session_id.into(),
            min_segment_words,
            analyzer: TextAnalyzer::new(),
            // Sentence-terminal punctuation must be followed by whitespace;
            // a trailing "." with no space is still mid-stream.
            sentence_re: Regex::new(r"[.!?]+\s+").expect("built-in pattern compiles"),
            buffer: String::new(),
            node_counter: 0,
            recent: VecDeque::with_capacity(RECENT_WINDOW + 1),
            x: 0.0,
            y: 0.0,
        }
    }

    /// Number of nodes produced so far.
    pub fn node_count(&self) -> u64 {
        self.node_counter
    }

    /// Text currently buffered awaiting a segment boundary.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Feed one streamed fragment; returns nodes for every segment that
    /// completed as a result.
    ///
    /// The whole buffer is re-split on sentence boundaries and sentences are
    /// greedily grouped until a group reaches the minimum word count. Of the
    /// resulting candidates, all but the last are emitted; the last is
    /// retained as the new buffer even if it met the threshold, so at most
    /// one partial segment is ever pending.
    pub fn ingest(&mut self, chunk: &str) -> Vec<ThoughtNode> {
        self.buffer.push_str(chunk);

        let mut candidates = self.segment_candidates();
        if candidates.len() < 2 {
            return Vec::new();
        }

        let Some(tail) = candidates.pop() else {
            return Vec::new();
        };
        self.buffer = tail;

        let mut nodes = Vec::with_capacity(candidates.len());
        for segment in candidates {
            match self.build_node(&segment) {
                Ok(node) => nodes.push(node),
                Err(err) => {
                    debug!(session_id = %self.session_id, error = %err, "Skipping segment");
                }
            }
        }
        nodes
    }

    /// Flush the residual buffer at stream end.
    ///
    /// Short final fragments that would normally be held back are emitted
    /// here regardless of word count (the character minimum still applies).
    /// Calling again on an empty buffer yields nothing.
    pub fn finalize(&mut self) -> Option<ThoughtNode> {
        let residual = std::mem::take(&mut self.buffer);
        let trimmed = residual.trim();
        if trimmed.is_empty() {
            return None;
        }
        match self.build_node(trimmed) {
            Ok(node) => Some(node),
            Err(err) => {
                debug!(session_id = %self.session_id, error = %err, "Dropping residual segment");
                None
            }
        }
    }

    /// Split the buffer into sentence groups: every group but possibly the
    /// last has reached the minimum word count.
    fn segment_candidates(&self) -> Vec<String> {
        let mut candidates = Vec::new();
        let mut current = String::new();

        for sentence in self.sentence_re.split(&self.buffer) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            if current.is_empty() {
                current.push_str(sentence);
            } else {
                current.push_str(". ");
                current.push_str(sentence);
            }
            if current.split_whitespace().count() >= self.min_segment_words {
                candidates.push(std::mem::take(&mut current));
            }
        }

        if !current.is_empty() {
            candidates.push(current);
        }
        candidates
    }

    fn build_node(&mut self, segment: &str) -> Result<ThoughtNode, SegmentError> {
        let content = segment.trim();
        if content.len() < MIN_SEGMENT_CHARS {
            return Err(SegmentError::TooShort { len: content.len() });
        }

        self.node_counter += 1;
        let id = format!("{}_node_{}", self.session_id, self.node_counter);
        let kind = classify(content);
        let keywords = self.analyzer.extract_keywords(content);
        let confidence = self.analyzer.confidence(content);
        let position = self.next_position();
        let dependencies = self.detect_dependencies(content, &keywords);

        let node = ThoughtNode {
            id,
            kind,
            content: content.to_string(),
            confidence,
            keywords,
            dependencies,
            position,
            timestamp: Utc::now(),
            session_id: self.session_id.clone(),
        };

        self.recent.push_back(node.clone());
        if self.recent.len() > RECENT_WINDOW {
            self.recent.pop_front();
        }

        Ok(node)
    }

    /// Snake layout: x advances per node; every 3rd node wraps to a new row.
    fn next_position(&mut self) -> Position {
        let position = Position {
            x: self.x,
            y: self.y,
        };
        self.x += X_STEP;
        if self.node_counter % 3 == 0 {
            self.y += Y_STEP;
            self.x = 0.0;
        }
        position
    }

    /// Link the new node to prior nodes in this session.
    ///
    /// Referential cues link to the immediate predecessor; the last 3 nodes
    /// (most recent first) are scanned for >= 2 shared keywords; a node with
    /// no links falls back to its immediate predecessor. Every node except
    /// a session's first therefore has at least one dependency.
    fn detect_dependencies(&self, content: &str, keywords: &[String]) -> Vec<String> {
        let mut dependencies = Vec::new();

        let cues = self.analyzer.linguistic_cues(content);
        if cues.is_referential() {
            if let Some(prev) = self.recent.back() {
                dependencies.push(prev.id.clone());
            }
        }

        for recent in self.recent.iter().rev().take(DEPENDENCY_SCAN) {
            if shared_keyword_count(keywords, &recent.keywords) >= SHARED_KEYWORD_LINK
                && !dependencies.contains(&recent.id)
            {
                dependencies.push(recent.id.clone());
            }
        }

        if dependencies.is_empty() {
            if let Some(prev) = self.recent.back() {
                dependencies.push(prev.id.clone());
            }
        }

        dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_sentence(word: &str, words: usize) -> String {
        let mut s = vec![word; words].join(" ");
        s.push_str(". ");
        s
    }

    #[test]
    fn test_classify_defaults_to_analysis() {
        assert_eq!(classify("xyzzy qwerty"), ThoughtType::Analysis);
    }

    #[test]
    fn test_classify_picks_highest_score() {
        assert_eq!(
            classify("we will check and verify and validate the output"),
            ThoughtType::Verification
        );
        assert_eq!(
            classify("implement the function and write the code"),
            ThoughtType::Implementation
        );
    }

    #[test]
    fn test_classify_tie_breaks_by_specificity() {
        // "implement" (implementation) vs "verify" (verification): one
        // keyword each, implementation outranks.
        assert_eq!(
            classify("implement then verify"),
            ThoughtType::Implementation
        );
        // "check" (verification) vs "should" (decision): verification wins.
        assert_eq!(classify("should check"), ThoughtType::Verification);
    }

    #[test]
    fn test_no_emission_below_threshold() {
        let mut parser = ThinkingParser::new("s1", 20);
        let nodes = parser.ingest("A short sentence. Another short one. ");
        assert!(nodes.is_empty());
        assert!(!parser.pending().is_empty());
    }

    #[test]
    fn test_complete_segment_emitted_partial_buffered() {
        let mut parser = ThinkingParser::new("s1", 5);
        let nodes = parser.ingest(
            "The segmenter groups sentences until the word minimum is reached. Trailing text",
        );
        assert_eq!(nodes.len(), 1);
        assert_eq!(parser.pending(), "Trailing text");
    }

    #[test]
    fn test_last_candidate_held_back_even_if_complete() {
        let mut parser = ThinkingParser::new("s1", 5);
        // Two complete groups and no trailing partial: the second group is
        // still held as the buffer.
        let text = format!("{}{}", long_sentence("alpha", 6), long_sentence("bravo", 6));
        let nodes = parser.ingest(&text);
        assert_eq!(nodes.len(), 1);
        assert!(parser.pending().contains("bravo"));

        let residual = parser.finalize().expect("residual node");
        assert!(residual.content.contains("bravo"));
    }

    #[test]
    fn test_no_punctuation_accumulates_until_finalize() {
        let mut parser = ThinkingParser::new("s1", 5);
        assert!(parser.ingest("stream of words without any ").is_empty());
        assert!(parser.ingest("sentence punctuation at all").is_empty());
        let node = parser.finalize().expect("one node at finalize");
        assert!(node.content.starts_with("stream of words"));
        assert_eq!(parser.node_count(), 1);
    }

    #[test]
    fn test_finalize_idempotent() {
        let mut parser = ThinkingParser::new("s1", 5);
        parser.ingest("some residual words worth keeping around");
        assert!(parser.finalize().is_some());
        assert!(parser.finalize().is_none());
        assert!(parser.finalize().is_none());
    }

    #[test]
    fn test_short_residual_dropped() {
        let mut parser = ThinkingParser::new("s1", 5);
        parser.ingest("tiny");
        assert!(parser.finalize().is_none());
        assert_eq!(parser.node_count(), 0);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let text = "First we examine the problem statement carefully! Then we choose a data \
                    structure that fits. We verify the invariants hold under load? Finally we \
                    write the implementation and test it end to end. A trailing partial thought";

        let mut one_shot = ThinkingParser::new("s1", 8);
        let mut expected: Vec<String> = one_shot
            .ingest(text)
            .into_iter()
            .map(|n| n.content)
            .collect();
        if let Some(node) = one_shot.finalize() {
            expected.push(node.content);
        }

        let mut incremental = ThinkingParser::new("s2", 8);
        let mut actual = Vec::new();
        for chunk in text.as_bytes().chunks(7) {
            let chunk = std::str::from_utf8(chunk).expect("ascii chunk");
            actual.extend(incremental.ingest(chunk).into_iter().map(|n| n.content));
        }
        if let Some(node) = incremental.finalize() {
            actual.push(node.content);
        }

        assert_eq!(expected, actual);
    }

    #[test]
    fn test_node_ids_monotonic_per_session() {
        let mut parser = ThinkingParser::new("sess", 4);
        let mut text = String::new();
        for i in 0..6 {
            text.push_str(&long_sentence(&format!("word{i}"), 5));
        }
        let mut nodes = parser.ingest(&text);
        if let Some(node) = parser.finalize() {
            nodes.push(node);
        }
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.id, format!("sess_node_{}", i + 1));
        }
    }

    #[test]
    fn test_first_node_has_no_dependencies() {
        let mut parser = ThinkingParser::new("s1", 5);
        // "this" is referential but there is no prior node to link to.
        let nodes = parser.ingest(
            "this references nothing earlier at all despite the cue word. more words follow here",
        );
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].dependencies.is_empty());

        let second = parser.finalize().expect("residual node");
        assert_eq!(second.dependencies, vec![nodes[0].id.clone()]);
    }

    #[test]
    fn test_later_nodes_always_linked() {
        let mut parser = ThinkingParser::new("s1", 4);
        let text = format!(
            "{}{}{}",
            long_sentence("alpha", 5),
            long_sentence("bravo", 5),
            long_sentence("charlie", 5)
        );
        let mut nodes = parser.ingest(&text);
        if let Some(node) = parser.finalize() {
            nodes.push(node);
        }
        assert!(nodes.len() >= 2);
        for node in &nodes[1..] {
            assert!(!node.dependencies.is_empty());
        }
    }

    #[test]
    fn test_shared_keywords_link_back_past_predecessor() {
        let mut parser = ThinkingParser::new("s1", 3);
        let first = parser
            .build_node("cache eviction policy cache eviction")
            .expect("node");
        parser
            .build_node("unrelated zebra giraffe penguin words")
            .expect("node");
        let third = parser
            .build_node("cache eviction refinement cache eviction")
            .expect("node");
        assert!(third.dependencies.contains(&first.id));
    }

    #[test]
    fn test_no_forward_or_self_references() {
        let mut parser = ThinkingParser::new("s1", 4);
        let mut text = String::new();
        for i in 0..8 {
            text.push_str(&long_sentence(&format!("topic{i}"), 5));
        }
        let mut nodes = parser.ingest(&text);
        if let Some(node) = parser.finalize() {
            nodes.push(node);
        }
        let suffix = |id: &str| -> u64 {
            id.rsplit('_')
                .next()
                .and_then(|n| n.parse().ok())
                .expect("numeric id suffix")
        };
        for node in &nodes {
            let own = suffix(&node.id);
            for dep in &node.dependencies {
                assert!(suffix(dep) < own);
            }
        }
    }

    #[test]
    fn test_snake_layout_positions() {
        let mut parser = ThinkingParser::new("s1", 3);
        let positions: Vec<Position> = (0..5)
            .map(|i| {
                parser
                    .build_node(&format!("segment number {i} with enough characters"))
                    .expect("node")
                    .position
            })
            .collect();
        assert_eq!((positions[0].x, positions[0].y), (0.0, 0.0));
        assert_eq!((positions[1].x, positions[1].y), (200.0, 0.0));
        assert_eq!((positions[2].x, positions[2].y), (400.0, 0.0));
        // Counter hit 3 after the third node: row advances, x resets.
        assert_eq!((positions[3].x, positions[3].y), (0.0, 100.0));
        assert_eq!((positions[4].x, positions[4].y), (200.0, 100.0));
    }

    #[test]
    fn test_keyword_and_confidence_invariants() {
        let mut parser = ThinkingParser::new("s1", 3);
        let node = parser
            .build_node(
                "clearly the cache eviction policy must evict the oldest cache entry first",
            )
            .expect("node");
        assert!(node.confidence >= 0.0 && node.confidence <= 1.0);
        assert!(node.keywords.len() <= 5);
        let mut unique = node.keywords.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), node.keywords.len());
    }
}
