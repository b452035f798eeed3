//! Integration tests for incremental segmentation and node building.

use pretty_assertions::assert_eq;

use thoughtstream::parser::ThinkingParser;
use thoughtstream::thought::{ThoughtNode, ThoughtType};

const TRACE: &str = "First, we need to check the bounds. Then, we verify the result. \
                     This confirms the logic. So we proceed with implementation of the final code.";

/// Drain a parser over chunked input, then finalize.
fn parse_chunked(session_id: &str, min_words: usize, chunks: &[&str]) -> Vec<ThoughtNode> {
    let mut parser = ThinkingParser::new(session_id, min_words);
    let mut nodes = Vec::new();
    for chunk in chunks {
        nodes.extend(parser.ingest(chunk));
    }
    if let Some(node) = parser.finalize() {
        nodes.push(node);
    }
    nodes
}

#[test]
fn test_two_fragment_trace_emits_before_finalize() {
    let (first_half, second_half) = TRACE.split_at(TRACE.len() / 2);

    let mut parser = ThinkingParser::new("scenario", 10);
    let early = parser.ingest(first_half);
    let mut late = parser.ingest(second_half);
    assert!(
        !early.is_empty(),
        "a complete segment should emerge before finalize"
    );

    let residual = parser.finalize().expect("exactly one residual segment");
    assert!(parser.finalize().is_none());
    late.push(residual.clone());
    assert_eq!(late.len(), 1, "the tail collapses into one residual node");

    // The residual talks about implementing the final code.
    assert_eq!(residual.kind, ThoughtType::Implementation);
    // "This" refers back to the earlier verification step.
    assert!(!residual.dependencies.is_empty());
}

#[test]
fn test_chunked_and_one_shot_agree() {
    let one_shot = parse_chunked("a", 10, &[TRACE]);

    let mut pieces = Vec::new();
    let bytes = TRACE.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let end = usize::min(i + 11, bytes.len());
        pieces.push(std::str::from_utf8(&bytes[i..end]).expect("ascii"));
        i = end;
    }
    let chunked = parse_chunked("b", 10, &pieces);

    let contents = |nodes: &[ThoughtNode]| -> Vec<String> {
        nodes.iter().map(|n| n.content.clone()).collect()
    };
    assert_eq!(contents(&one_shot), contents(&chunked));

    let kinds = |nodes: &[ThoughtNode]| -> Vec<ThoughtType> {
        nodes.iter().map(|n| n.kind).collect()
    };
    assert_eq!(kinds(&one_shot), kinds(&chunked));
}

#[test]
fn test_node_invariants_over_long_trace() {
    let trace = "Let's analyze the caching problem and understand what the requirements say. \
                 We should choose a doubly linked list because ordering matters here. \
                 Alternatively a balanced tree could also work instead of the list. \
                 We verify that the eviction test covers the empty cache case. \
                 Now we implement the cache class and write the eviction function code. \
                 This confirms the design holds and the cache behaves correctly under load.";

    let nodes = parse_chunked("long", 12, &[trace]);
    assert!(nodes.len() >= 3);

    let suffix = |id: &str| -> u64 {
        id.rsplit('_')
            .next()
            .and_then(|n| n.parse().ok())
            .expect("numeric id suffix")
    };

    for (i, node) in nodes.iter().enumerate() {
        assert!(node.confidence >= 0.0 && node.confidence <= 1.0);
        assert!(node.keywords.len() <= 5);
        let mut unique = node.keywords.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), node.keywords.len(), "duplicate keywords");

        assert!(node.content.trim().len() >= 10);
        assert_eq!(node.session_id, "long");
        assert_eq!(suffix(&node.id), i as u64 + 1);

        let own = suffix(&node.id);
        if i == 0 {
            assert!(node.dependencies.is_empty());
        } else {
            assert!(!node.dependencies.is_empty(), "node {own} has no links");
        }
        for dep in &node.dependencies {
            assert!(suffix(dep) < own, "forward or self reference");
        }
    }
}

#[test]
fn test_unpunctuated_stream_emits_only_at_finalize() {
    let mut parser = ThinkingParser::new("raw", 20);
    for _ in 0..10 {
        assert!(parser
            .ingest("tokens arriving without any terminal punctuation ")
            .is_empty());
    }
    let node = parser.finalize().expect("single node at finalize");
    assert!(node.content.split_whitespace().count() >= 50);
}

#[test]
fn test_short_final_fragment_still_emitted() {
    // Below the word minimum but over the character minimum: finalize
    // accepts what ingest would keep buffering.
    let mut parser = ThinkingParser::new("tail", 20);
    assert!(parser.ingest("check the boundary condition").is_empty());
    let node = parser.finalize().expect("short final segment");
    assert_eq!(node.kind, ThoughtType::Verification);
}
