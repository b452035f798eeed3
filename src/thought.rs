//! Thought graph data model.
//!
//! A [`ThoughtNode`] is the structured record produced from one text
//! segment of a reasoning trace. Nodes are immutable once built: the
//! session owns them append-only and the broadcaster serializes them
//! by reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a thought based on its dominant thinking pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtType {
    /// Problem examination and requirement gathering.
    #[default]
    Analysis,
    /// Commitment to an approach.
    Decision,
    /// Checking or validating a result.
    Verification,
    /// Considering a different approach.
    Alternative,
    /// Concrete construction of the solution.
    Implementation,
}

impl std::fmt::Display for ThoughtType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThoughtType::Analysis => write!(f, "analysis"),
            ThoughtType::Decision => write!(f, "decision"),
            ThoughtType::Verification => write!(f, "verification"),
            ThoughtType::Alternative => write!(f, "alternative"),
            ThoughtType::Implementation => write!(f, "implementation"),
        }
    }
}

impl std::str::FromStr for ThoughtType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "analysis" => Ok(ThoughtType::Analysis),
            "decision" => Ok(ThoughtType::Decision),
            "verification" => Ok(ThoughtType::Verification),
            "alternative" => Ok(ThoughtType::Alternative),
            "implementation" => Ok(ThoughtType::Implementation),
            _ => Err(format!("Unknown thought type: {}", s)),
        }
    }
}

/// 2D coordinate for graph layout.
///
/// Purely cosmetic; a deterministic function of the node sequence number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One classified unit of reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtNode {
    /// Unique within the session, monotonically assigned.
    pub id: String,
    /// Heuristic classification of the thought.
    #[serde(rename = "type")]
    pub kind: ThoughtType,
    /// Trimmed segment text (at least 10 characters).
    pub content: String,
    /// Confidence score in [0.0, 1.0].
    pub confidence: f64,
    /// Up to 5 distinct lowercase terms, most frequent first.
    pub keywords: Vec<String>,
    /// Ids of strictly earlier nodes in the same session.
    pub dependencies: Vec<String>,
    /// Layout position.
    pub position: Position,
    /// When the node was created.
    pub timestamp: DateTime<Utc>,
    /// Session this thought belongs to.
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thought_type_display_round_trip() {
        for kind in [
            ThoughtType::Analysis,
            ThoughtType::Decision,
            ThoughtType::Verification,
            ThoughtType::Alternative,
            ThoughtType::Implementation,
        ] {
            let parsed: ThoughtType = kind.to_string().parse().expect("round trip");
            assert_eq!(parsed, kind);
        }
        assert!("daydream".parse::<ThoughtType>().is_err());
    }

    #[test]
    fn test_node_serializes_type_field() {
        let node = ThoughtNode {
            id: "s_node_1".to_string(),
            kind: ThoughtType::Verification,
            content: "check the invariant holds".to_string(),
            confidence: 0.7,
            keywords: vec!["invariant".to_string()],
            dependencies: vec![],
            position: Position { x: 0.0, y: 0.0 },
            timestamp: Utc::now(),
            session_id: "s".to_string(),
        };
        let value = serde_json::to_value(&node).expect("serialize");
        assert_eq!(value["type"], "verification");
        assert_eq!(value["position"]["x"], 0.0);
    }
}
