//! Typed boundary with the upstream model-streaming client.
//!
//! The upstream client is an external collaborator; this crate only sees
//! an ordered sequence of [`StreamEvent`]s on a per-session channel. One
//! driving task consumes them, which keeps ordering and failure isolation
//! trivial compared to independent callbacks.

use serde::{Deserialize, Serialize};

/// Token accounting reported by the upstream stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub input_tokens: u64,
    /// Tokens produced so far (thinking plus solution).
    pub output_tokens: u64,
}

/// One event from the upstream reasoning stream, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of thinking text.
    ThinkingDelta { text: String },
    /// A fragment of the final solution text.
    SolutionDelta { text: String },
    /// A token-usage tick; updates accounting only, never broadcast.
    TokenUsage { usage: TokenUsage },
    /// The upstream client skipped a malformed chunk. Non-terminal:
    /// observers are told, consumption continues.
    ChunkError { message: String },
    /// The stream finished normally.
    Done {
        usage: TokenUsage,
        stop_reason: Option<String>,
    },
    /// The stream itself failed; terminal for the session.
    Failed { message: String },
}

impl StreamEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Failed { .. })
    }
}
