//! The per-session pipeline: stream events in, thought nodes and
//! subscriber events out.
//!
//! One [`AnalysisPipeline::run`] task drives a session from `streaming` to
//! a terminal status. All session mutation for a run happens inside that
//! single task, so appends and publishes for one session never interleave.

use std::sync::Arc;
use std::time::Instant;

use chrono::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::broadcast::{EventBroadcaster, SolutionReadyPayload, ThinkingCompletePayload};
use crate::config::Config;
use crate::error::{SessionError, StreamError};
use crate::parser::ThinkingParser;
use crate::session::{Session, SessionManager, SessionStatus, SessionUpdate};
use crate::stream::{StreamEvent, TokenUsage};
use crate::thought::ThoughtNode;

/// Drives analysis sessions from upstream stream events to broadcast
/// events and terminal session state.
#[derive(Clone)]
pub struct AnalysisPipeline {
    sessions: Arc<SessionManager>,
    broadcaster: Arc<EventBroadcaster>,
    min_segment_words: usize,
    retention: Duration,
}

impl AnalysisPipeline {
    /// Wire a pipeline to its session store and broadcaster.
    pub fn new(
        sessions: Arc<SessionManager>,
        broadcaster: Arc<EventBroadcaster>,
        config: &Config,
    ) -> Self {
        Self {
            sessions,
            broadcaster,
            min_segment_words: config.parser.min_segment_words,
            retention: Duration::hours(config.session.cleanup_hours),
        }
    }

    /// Admit a new analysis session and spawn its driving task.
    ///
    /// Returns the created session plus the sender the external stream
    /// client feeds with [`StreamEvent`]s. Expired sessions are swept as a
    /// side effect of admission, like any other periodic chore.
    pub fn start(
        &self,
        ip_address: &str,
        problem_text: &str,
    ) -> Result<(Session, mpsc::UnboundedSender<StreamEvent>), SessionError> {
        let swept = self.sessions.sweep(self.retention);
        if swept > 0 {
            debug!(removed = swept, "Swept expired sessions before admission");
        }

        let session = self.sessions.create(ip_address)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let pipeline = self.clone();
        let session_id = session.session_id.clone();
        let problem = problem_text.to_string();
        tokio::spawn(async move {
            pipeline.run(&session_id, &problem, rx).await;
        });

        Ok((session, tx))
    }

    /// Consume a session's stream to completion or fatal error.
    ///
    /// The caller owns session creation; this method owns everything after:
    /// status transitions, node production, event publication and the
    /// terminal summary. It never returns an error — every failure path
    /// lands the session in a definitive terminal status instead.
    pub async fn run(
        &self,
        session_id: &str,
        problem_text: &str,
        mut events: mpsc::UnboundedReceiver<StreamEvent>,
    ) {
        let started = Instant::now();
        self.sessions.update(
            session_id,
            SessionUpdate::new()
                .with_status(SessionStatus::Streaming)
                .with_problem_text(problem_text),
        );
        debug!(session_id = %session_id, "Session streaming");

        let mut parser = ThinkingParser::new(session_id, self.min_segment_words);
        let mut solution = String::new();
        let final_usage;

        loop {
            match events.recv().await {
                Some(StreamEvent::ThinkingDelta { text }) => {
                    for node in parser.ingest(&text) {
                        self.emit_node(session_id, node).await;
                    }
                }
                Some(StreamEvent::SolutionDelta { text }) => {
                    solution.push_str(&text);
                }
                Some(StreamEvent::TokenUsage { usage }) => {
                    // Accounting only; token ticks are never broadcast.
                    self.sessions.update(
                        session_id,
                        SessionUpdate::new().with_tokens_used(usage.output_tokens),
                    );
                }
                Some(StreamEvent::ChunkError { message }) => {
                    let err = StreamError::Chunk { message };
                    warn!(session_id = %session_id, error = %err, "Skipped malformed chunk");
                    self.broadcaster
                        .publish_error(session_id, err.message(), err.error_type())
                        .await;
                }
                Some(StreamEvent::Done { usage, stop_reason }) => {
                    debug!(
                        session_id = %session_id,
                        stop_reason = stop_reason.as_deref().unwrap_or("unknown"),
                        "Stream done"
                    );
                    final_usage = usage;
                    break;
                }
                Some(StreamEvent::Failed { message }) => {
                    self.fail(session_id, &StreamError::Upstream { message }).await;
                    return;
                }
                None => {
                    let err = StreamError::Upstream {
                        message: "upstream stream ended unexpectedly".to_string(),
                    };
                    self.fail(session_id, &err).await;
                    return;
                }
            }
        }

        self.complete(session_id, parser, solution, final_usage, started)
            .await;
    }

    async fn complete(
        &self,
        session_id: &str,
        mut parser: ThinkingParser,
        solution: String,
        usage: TokenUsage,
        started: Instant,
    ) {
        // Trailing buffered text becomes one last node, short or not.
        if let Some(node) = parser.finalize() {
            self.emit_node(session_id, node).await;
        }

        self.sessions.update(
            session_id,
            SessionUpdate::new()
                .with_status(SessionStatus::Completed)
                .with_tokens_used(usage.output_tokens)
                .with_solution_text(solution.clone()),
        );

        let total_thoughts = self
            .sessions
            .get(session_id)
            .map(|s| s.thought_nodes.len())
            .unwrap_or(0);
        let duration_seconds = started.elapsed().as_secs_f64();

        self.broadcaster
            .publish_thinking_complete(
                session_id,
                &ThinkingCompletePayload {
                    total_thoughts,
                    total_tokens: usage.output_tokens,
                    duration_seconds,
                    summary: format!("Completed analysis with {total_thoughts} thought nodes"),
                },
            )
            .await;

        if !solution.is_empty() {
            self.broadcaster
                .publish_solution_ready(
                    session_id,
                    &SolutionReadyPayload {
                        solution_text: solution,
                        thinking_node_count: total_thoughts,
                    },
                )
                .await;
        }

        info!(
            session_id = %session_id,
            total_thoughts,
            total_tokens = usage.output_tokens,
            duration_ms = started.elapsed().as_millis() as u64,
            "Analysis completed"
        );
    }

    /// Append to session state first, then publish, so subscribers never
    /// see a node the status query cannot.
    async fn emit_node(&self, session_id: &str, node: ThoughtNode) {
        self.sessions.append_node(session_id, node.clone());
        self.broadcaster.publish_new_thought(session_id, &node).await;
    }

    /// The single fatal path: record, freeze, tell observers. No retry.
    ///
    /// The published `error_message` is the upstream message itself; the
    /// layer is conveyed by the event's `error_type` label instead.
    async fn fail(&self, session_id: &str, err: &StreamError) {
        error!(session_id = %session_id, error = %err, "Analysis failed");
        self.sessions.update(
            session_id,
            SessionUpdate::new()
                .with_status(SessionStatus::Error)
                .with_error_message(err.message()),
        );
        self.broadcaster
            .publish_error(session_id, err.message(), err.error_type())
            .await;
    }
}
