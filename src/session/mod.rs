//! Session state: the authoritative mutable record for one analysis run.
//!
//! A [`SessionManager`] instance owns all sessions for a process. It is an
//! explicit injected value, not a global, so tests get isolated instances.
//! Mutation is confined behind an internal lock; `update` and `append_node`
//! are deliberately silent no-ops on unknown ids because a session may be
//! swept while its producer is still running.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SessionError;
use crate::thought::ThoughtNode;

/// Lifecycle status of a session.
///
/// Progression is forward-only: `completed` is terminal and `error` is
/// terminal but reachable from any state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, stream not yet started.
    #[default]
    Initializing,
    /// Consuming the upstream stream.
    Streaming,
    /// Finished successfully.
    Completed,
    /// Failed; message recorded on the session.
    Error,
}

impl SessionStatus {
    /// Whether the session is frozen (no further mutation).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Initializing => write!(f, "initializing"),
            SessionStatus::Streaming => write!(f, "streaming"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "initializing" => Ok(SessionStatus::Initializing),
            "streaming" => Ok(SessionStatus::Streaming),
            "completed" => Ok(SessionStatus::Completed),
            "error" => Ok(SessionStatus::Error),
            _ => Err(format!("Unknown session status: {}", s)),
        }
    }
}

/// One analysis request's lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Globally unique identifier.
    pub session_id: String,
    /// Client IP the session was created for.
    pub ip_address: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Creation time; the sweep keys off this regardless of status.
    pub created_at: DateTime<Utc>,
    /// Append-only thought nodes in creation order.
    pub thought_nodes: Vec<ThoughtNode>,
    /// Output tokens reported by the upstream stream.
    pub tokens_used: u64,
    /// The problem statement under analysis.
    pub problem_text: String,
    /// Final solution text, if the run produced one.
    pub solution_text: String,
    /// Failure message for errored sessions.
    pub error_message: Option<String>,
}

impl Session {
    fn new(session_id: String, ip_address: String) -> Self {
        Self {
            session_id,
            ip_address,
            status: SessionStatus::Initializing,
            created_at: Utc::now(),
            thought_nodes: Vec::new(),
            tokens_used: 0,
            problem_text: String::new(),
            solution_text: String::new(),
            error_message: None,
        }
    }

    /// Produce the status query surface for this session.
    pub fn to_status(&self) -> SessionStatusView {
        SessionStatusView {
            session_id: self.session_id.clone(),
            status: self.status,
            thought_count: self.thought_nodes.len(),
            tokens_used: self.tokens_used,
            created_at: self.created_at,
            has_solution: !self.solution_text.is_empty(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Snapshot answering a session status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusView {
    pub session_id: String,
    pub status: SessionStatus,
    pub thought_count: usize,
    pub tokens_used: u64,
    pub created_at: DateTime<Utc>,
    pub has_solution: bool,
    pub error_message: Option<String>,
}

/// Field-wise session update; unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub tokens_used: Option<u64>,
    pub problem_text: Option<String>,
    pub solution_text: Option<String>,
    pub error_message: Option<String>,
}

impl SessionUpdate {
    /// Empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session status.
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the token count.
    pub fn with_tokens_used(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    /// Set the problem text.
    pub fn with_problem_text(mut self, text: impl Into<String>) -> Self {
        self.problem_text = Some(text.into());
        self
    }

    /// Set the solution text.
    pub fn with_solution_text(mut self, text: impl Into<String>) -> Self {
        self.solution_text = Some(text.into());
        self
    }

    /// Set the error message.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Aggregate statistics over all live sessions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub active_ips: usize,
    pub status_breakdown: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    // ip -> session ids ever created for it; pruned lazily on create and
    // eagerly on sweep.
    ip_index: HashMap<String, Vec<String>>,
}

/// Owns every session in the process, with per-IP admission control and
/// time-based cleanup.
#[derive(Debug)]
pub struct SessionManager {
    max_concurrent_per_ip: usize,
    inner: Mutex<Inner>,
}

impl SessionManager {
    /// Create a manager enforcing the given per-IP concurrency cap.
    pub fn new(max_concurrent_per_ip: usize) -> Self {
        Self {
            max_concurrent_per_ip,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session for the given client IP.
    ///
    /// Fails with [`SessionError::RateLimitExceeded`] when the IP already
    /// has the maximum number of non-terminal sessions.
    pub fn create(&self, ip_address: &str) -> Result<Session, SessionError> {
        let mut inner = self.lock();

        let active: Vec<String> = inner
            .ip_index
            .get(ip_address)
            .map(|ids| {
                ids.iter()
                    .filter(|id| {
                        inner
                            .sessions
                            .get(*id)
                            .is_some_and(|s| !s.status.is_terminal())
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if active.len() >= self.max_concurrent_per_ip {
            info!(
                ip = %ip_address,
                limit = self.max_concurrent_per_ip,
                "Session creation refused"
            );
            return Err(SessionError::RateLimitExceeded {
                limit: self.max_concurrent_per_ip,
            });
        }

        let session_id = generate_session_id();
        let session = Session::new(session_id.clone(), ip_address.to_string());

        let mut index = active;
        index.push(session_id.clone());
        inner.ip_index.insert(ip_address.to_string(), index);
        inner.sessions.insert(session_id.clone(), session.clone());

        info!(session_id = %session_id, ip = %ip_address, "Session created");
        Ok(session)
    }

    /// Snapshot a session by id.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.lock().sessions.get(session_id).cloned()
    }

    /// Answer a status query; unknown or swept ids are a distinct NotFound.
    pub fn status(&self, session_id: &str) -> Result<SessionStatusView, SessionError> {
        self.lock()
            .sessions
            .get(session_id)
            .map(Session::to_status)
            .ok_or_else(|| SessionError::NotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Apply a field-wise update.
    ///
    /// No-op (not an error) when the session does not exist; also a no-op
    /// when the session is already terminal, which keeps `tokens_used` and
    /// `solution_text` frozen after completion.
    pub fn update(&self, session_id: &str, update: SessionUpdate) {
        let mut inner = self.lock();
        let Some(session) = inner.sessions.get_mut(session_id) else {
            debug!(session_id = %session_id, "Update for unknown session ignored");
            return;
        };
        if session.status.is_terminal() {
            debug!(session_id = %session_id, "Update for terminal session ignored");
            return;
        }

        if let Some(tokens) = update.tokens_used {
            session.tokens_used = tokens;
        }
        if let Some(text) = update.problem_text {
            session.problem_text = text;
        }
        if let Some(text) = update.solution_text {
            session.solution_text = text;
        }
        if let Some(message) = update.error_message {
            session.error_message = Some(message);
        }
        if let Some(status) = update.status {
            session.status = status;
        }
    }

    /// Append a node to a session; no-op on unknown or terminal sessions.
    pub fn append_node(&self, session_id: &str, node: ThoughtNode) {
        let mut inner = self.lock();
        let Some(session) = inner.sessions.get_mut(session_id) else {
            debug!(session_id = %session_id, "Append for unknown session ignored");
            return;
        };
        if session.status.is_terminal() {
            debug!(session_id = %session_id, "Append for terminal session ignored");
            return;
        }
        session.thought_nodes.push(node);
    }

    /// Remove every session created before `now - max_age`, regardless of
    /// status, and return the removed count.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut inner = self.lock();

        let expired: Vec<String> = inner
            .sessions
            .values()
            .filter(|s| s.created_at < cutoff)
            .map(|s| s.session_id.clone())
            .collect();

        for session_id in &expired {
            if let Some(session) = inner.sessions.remove(session_id) {
                if let Some(ids) = inner.ip_index.get_mut(&session.ip_address) {
                    ids.retain(|id| id != session_id);
                    if ids.is_empty() {
                        inner.ip_index.remove(&session.ip_address);
                    }
                }
            }
        }

        if !expired.is_empty() {
            info!(removed = expired.len(), "Swept expired sessions");
        }
        expired.len()
    }

    /// Number of sessions currently held.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Aggregate statistics across all sessions.
    pub fn stats(&self) -> SessionStats {
        let inner = self.lock();
        let mut status_breakdown: HashMap<String, usize> = HashMap::new();
        for session in inner.sessions.values() {
            *status_breakdown
                .entry(session.status.to_string())
                .or_insert(0) += 1;
        }
        SessionStats {
            total_sessions: inner.sessions.len(),
            active_ips: inner.ip_index.values().filter(|ids| !ids.is_empty()).count(),
            status_breakdown,
        }
    }
}

fn generate_session_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("session_{}", &hex[..16])
}
