//! Event fanout to live subscribers.
//!
//! The broadcaster maps a session id to its subscriber set and wraps every
//! domain event in a timestamped envelope. Delivery is best-effort and
//! at-most-once: events are never queued for late joiners, and a subscriber
//! that fails delivery is dropped from the set without disturbing the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::SinkResult;
use crate::thought::ThoughtNode;

/// Identifies one registration within the broadcaster.
pub type SubscriberId = u64;

/// A live subscriber connection, owned by the transport layer.
///
/// The broadcaster only needs to hand envelopes to it; framing, buffering
/// and socket lifetime are the implementor's concern.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one envelope. An error drops this subscriber.
    async fn deliver(&self, event: &EventEnvelope) -> SinkResult<()>;
}

/// Kind of event pushed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Registration acknowledgment, sent to one subscriber only.
    Connected,
    /// A freshly built thought node.
    NewThought,
    /// The thinking stream finished; carries run totals.
    ThinkingComplete,
    /// A non-empty final solution was produced.
    SolutionReady,
    /// A failure observers should know about.
    Error,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Connected => write!(f, "connected"),
            EventType::NewThought => write!(f, "new_thought"),
            EventType::ThinkingComplete => write!(f, "thinking_complete"),
            EventType::SolutionReady => write!(f, "solution_ready"),
            EventType::Error => write!(f, "error"),
        }
    }
}

/// Envelope wrapping every event delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// What happened.
    pub event_type: EventType,
    /// Which session it happened in.
    pub session_id: String,
    /// Event payload, shaped per event type.
    pub data: Value,
    /// When the envelope was built.
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Build an envelope stamped with the current time.
    pub fn new(event_type: EventType, session_id: &str, data: Value) -> Self {
        Self {
            event_type,
            session_id: session_id.to_string(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Payload of a `thinking_complete` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingCompletePayload {
    pub total_thoughts: usize,
    pub total_tokens: u64,
    pub duration_seconds: f64,
    pub summary: String,
}

/// Payload of a `solution_ready` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionReadyPayload {
    pub solution_text: String,
    pub thinking_node_count: usize,
}

/// Payload of an `error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error_message: String,
    pub error_type: String,
}

#[derive(Clone)]
struct Registration {
    id: SubscriberId,
    sink: Arc<dyn EventSink>,
}

/// Per-session subscriber registry and event publisher.
pub struct EventBroadcaster {
    subscribers: Mutex<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl EventBroadcaster {
    /// Create an empty broadcaster.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Registration>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber for a session and acknowledge it directly.
    ///
    /// The `connected` envelope goes to this subscriber alone. A failed
    /// acknowledgment is logged but does not revoke the registration; the
    /// subscriber will be pruned on its first failed broadcast instead.
    pub async fn register(&self, session_id: &str, sink: Arc<dyn EventSink>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(session_id.to_string())
            .or_default()
            .push(Registration {
                id,
                sink: Arc::clone(&sink),
            });
        debug!(session_id = %session_id, subscriber_id = id, "Subscriber registered");

        let ack = EventEnvelope::new(
            EventType::Connected,
            session_id,
            json!({ "message": "Connected to thinking stream" }),
        );
        if let Err(err) = sink.deliver(&ack).await {
            warn!(
                session_id = %session_id,
                subscriber_id = id,
                error = %err,
                "Connection acknowledgment failed"
            );
        }
        id
    }

    /// Remove a subscriber; empty session entries are dropped entirely.
    pub fn unregister(&self, session_id: &str, subscriber_id: SubscriberId) {
        let mut subscribers = self.lock();
        if let Some(entries) = subscribers.get_mut(session_id) {
            entries.retain(|r| r.id != subscriber_id);
            if entries.is_empty() {
                subscribers.remove(session_id);
            }
        }
        debug!(session_id = %session_id, subscriber_id, "Subscriber unregistered");
    }

    /// Number of live subscribers for a session.
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.lock().get(session_id).map_or(0, Vec::len)
    }

    /// Whether a session has any live subscribers.
    pub fn has_subscribers(&self, session_id: &str) -> bool {
        self.subscriber_count(session_id) > 0
    }

    /// Publish an event to every subscriber of a session.
    ///
    /// No-op when the session has no subscribers. Each delivery failure is
    /// contained to its subscriber: the failing sink is unregistered and
    /// the rest still receive the event.
    pub async fn publish(&self, session_id: &str, event_type: EventType, data: Value) {
        let targets: Vec<Registration> = match self.lock().get(session_id) {
            Some(entries) if !entries.is_empty() => entries.clone(),
            _ => return,
        };

        let envelope = EventEnvelope::new(event_type, session_id, data);

        let mut failed = Vec::new();
        for registration in &targets {
            if let Err(err) = registration.sink.deliver(&envelope).await {
                warn!(
                    session_id = %session_id,
                    subscriber_id = registration.id,
                    event_type = %event_type,
                    error = %err,
                    "Dropping subscriber after failed delivery"
                );
                failed.push(registration.id);
            }
        }

        for subscriber_id in failed {
            self.unregister(session_id, subscriber_id);
        }
    }

    /// Publish a freshly built thought node.
    pub async fn publish_new_thought(&self, session_id: &str, node: &ThoughtNode) {
        let data = to_event_value(node, "new_thought payload");
        self.publish(session_id, EventType::NewThought, data).await;
    }

    /// Publish the end-of-thinking summary.
    pub async fn publish_thinking_complete(
        &self,
        session_id: &str,
        payload: &ThinkingCompletePayload,
    ) {
        let data = to_event_value(payload, "thinking_complete payload");
        self.publish(session_id, EventType::ThinkingComplete, data)
            .await;
    }

    /// Publish the final solution.
    pub async fn publish_solution_ready(&self, session_id: &str, payload: &SolutionReadyPayload) {
        let data = to_event_value(payload, "solution_ready payload");
        self.publish(session_id, EventType::SolutionReady, data)
            .await;
    }

    /// Publish an error event.
    pub async fn publish_error(&self, session_id: &str, error_message: &str, error_type: &str) {
        let payload = ErrorPayload {
            error_message: error_message.to_string(),
            error_type: error_type.to_string(),
        };
        let data = to_event_value(&payload, "error payload");
        self.publish(session_id, EventType::Error, data).await;
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a payload for an envelope, degrading to an error object
/// rather than dropping the event when serialization fails.
fn to_event_value<T: Serialize>(value: &T, context: &str) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        warn!(error = %e, context = %context, "Failed to serialize event payload");
        json!({
            "serialization_error": e.to_string(),
            "context": context
        })
    })
}
