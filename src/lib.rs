//! # Thoughtstream
//!
//! Converts an incremental, streamed reasoning trace from a language-model
//! API into a structured, dependency-linked graph of thought nodes, pushed
//! to live subscribers as they are produced.
//!
//! ## Architecture
//!
//! ```text
//! upstream stream → AnalysisPipeline → ThinkingParser → ThoughtNode
//!                         ↓                                  ↓
//!                   SessionManager (append)      EventBroadcaster (publish)
//!                                                            ↓
//!                                                    subscriber sinks
//! ```
//!
//! The upstream model client and the subscriber transport are external
//! collaborators: the crate consumes typed [`stream::StreamEvent`]s and
//! hands [`broadcast::EventEnvelope`]s to [`broadcast::EventSink`]
//! implementations. Classification is deterministic keyword/regex
//! heuristics throughout — no statistical inference, no persistence.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use thoughtstream::{AnalysisPipeline, Config, EventBroadcaster, SessionManager};
//! use thoughtstream::stream::StreamEvent;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     thoughtstream::config::init_logging(&config.logging);
//!
//!     let sessions = Arc::new(SessionManager::new(config.session.max_concurrent_per_ip));
//!     let broadcaster = Arc::new(EventBroadcaster::new());
//!     let pipeline = AnalysisPipeline::new(sessions, broadcaster, &config);
//!
//!     let (session, tx) = pipeline.start("203.0.113.7", "Reverse a linked list")?;
//!     // The external stream client now feeds `tx` with StreamEvents.
//!     tx.send(StreamEvent::ThinkingDelta { text: "First, ...".into() })?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Text analysis primitives: keywords, confidence, linguistic cues.
pub mod analysis;
/// Event envelopes and per-session subscriber fanout.
pub mod broadcast;
/// Configuration management and logging setup.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Incremental segmentation and thought node building.
pub mod parser;
/// The orchestrating state machine driving each session.
pub mod pipeline;
/// Session state, admission control and cleanup.
pub mod session;
/// Typed events consumed from the upstream model stream.
pub mod stream;
/// The thought graph data model.
pub mod thought;

pub use broadcast::{EventBroadcaster, EventEnvelope, EventSink, EventType};
pub use config::Config;
pub use error::{AppError, AppResult, SessionError};
pub use parser::ThinkingParser;
pub use pipeline::AnalysisPipeline;
pub use session::{Session, SessionManager, SessionStatus};
pub use thought::{Position, ThoughtNode, ThoughtType};
