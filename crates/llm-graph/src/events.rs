//! Run observation.
//!
//! A graph run can report what it is doing through an [`EventSink`]: the
//! sending half of a bounded `tokio::sync::mpsc` channel. Events are sent
//! in the order the run produces them, and a slow receiver applies
//! backpressure to the run. A dropped receiver is ignored; the run never
//! depends on anyone listening.
//!
//! ```rust,no_run
//! use llm_graph::events::{EventSink, GraphEvent};
//!
//! # async fn example() {
//! let (sink, mut rx) = EventSink::channel(64);
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         if let GraphEvent::ModelToken(token) = event {
//!             print!("{token}");
//!         }
//!     }
//! });
//! # let _ = sink;
//! # }
//! ```

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::chat::ToolResult;
use crate::graph::TerminationReason;
use crate::router::RouterState;

/// Something observable that happened during a run.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum GraphEvent {
    /// A model turn is about to start.
    TurnStart {
        /// One-based turn number.
        iteration: u32,
        /// Messages in the log sent to the model.
        message_count: usize,
    },
    /// A text fragment streamed by the model. Only sent when a sink is
    /// attached, and never committed to the log on its own.
    ModelToken(String),
    /// A tool call is about to execute.
    ToolStart {
        /// The call's id.
        call_id: String,
        /// The tool name.
        name: String,
        /// The call's arguments.
        arguments: Value,
    },
    /// A tool call finished, successfully or not.
    ToolEnd {
        /// The call's id.
        call_id: String,
        /// The tool name.
        name: String,
        /// The result appended to the log.
        result: ToolResult,
        /// Wall-clock execution time.
        duration: Duration,
    },
    /// The router changed state.
    Transition {
        /// State before routing.
        from: RouterState,
        /// State after routing.
        to: RouterState,
    },
    /// The run completed.
    Done {
        /// Model turns taken.
        iterations: u32,
        /// How the run ended.
        termination: TerminationReason,
    },
}

/// Where a run sends its [`GraphEvent`]s. The default sink discards them.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<GraphEvent>>,
}

impl EventSink {
    /// A sink that discards everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Wraps an existing sender.
    pub fn new(tx: mpsc::Sender<GraphEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Creates a bounded channel and returns its sink and receiver.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<GraphEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    /// Returns `true` if events go anywhere.
    pub fn is_active(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Sends one event, waiting for buffer space. Failures are ignored.
    pub async fn emit(&self, event: GraphEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone: nobody is observing.
            let _ = tx.send(event).await;
        }
    }
}
