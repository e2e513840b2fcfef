//! Spawned runs with a live event stream.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ExecutionGraph, GraphRun, RunControl};
use crate::chat::ChatMessage;
use crate::error::GraphError;
use crate::events::{EventSink, GraphEvent};

/// Spawns a run on the current runtime and returns its event receiver
/// and join handle.
///
/// The receiver yields events in the order the run produces them and
/// closes once the run finishes. The channel holds `buffer` events; a
/// receiver that falls behind slows the run down. Dropping the receiver
/// does not stop the run; use `cancel` for that.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use llm_graph::graph::run_channel;
/// use llm_graph::{ChatMessage, ExecutionGraph, GraphEvent};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(graph: Arc<ExecutionGraph>) {
/// let (mut events, handle) = run_channel(
///     graph,
///     vec![ChatMessage::user("hi")],
///     Arc::new(()),
///     32,
///     CancellationToken::new(),
/// );
/// while let Some(event) = events.recv().await {
///     if let GraphEvent::ModelToken(token) = event {
///         print!("{token}");
///     }
/// }
/// let run = handle.await.unwrap().unwrap();
/// # let _ = run;
/// # }
/// ```
pub fn run_channel<Ctx>(
    graph: Arc<ExecutionGraph<Ctx>>,
    seed: Vec<ChatMessage>,
    ctx: Arc<Ctx>,
    buffer: usize,
    cancel: CancellationToken,
) -> (
    mpsc::Receiver<GraphEvent>,
    JoinHandle<Result<GraphRun, GraphError>>,
)
where
    Ctx: Send + Sync + 'static,
{
    let (events, rx) = EventSink::channel(buffer);
    let control = RunControl::new()
        .with_events(events)
        .with_cancellation(cancel);
    let handle = tokio::spawn(async move { graph.run_with(seed, &ctx, control).await });
    (rx, handle)
}
