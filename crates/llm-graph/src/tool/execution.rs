//! Batch execution with event reporting.

use std::time::{Duration, Instant};

use futures::{StreamExt, stream};

use super::{DispatchError, ToolRegistry};
use crate::chat::{ToolCall, ToolResult};
use crate::events::{EventSink, GraphEvent};

/// How a batch is executed.
#[derive(Debug, Clone)]
pub(crate) struct DispatchOptions {
    pub parallel: bool,
    pub max_concurrency: usize,
    pub tool_timeout: Option<Duration>,
}

/// Executes indexed calls and returns `(index, result)` pairs sorted by
/// index.
///
/// Non-suspending calls run inline first, in call order. Suspending
/// calls then run concurrently via `buffer_unordered` when `parallel` is
/// set, sequentially otherwise. `ToolStart`/`ToolEnd` pairs are emitted
/// in execution order; use `call_id` to correlate them.
pub(crate) async fn execute_batch<Ctx: Send + Sync + 'static>(
    registry: &ToolRegistry<Ctx>,
    calls: Vec<(usize, ToolCall)>,
    ctx: &Ctx,
    options: &DispatchOptions,
    sink: &EventSink,
) -> Vec<(usize, ToolResult)> {
    let (suspending, inline): (Vec<_>, Vec<_>) = calls
        .into_iter()
        .partition(|(_, call)| registry.may_suspend(&call.name));

    let execute_one = |(index, call): (usize, ToolCall)| async move {
        let ToolCall {
            id,
            name,
            arguments,
        } = call;
        sink.emit(GraphEvent::ToolStart {
            call_id: id.clone(),
            name: name.clone(),
            arguments: arguments.clone(),
        })
        .await;

        let start = Instant::now();
        let outcome = match options.tool_timeout {
            Some(limit) if registry.may_suspend(&name) => {
                tokio::time::timeout(limit, registry.invoke(&name, arguments, ctx))
                    .await
                    .unwrap_or_else(|_| {
                        Err(DispatchError::TimedOut {
                            name: name.clone(),
                            limit,
                        })
                    })
            }
            _ => registry.invoke(&name, arguments, ctx).await,
        };
        let duration = start.elapsed();

        let result = match outcome {
            Ok(output) => ToolResult::success(&id, output.content),
            Err(err) => {
                tracing::warn!(tool = %name, call_id = %id, error = %err, "tool call failed");
                ToolResult::failure(&id, err.to_string())
            }
        };

        sink.emit(GraphEvent::ToolEnd {
            call_id: id,
            name,
            result: result.clone(),
            duration,
        })
        .await;
        (index, result)
    };

    let mut results = Vec::with_capacity(inline.len() + suspending.len());
    for call in inline {
        results.push(execute_one(call).await);
    }

    if options.parallel && suspending.len() > 1 {
        let done: Vec<_> = stream::iter(suspending)
            .map(execute_one)
            .buffer_unordered(options.max_concurrency.max(1))
            .collect()
            .await;
        results.extend(done);
    } else {
        let done: Vec<_> = stream::iter(suspending).then(execute_one).collect().await;
        results.extend(done);
    }

    results.sort_by_key(|(index, _)| *index);
    results
}
