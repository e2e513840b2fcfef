//! The execution graph: model node, tool stages, router, loop.
//!
//! ```text
//!            ┌──────────────┐  tool calls   ┌──────────────┐
//!  seed ───▶ │ AwaitingModel│ ────────────▶ │ AwaitingTools│
//!            └──────┬───────┘ ◀──────────── └──────────────┘
//!                   │ no tool calls   batch answered
//!                   ▼
//!                 Done
//! ```
//!
//! An [`ExecutionGraph`] is built once and shared read-only. Each call
//! to [`run`](ExecutionGraph::run) owns its own log and walks the cycle
//! above until the model answers without requesting tools, or until a
//! fatal failure, which comes back as a [`GraphError`] carrying the log
//! so far.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_graph::{ChatMessage, DynProvider, ExecutionGraph, ToolRegistry};
//!
//! # async fn example(provider: Arc<dyn DynProvider>, tools: ToolRegistry) {
//! let graph = ExecutionGraph::new(provider, tools);
//! let run = graph
//!     .run(vec![ChatMessage::user("What's the weather in Paris?")], &())
//!     .await
//!     .unwrap();
//! println!("{}", run.final_text().unwrap_or_default());
//! # }
//! ```

mod channel;
mod config;
mod summarizer;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use channel::run_channel;
pub use config::{GraphConfig, GraphRun, LimitBehavior, TerminationReason};
pub use summarizer::Summarizer;

use crate::chat::{ChatMessage, ChatResponse, ToolCall, ToolResult};
use crate::conversation::ConversationState;
use crate::error::{GraphError, GraphFailure};
use crate::events::{EventSink, GraphEvent};
use crate::invoker::{ModelInvoker, assign_call_ids};
use crate::provider::{DynProvider, ToolChoice, ToolDefinition};
use crate::router::{RouterState, ToolSelector};
use crate::tool::ToolRegistry;
use crate::tool::execution::{DispatchOptions, execute_batch};
use crate::usage::Usage;

/// A named group of tools with a selector deciding which calls it takes.
pub struct ToolStage<Ctx = ()>
where
    Ctx: Send + Sync + 'static,
{
    name: String,
    selector: ToolSelector,
    registry: Arc<ToolRegistry<Ctx>>,
}

impl<Ctx: Send + Sync + 'static> ToolStage<Ctx> {
    /// Creates a stage.
    pub fn new(
        name: impl Into<String>,
        selector: ToolSelector,
        registry: Arc<ToolRegistry<Ctx>>,
    ) -> Self {
        Self {
            name: name.into(),
            selector,
            registry,
        }
    }

    /// The stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if this stage runs calls to `tool`.
    pub fn handles(&self, tool: &str) -> bool {
        self.selector.accepts(tool) && self.registry.contains(tool)
    }

    fn definitions(&self) -> impl Iterator<Item = ToolDefinition> + '_ {
        self.registry
            .definitions()
            .into_iter()
            .filter(|def| self.selector.accepts(&def.name))
    }
}

impl<Ctx: Send + Sync + 'static> Clone for ToolStage<Ctx> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            selector: self.selector.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<Ctx: Send + Sync + 'static> std::fmt::Debug for ToolStage<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStage")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("tools", &self.registry.len())
            .finish()
    }
}

/// Per-run observation and cancellation.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    /// Where events go. Discarded by default.
    pub events: EventSink,
    /// Cancels the run at its next suspension point.
    pub cancel: CancellationToken,
}

impl RunControl {
    /// No events, never cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Stops the run when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A compiled model/tool graph. `Send + Sync`; run it as often and as
/// concurrently as needed.
pub struct ExecutionGraph<Ctx = ()>
where
    Ctx: Send + Sync + 'static,
{
    model: ModelInvoker,
    stages: Vec<ToolStage<Ctx>>,
    summarizer: Option<Summarizer>,
    config: GraphConfig,
    tool_definitions: Vec<ToolDefinition>,
}

impl<Ctx: Send + Sync + 'static> std::fmt::Debug for ExecutionGraph<Ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGraph")
            .field("model", &self.model)
            .field("stages", &self.stages)
            .field("summarizer", &self.summarizer.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExecutionGraph<()> {
    /// A single-stage graph with default configuration.
    pub fn new(provider: Arc<dyn DynProvider>, tools: ToolRegistry) -> Self {
        Self::builder(provider).tools(tools).build()
    }
}

impl<Ctx: Send + Sync + 'static> ExecutionGraph<Ctx> {
    /// Starts building a graph around `provider`.
    pub fn builder(provider: Arc<dyn DynProvider>) -> GraphBuilder<Ctx> {
        GraphBuilder::new(provider)
    }

    /// The run configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Tools offered to the model, sorted by name.
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.tool_definitions
    }

    /// Runs the graph from `seed` with no observer and no cancellation.
    pub async fn run(&self, seed: Vec<ChatMessage>, ctx: &Ctx) -> Result<GraphRun, GraphError> {
        self.run_with(seed, ctx, RunControl::default()).await
    }

    /// Runs the graph from `seed`.
    ///
    /// The returned log is the seed followed by every message the run
    /// appended. On failure the [`GraphError`] carries the log up to the
    /// last complete boundary.
    #[tracing::instrument(
        skip_all,
        fields(
            model = %self.model.metadata().model,
            seed_len = seed.len(),
            max_iterations = self.config.max_iterations,
        )
    )]
    pub async fn run_with(
        &self,
        seed: Vec<ChatMessage>,
        ctx: &Ctx,
        control: RunControl,
    ) -> Result<GraphRun, GraphError> {
        let conversation = match ConversationState::from_seed(seed) {
            Ok(conversation) => conversation,
            Err((cause, log)) => {
                warn!(error = %cause, "rejected seed log");
                return Err(GraphError {
                    state: RouterState::AwaitingModel,
                    cause,
                    log,
                    iterations: 0,
                });
            }
        };

        let mut run = RunState {
            conversation,
            iterations: 0,
            tool_calls_executed: 0,
            total_usage: Usage::default(),
            after_tools: false,
            termination: TerminationReason::Complete,
            deadline: self.config.timeout.map(|limit| (Instant::now() + limit, limit)),
        };

        loop {
            let step = match run.conversation.state() {
                RouterState::AwaitingModel => self.model_step(&mut run, &control).await,
                RouterState::AwaitingTools => self.tool_step(&mut run, ctx, &control).await,
                RouterState::Done => break,
            };
            if let Err(cause) = step {
                warn!(
                    state = %run.conversation.state(),
                    iterations = run.iterations,
                    error = %cause,
                    "graph run failed"
                );
                return Err(run.fail(cause));
            }

            let transition = run.conversation.advance();
            if transition.changed() {
                debug!(from = %transition.from, to = %transition.to, "router transition");
                control
                    .events
                    .emit(GraphEvent::Transition {
                        from: transition.from,
                        to: transition.to,
                    })
                    .await;
            }
        }

        debug!(
            iterations = run.iterations,
            tool_calls = run.tool_calls_executed,
            "graph run complete"
        );
        control
            .events
            .emit(GraphEvent::Done {
                iterations: run.iterations,
                termination: run.termination,
            })
            .await;

        Ok(GraphRun {
            log: run.conversation.into_messages(),
            iterations: run.iterations,
            tool_calls_executed: run.tool_calls_executed,
            total_usage: run.total_usage,
            termination: run.termination,
        })
    }

    async fn model_step(&self, run: &mut RunState, control: &RunControl) -> Result<(), GraphFailure> {
        let limit = self.config.max_iterations;
        let mut final_turn = false;
        if run.iterations >= limit {
            match self.config.on_limit {
                LimitBehavior::Fail => return Err(GraphFailure::IterationLimit { limit }),
                LimitBehavior::FinalAnswer => {
                    warn!(limit, "iteration limit reached, requesting final answer");
                    final_turn = true;
                }
            }
        }

        run.iterations += 1;
        let log = run.conversation.log().as_slice();
        debug!(iteration = run.iterations, messages = log.len(), "model turn");
        control
            .events
            .emit(GraphEvent::TurnStart {
                iteration: run.iterations,
                message_count: log.len(),
            })
            .await;

        let sink = &control.events;
        let (response, tool_less) = match &self.summarizer {
            Some(summarizer) if run.after_tools => {
                let fut = summarizer.summarize(log, sink);
                (run.guarded(fut, control).await??, true)
            }
            _ if final_turn => {
                let fut = self.model.invoke_with(
                    log,
                    &self.tool_definitions,
                    Some(ToolChoice::None),
                    sink,
                );
                (run.guarded(fut, control).await??, true)
            }
            _ => {
                let fut = self.model.invoke_with(log, &self.tool_definitions, None, sink);
                (run.guarded(fut, control).await??, false)
            }
        };

        let mut response = assign_call_ids(response, run.iterations)?;
        if tool_less && !response.tool_calls.is_empty() {
            warn!(
                calls = response.tool_calls.len(),
                "dropping tool calls from a tool-less turn"
            );
            response.tool_calls.clear();
        }
        if final_turn {
            run.termination = TerminationReason::IterationLimit { limit };
        }
        run.commit(response)
    }

    async fn tool_step(
        &self,
        run: &mut RunState,
        ctx: &Ctx,
        control: &RunControl,
    ) -> Result<(), GraphFailure> {
        let calls: Vec<(usize, ToolCall)> = run
            .conversation
            .pending_tool_calls()
            .into_iter()
            .cloned()
            .enumerate()
            .collect();
        let count = calls.len();
        debug!(calls = count, "dispatching tool batch");

        let results = run
            .guarded(self.dispatch(calls, ctx, &control.events), control)
            .await?;
        run.conversation.append_tool_results(results)?;
        run.tool_calls_executed += count;
        run.after_tools = true;
        Ok(())
    }

    /// Routes each call to the first stage that handles it and runs the
    /// stages in declaration order. Unhandled calls become unknown-tool
    /// results. Results come back in call order.
    async fn dispatch(
        &self,
        calls: Vec<(usize, ToolCall)>,
        ctx: &Ctx,
        sink: &EventSink,
    ) -> Vec<ToolResult> {
        let mut buckets: Vec<Vec<(usize, ToolCall)>> = vec![Vec::new(); self.stages.len()];
        let mut unrouted = Vec::new();
        for (index, call) in calls {
            match self.stages.iter().position(|stage| stage.handles(&call.name)) {
                Some(stage) => buckets[stage].push((index, call)),
                None => unrouted.push((index, call)),
            }
        }

        let options = DispatchOptions {
            parallel: self.config.parallel_tool_execution,
            max_concurrency: self.config.max_concurrency,
            tool_timeout: self.config.tool_timeout,
        };
        let mut results = Vec::new();
        for (stage, bucket) in self.stages.iter().zip(buckets) {
            if bucket.is_empty() {
                continue;
            }
            debug!(stage = %stage.name, calls = bucket.len(), "running tool stage");
            results.extend(execute_batch(&stage.registry, bucket, ctx, &options, sink).await);
        }
        if !unrouted.is_empty() {
            let empty = ToolRegistry::<Ctx>::new();
            results.extend(execute_batch(&empty, unrouted, ctx, &options, sink).await);
        }

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

/// Mutable bookkeeping of one run.
struct RunState {
    conversation: ConversationState,
    iterations: u32,
    tool_calls_executed: usize,
    total_usage: Usage,
    after_tools: bool,
    termination: TerminationReason,
    deadline: Option<(Instant, Duration)>,
}

impl RunState {
    /// Awaits `fut` unless the run is cancelled or out of time first.
    async fn guarded<F: Future>(
        &self,
        fut: F,
        control: &RunControl,
    ) -> Result<F::Output, GraphFailure> {
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some((at, limit)) => {
                    tokio::time::sleep_until(at).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            () = control.cancel.cancelled() => Err(GraphFailure::Cancelled),
            limit = expired => Err(GraphFailure::Timeout { limit }),
            output = fut => Ok(output),
        }
    }

    fn commit(&mut self, response: ChatResponse) -> Result<(), GraphFailure> {
        self.total_usage += response.usage;
        self.conversation.append(response.into_message())
    }

    fn fail(self, cause: GraphFailure) -> GraphError {
        GraphError {
            state: self.conversation.state(),
            cause,
            iterations: self.iterations,
            log: self.conversation.into_messages(),
        }
    }
}

/// Assembles an [`ExecutionGraph`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use llm_graph::graph::{GraphConfig, Summarizer};
/// use llm_graph::{DynProvider, ExecutionGraph, ToolRegistry, ToolSelector};
///
/// # fn example(model: Arc<dyn DynProvider>, writer: Arc<dyn DynProvider>, tools: ToolRegistry) {
/// let tools = Arc::new(tools);
/// let graph = ExecutionGraph::builder(model)
///     .stage("search", ToolSelector::only(["web_search"]), tools.clone())
///     .stage("fetch", ToolSelector::only(["fetch_page"]), tools)
///     .summarizer(Summarizer::new(writer, "Summarize the page for the user."))
///     .config(GraphConfig { max_iterations: 4, ..Default::default() })
///     .build();
/// # let _ = graph;
/// # }
/// ```
pub struct GraphBuilder<Ctx = ()>
where
    Ctx: Send + Sync + 'static,
{
    model: ModelInvoker,
    stages: Vec<ToolStage<Ctx>>,
    summarizer: Option<Summarizer>,
    config: GraphConfig,
}

impl<Ctx: Send + Sync + 'static> GraphBuilder<Ctx> {
    /// Starts with no tools and default configuration.
    pub fn new(provider: Arc<dyn DynProvider>) -> Self {
        Self {
            model: ModelInvoker::new(provider),
            stages: Vec::new(),
            summarizer: None,
            config: GraphConfig::default(),
        }
    }

    /// Adds a stage named `tools` that accepts every call.
    #[must_use]
    pub fn tools(self, registry: ToolRegistry<Ctx>) -> Self {
        self.stage("tools", ToolSelector::All, Arc::new(registry))
    }

    /// Adds a stage. Calls go to the first stage that handles them.
    #[must_use]
    pub fn stage(
        mut self,
        name: impl Into<String>,
        selector: ToolSelector,
        registry: Arc<ToolRegistry<Ctx>>,
    ) -> Self {
        self.stages.push(ToolStage::new(name, selector, registry));
        self
    }

    /// Serves the turn after each tool batch with `summarizer`.
    #[must_use]
    pub fn summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Replaces the run configuration.
    #[must_use]
    pub fn config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    /// Sampling temperature for the main model.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.model = self.model.with_temperature(temperature);
        self
    }

    /// Token cap for the main model.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.model = self.model.with_max_tokens(max_tokens);
        self
    }

    /// System prompt for the main model, used when the log has none.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.model = self.model.with_system(prompt);
        self
    }

    /// Per-request transport timeout for the main model.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.model = self.model.with_request_timeout(timeout);
        self
    }

    /// Finishes the graph.
    ///
    /// The model is offered every tool some stage would run; a name
    /// present in several stages is listed once, first stage winning.
    pub fn build(self) -> ExecutionGraph<Ctx> {
        let mut seen = HashSet::new();
        let mut tool_definitions: Vec<ToolDefinition> = self
            .stages
            .iter()
            .flat_map(|stage| stage.definitions())
            .filter(|def| seen.insert(def.name.clone()))
            .collect();
        tool_definitions.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(
            stages = self.stages.len(),
            tools = tool_definitions.len(),
            summarizer = self.summarizer.is_some(),
            "built execution graph"
        );
        ExecutionGraph {
            model: self.model,
            stages: self.stages,
            summarizer: self.summarizer,
            config: self.config,
            tool_definitions,
        }
    }
}
