//! Tool handler trait and implementations.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde_json::Value;

use super::{ToolError, ToolOutput};
use crate::provider::ToolDefinition;

/// Boxed future returned by [`ToolHandler::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + 'a>>;

/// A single tool that can be invoked by the model.
///
/// Implement this trait for tools that need complex state. For simple
/// tools, wrap a closure with [`super::tool_fn`], [`super::tool_fn_with_ctx`],
/// or [`super::tool_fn_sync`].
///
/// `Ctx` is a per-run context handed to every invocation (database
/// handles, user identity, ...). It defaults to `()`.
///
/// The trait is object-safe so handlers can be stored as
/// `Arc<dyn ToolHandler<Ctx>>`.
///
/// ```rust
/// use llm_graph::tool::{ToolError, ToolFuture, ToolHandler, ToolOutput};
/// use llm_graph::{JsonSchema, ToolDefinition};
/// use serde_json::{Value, json};
///
/// struct Session {
///     user_id: String,
/// }
///
/// struct WhoAmI;
///
/// impl ToolHandler<Session> for WhoAmI {
///     fn definition(&self) -> ToolDefinition {
///         ToolDefinition::new(
///             "whoami",
///             "Return the current user id",
///             JsonSchema::new(json!({"type": "object"})),
///         )
///     }
///
///     fn execute<'a>(&'a self, _input: Value, ctx: &'a Session) -> ToolFuture<'a> {
///         Box::pin(async move { Ok(ToolOutput::new(ctx.user_id.clone())) })
///     }
/// }
/// ```
pub trait ToolHandler<Ctx = ()>: Send + Sync {
    /// Returns the tool's definition (name, description, parameter schema).
    fn definition(&self) -> ToolDefinition;

    /// Executes the tool with the given JSON arguments and context.
    fn execute<'a>(&'a self, input: Value, ctx: &'a Ctx) -> ToolFuture<'a>;
}

/// A tool handler backed by an async closure that receives context.
///
/// Created via [`super::tool_fn_with_ctx`].
pub struct FnToolHandler<Ctx, F> {
    pub(crate) definition: ToolDefinition,
    pub(crate) handler: F,
    pub(crate) _ctx: PhantomData<fn(&Ctx)>,
}

impl<Ctx, F> std::fmt::Debug for FnToolHandler<Ctx, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnToolHandler")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

impl<Ctx, F, Fut, O> ToolHandler<Ctx> for FnToolHandler<Ctx, F>
where
    Ctx: Send + Sync + 'static,
    F: for<'c> Fn(Value, &'c Ctx) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Into<ToolOutput> + Send + 'static,
{
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn execute<'a>(&'a self, input: Value, ctx: &'a Ctx) -> ToolFuture<'a> {
        let fut = (self.handler)(input, ctx);
        Box::pin(async move { fut.await.map(Into::into) })
    }
}

/// A context-free async tool handler, created by [`super::tool_fn`].
///
/// Works with any context type; the context is ignored.
pub struct NoCtxToolHandler<F> {
    pub(crate) definition: ToolDefinition,
    pub(crate) handler: F,
}

impl<F> std::fmt::Debug for NoCtxToolHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoCtxToolHandler")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

impl<Ctx, F, Fut, O> ToolHandler<Ctx> for NoCtxToolHandler<F>
where
    Ctx: Send + Sync,
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Into<ToolOutput> + Send + 'static,
{
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn execute<'a>(&'a self, input: Value, _ctx: &'a Ctx) -> ToolFuture<'a> {
        let fut = (self.handler)(input);
        Box::pin(async move { fut.await.map(Into::into) })
    }
}

/// A synchronous, non-suspending tool handler, created by
/// [`super::tool_fn_sync`].
///
/// The closure runs to completion when `execute` is called; the
/// returned future is already resolved.
pub struct SyncToolHandler<F> {
    pub(crate) definition: ToolDefinition,
    pub(crate) handler: F,
}

impl<F> std::fmt::Debug for SyncToolHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncToolHandler")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

impl<Ctx, F, O> ToolHandler<Ctx> for SyncToolHandler<F>
where
    Ctx: Send + Sync,
    F: Fn(Value) -> Result<O, ToolError> + Send + Sync,
    O: Into<ToolOutput>,
{
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn execute<'a>(&'a self, input: Value, _ctx: &'a Ctx) -> ToolFuture<'a> {
        let result = (self.handler)(input).map(Into::into);
        Box::pin(std::future::ready(result))
    }
}
