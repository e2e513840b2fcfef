//! Tool registry for managing and executing tools.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use super::execution::{DispatchOptions, execute_batch};
use super::{DispatchError, ToolHandler, ToolOutput};
use crate::chat::{ToolCall, ToolResult};
use crate::events::EventSink;
use crate::provider::ToolDefinition;

/// A registry of tool handlers, indexed by exact name.
///
/// Generic over the context type `Ctx` passed to handlers on every
/// call. Built once at startup and then shared read-only, typically
/// behind an `Arc`, across any number of concurrent runs.
pub struct ToolRegistry<Ctx = ()>
where
    Ctx: Send + Sync + 'static,
{
    pub(crate) handlers: HashMap<String, Arc<dyn ToolHandler<Ctx>>>,
}

impl<Ctx> Default for ToolRegistry<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<Ctx> Clone for ToolRegistry<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    /// Clones the `Arc` pointers, not the handlers.
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<Ctx> std::fmt::Debug for ToolRegistry<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry")
            .field("tools", &names)
            .finish()
    }
}

impl<Ctx: Send + Sync + 'static> ToolRegistry<Ctx> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool handler.
    ///
    /// If a handler with the same name already exists, it is replaced.
    pub fn register(&mut self, handler: impl ToolHandler<Ctx> + 'static) -> &mut Self {
        let name = handler.definition().name;
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    /// Registers a shared tool handler.
    pub fn register_shared(&mut self, handler: Arc<dyn ToolHandler<Ctx>>) -> &mut Self {
        let name = handler.definition().name;
        self.handlers.insert(name, handler);
        self
    }

    /// Returns the handler for the given tool name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler<Ctx>>> {
        self.handlers.get(name)
    }

    /// Returns whether a tool with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Returns the definitions of all registered tools, sorted by name.
    ///
    /// This is the snapshot offered to the model on each turn.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.handlers.values().map(|h| h.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Returns the number of registered tools.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns a new registry excluding the named tools.
    #[must_use]
    pub fn without<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let exclude: HashSet<&str> = names.into_iter().collect();
        self.filtered(|name| !exclude.contains(name))
    }

    /// Returns a new registry with only the named tools.
    ///
    /// ```rust
    /// use llm_graph::ToolRegistry;
    ///
    /// let full: ToolRegistry = ToolRegistry::new();
    /// // ... register tools ...
    /// let search_only = full.only(["search_tool"]);
    /// assert!(search_only.is_empty());
    /// ```
    #[must_use]
    pub fn only<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let include: HashSet<&str> = names.into_iter().collect();
        self.filtered(|name| include.contains(name))
    }

    fn filtered(&self, keep: impl Fn(&str) -> bool) -> Self {
        Self {
            handlers: self
                .handlers
                .iter()
                .filter(|(name, _)| keep(name))
                .map(|(name, handler)| (name.clone(), Arc::clone(handler)))
                .collect(),
        }
    }

    /// Whether a call to `name` may suspend. Unknown tools resolve
    /// immediately to an error, so they count as non-suspending.
    pub(crate) fn may_suspend(&self, name: &str) -> bool {
        self.handlers
            .get(name)
            .is_some_and(|h| h.definition().may_suspend)
    }

    /// Resolves, validates and runs one call.
    ///
    /// 1. Looks up the handler by exact name
    /// 2. Validates arguments against the parameter schema (feature `schema`)
    /// 3. Invokes the handler with the provided context
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        ctx: &Ctx,
    ) -> Result<ToolOutput, DispatchError> {
        let Some(handler) = self.handlers.get(name) else {
            return Err(DispatchError::UnknownTool {
                name: name.to_owned(),
            });
        };

        #[cfg(feature = "schema")]
        {
            let definition = handler.definition();
            if let Err(e) = definition.parameters.validate(&arguments) {
                return Err(DispatchError::InvalidArguments {
                    name: name.to_owned(),
                    message: e.to_string(),
                });
            }
        }

        handler
            .execute(arguments, ctx)
            .await
            .map_err(|source| DispatchError::Execution {
                name: name.to_owned(),
                source,
            })
    }

    /// Executes a single tool call.
    ///
    /// Always produces a [`ToolResult`]; failures are reported with
    /// `success = false` and the error text as content.
    pub async fn execute(&self, call: &ToolCall, ctx: &Ctx) -> ToolResult {
        match self.invoke(&call.name, call.arguments.clone(), ctx).await {
            Ok(output) => ToolResult::success(&call.id, output.content),
            Err(err) => ToolResult::failure(&call.id, err.to_string()),
        }
    }

    /// Executes a batch of calls and returns one result per call, in
    /// call order.
    ///
    /// An unknown tool or a failing handler yields an error result for
    /// that call only; the rest of the batch still runs. With `parallel`
    /// set, suspending tools run concurrently.
    pub async fn dispatch(&self, calls: &[ToolCall], ctx: &Ctx, parallel: bool) -> Vec<ToolResult> {
        let options = DispatchOptions {
            parallel,
            max_concurrency: calls.len().max(1),
            tool_timeout: None,
        };
        let indexed = calls.iter().cloned().enumerate().collect();
        execute_batch(self, indexed, ctx, &options, &EventSink::none())
            .await
            .into_iter()
            .map(|(_, result)| result)
            .collect()
    }
}
