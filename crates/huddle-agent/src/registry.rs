//! Tool registry: name → {schema, executor}
//!
//! The registry is an explicit object built once at startup and shared by
//! reference. Lookups take a read lock, so concurrent `call`s from different
//! identities never block each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::tool::{BoxedTool, FnTool, ToolContext, ToolFn, ToolResult, to_api_tool};

/// One observed registry call
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub name: String,
    pub duration: Duration,
    pub success: bool,
}

/// Receives a [`CallRecord`] for every `call`, hit or miss
pub trait CallObserver: Send + Sync {
    fn observe(&self, record: &CallRecord);
}

/// Default observer: one structured log line per call
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn observe(&self, record: &CallRecord) {
        tracing::info!(
            tool = %record.name,
            elapsed_ms = record.duration.as_millis() as u64,
            status = if record.success { "ok" } else { "error" },
            "tool call"
        );
    }
}

struct Entry {
    tool: BoxedTool,
    validator: Option<Arc<jsonschema::Validator>>,
}

/// Process-wide tool catalog
pub struct ToolRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    observer: Arc<dyn CallObserver>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_observer(Arc::new(TracingObserver))
    }

    pub fn with_observer(observer: Arc<dyn CallObserver>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            observer,
        }
    }

    /// Register a tool. A second registration under the same name replaces the first.
    pub fn register(&self, tool: BoxedTool) {
        let name = tool.name().to_string();
        let schema = tool.parameters_schema();
        let validator = match jsonschema::validator_for(&schema) {
            Ok(v) => Some(Arc::new(v)),
            Err(e) => {
                tracing::warn!(
                    "Invalid tool parameter schema for '{}', skipping validation: {}",
                    name,
                    e
                );
                None
            }
        };

        let replaced = self
            .entries
            .write()
            .insert(name.clone(), Entry { tool, validator })
            .is_some();
        if replaced {
            tracing::debug!(tool = %name, "replaced existing tool registration");
        }
    }

    /// Register a closure-backed tool
    pub fn register_fn(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        executor: ToolFn,
    ) {
        self.register(Arc::new(FnTool::new(name, description, schema, executor)));
    }

    /// Model-consumable catalog; order is not significant
    pub fn list(&self) -> Vec<huddle_ai::Tool> {
        self.entries
            .read()
            .values()
            .map(|e| to_api_tool(e.tool.as_ref()))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Invoke a tool by name.
    ///
    /// Arguments that fail schema validation come back as an error result
    /// without reaching the executor.
    pub async fn call(&self, name: &str, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult> {
        let started = Instant::now();
        let found = {
            let entries = self.entries.read();
            entries
                .get(name)
                .map(|e| (e.tool.clone(), e.validator.clone()))
        };

        let outcome = match found {
            None => Err(Error::ToolNotFound(name.to_string())),
            Some((tool, validator)) => {
                match validator.and_then(|v| validate_with_validator(&args, &v)) {
                    Some(err) => Ok(ToolResult::error(err)),
                    None => tool.execute(args, ctx).await,
                }
            }
        };

        let success = matches!(&outcome, Ok(r) if !r.is_error);
        self.observer.observe(&CallRecord {
            name: name.to_string(),
            duration: started.elapsed(),
            success,
        });
        outcome
    }
}

/// Returns `Some(error_message)` if validation fails, `None` if valid.
fn validate_with_validator(args: &serde_json::Value, validator: &jsonschema::Validator) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(args)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!("Tool argument validation failed:\n{}", errors.join("\n")))
    }
}
