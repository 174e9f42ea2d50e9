//! The tool-calling orchestration loop.
//!
//! [`Orchestrator::process`] takes one inbound message and always returns reply
//! text. Per message it:
//!
//! 1. loads the identity's [`ConversationState`] and drops a pending workflow
//!    when the message starts a new topic
//! 2. finishes a deferred event directly when the user answers a request for
//!    email addresses
//! 3. calls the model with the tool catalog, executes the returned tool calls in
//!    order, and forces a create after a clean conflict check
//! 4. stops early when attendees are unresolved or the model asks a question
//! 5. otherwise feeds results back to the model for up to `max_tool_rounds`
//! 6. falls back to keyword heuristics only when the first model call used no tools
//! 7. persists the updated state

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_ai::{Content, Message, ModelProvider, ModelRequest, ModelResponse, ToolUse};
use serde_json::json;

use crate::attendees::{RosterMember, RosterProvider};
use crate::conversation::{
    ConversationState, EventDraft, PendingState, has_confirmation_marker, has_question_marker, is_new_topic,
};
use crate::datetime::DateTimeResolver;
use crate::error::{Error, Result};
use crate::heuristics::{self, ActionKind};
use crate::prompt::build_system_prompt;
use crate::registry::ToolRegistry;
use crate::reply;
use crate::retry::RetryPolicy;
use crate::store::ConversationStore;
use crate::tool::{ToolContext, ToolOutcome, ToolResult};
use crate::tools::{self, status};

/// Prefix for ids of tool calls the loop adds on its own
const SYNTHETIC_ID_PREFIX: &str = "huddle_synth_";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Model identifier
    pub model: String,
    /// Maximum tokens per model response
    pub max_tokens: u32,
    /// Rolling history entries kept per identity
    pub history_limit: usize,
    /// Tool-executing rounds allowed per message
    pub max_tool_rounds: usize,
    /// Backoff for transient model failures
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 1024,
            history_limit: 5,
            max_tool_rounds: 3,
            retry: RetryPolicy::default(),
        }
    }
}

/// Turns messages into calendar operations
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
    roster: Arc<dyn RosterProvider>,
    resolver: DateTimeResolver,
    config: OrchestratorConfig,
    locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn ConversationStore>,
        roster: Arc<dyn RosterProvider>,
        resolver: DateTimeResolver,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            store,
            roster,
            resolver,
            config,
            locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Handle one inbound message. Never fails; errors become a canned reply.
    pub async fn process(&self, message: &str, identity: &str, now: DateTime<Utc>) -> String {
        let lock = self.identity_lock(identity);
        let _guard = lock.lock().await;

        tracing::info!(identity = %identity, "processing message");

        let mut state = match self.store.get_or_create(identity, now).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "failed to load conversation");
                return reply::ERROR_REPLY.to_string();
            }
        };

        if state.pending.is_some() && is_new_topic(message) {
            if let Some(dropped) = state.clear_pending() {
                tracing::info!(identity = %identity, phase = ?dropped.phase(), "new topic, discarding pending state");
            }
        }
        state.record_message(message, now, self.config.history_limit);

        let ctx = ToolContext::new(identity, message, now);
        let reply = match self.handle(&mut state, &ctx).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(identity = %identity, error = %e, "message handling failed");
                canned_reply(&e).to_string()
            }
        };

        if let Err(e) = self.store.save(&state).await {
            tracing::error!(identity = %identity, error = %e, "failed to save conversation");
        }

        tracing::debug!(identity = %identity, phase = ?state.phase(), "message handled");
        reply
    }

    fn identity_lock(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(identity.to_string())
            .or_default()
            .clone()
    }

    async fn handle(&self, state: &mut ConversationState, ctx: &ToolContext) -> Result<String> {
        if let Some(PendingState::WaitingForEmails {
            draft,
            unresolved_names,
        }) = &state.pending
        {
            let emails = heuristics::extract_emails(&ctx.message);
            if !emails.is_empty() {
                let missing = still_missing(unresolved_names, &emails, &ctx.message);
                let mut draft = draft.clone();
                for email in emails {
                    if !draft.attendees.iter().any(|a| a.eq_ignore_ascii_case(&email)) {
                        draft.attendees.push(email);
                    }
                }

                if !missing.is_empty() {
                    tracing::info!(identity = %ctx.identity, missing = missing.len(), "still waiting for attendee addresses");
                    let question = reply::ask_for_emails(&missing);
                    state.set_pending(PendingState::WaitingForEmails {
                        draft,
                        unresolved_names: missing,
                    });
                    return Ok(question);
                }
                return self.create_deferred(state, draft, ctx).await;
            }
        }

        let roster = self.roster.roster_for(&ctx.identity).await?;
        self.run_model(state, &roster, ctx).await
    }

    /// Finish an event that was waiting for attendee addresses
    async fn create_deferred(&self, state: &mut ConversationState, draft: EventDraft, ctx: &ToolContext) -> Result<String> {
        let mut args = json!({
            "title": draft.title,
            "start_time": draft.start.instant.to_rfc3339(),
            "duration_minutes": draft.duration_minutes,
            "attendees": draft.attendees,
        });
        if let (Some(description), Some(obj)) = (&draft.description, args.as_object_mut()) {
            obj.insert("description".to_string(), json!(description));
        }

        tracing::info!(identity = %ctx.identity, title = %draft.title, "creating deferred event");
        let outcome = self.invoke(tools::CREATE_EVENT, args, ctx).await?;
        self.finish_deterministic(state, vec![outcome])
    }

    async fn run_model(&self, state: &mut ConversationState, roster: &[RosterMember], ctx: &ToolContext) -> Result<String> {
        let system_prompt = build_system_prompt(state, roster, ctx.now, self.resolver.local_offset());
        let catalog = self.registry.list();
        let mut messages = vec![Message::user(ctx.message.clone())];

        let mut response = self.complete(&system_prompt, &messages, &catalog).await?;

        if response.tool_uses.is_empty() {
            // cancellations are never classified, so the model's answer stands for them
            if let Some(kind) = heuristics::classify(&ctx.message) {
                tracing::info!(identity = %ctx.identity, action = ?kind, "model invoked no tools, using keyword fallback");
                return self.run_heuristic(kind, state, ctx).await;
            }
            let text = response.text();
            let reply = if text.is_empty() {
                reply::EMPTY_REPLY.to_string()
            } else {
                text
            };
            settle_pending(state, &reply, &[]);
            return Ok(reply);
        }

        let max_rounds = self.config.max_tool_rounds.max(1);
        let mut executed: Vec<ToolOutcome> = vec![];
        let mut synthesized = 0;
        let mut rounds = 0;

        loop {
            rounds += 1;
            let (assistant, results) = self.execute_round(&response, ctx, &mut synthesized).await?;
            let outcomes: Vec<ToolOutcome> = results.iter().map(|(_, o)| o.clone()).collect();

            if let Some(reply) = short_circuit(state, &outcomes) {
                return Ok(reply);
            }

            messages.push(assistant.to_message());
            messages.push(Message::User {
                content: results
                    .iter()
                    .map(|(id, o)| Content::tool_result(id, o.result.text_content(), o.result.is_error))
                    .collect(),
            });
            executed.extend(outcomes);

            response = match self.complete(&system_prompt, &messages, &catalog).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "follow-up model call failed, summarizing tool results");
                    let reply = reply::summarize(&executed);
                    settle_pending(state, &reply, &executed);
                    return Ok(reply);
                }
            };

            if response.tool_uses.is_empty() {
                break;
            }
            if rounds >= max_rounds {
                tracing::warn!(rounds, "tool round limit reached, ignoring further tool calls");
                break;
            }
        }

        let text = response.text();
        let reply = if text.is_empty() {
            reply::summarize(&executed)
        } else {
            text
        };
        settle_pending(state, &reply, &executed);
        Ok(reply)
    }

    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
        catalog: &[huddle_ai::Tool],
    ) -> Result<ModelResponse> {
        let request = ModelRequest {
            model: self.config.model.clone(),
            system_prompt: Some(system_prompt.to_string()),
            messages: messages.to_vec(),
            tools: catalog.to_vec(),
            max_tokens: self.config.max_tokens,
        };
        let request = &request;

        let response = self
            .config
            .retry
            .run("model call", || async move { self.provider.complete(request).await.map_err(Error::from) })
            .await?;

        tracing::debug!(
            tool_calls = response.tool_uses.len(),
            input_tokens = response.usage.input,
            output_tokens = response.usage.output,
            "model responded"
        );
        Ok(response)
    }

    /// Run one model turn's tool calls in order, then apply workflow enforcement.
    ///
    /// Returns the assistant turn (with any synthesized calls appended) and the
    /// outcomes keyed by tool-use id.
    async fn execute_round(
        &self,
        response: &ModelResponse,
        ctx: &ToolContext,
        synthesized: &mut usize,
    ) -> Result<(ModelResponse, Vec<(String, ToolOutcome)>)> {
        let mut assistant = response.clone();
        let mut results = Vec::with_capacity(response.tool_uses.len() + 1);

        for call in &response.tool_uses {
            let outcome = self.invoke(&call.name, call.input.clone(), ctx).await?;
            results.push((call.id.clone(), outcome));
        }

        if let Some(args) = enforced_create(&response.tool_uses, &results, &ctx.message) {
            *synthesized += 1;
            let id = format!("{}{}", SYNTHETIC_ID_PREFIX, synthesized);
            tracing::info!(identity = %ctx.identity, "conflict check cleared without a create call, creating event");
            let outcome = self.invoke(tools::CREATE_EVENT, args.clone(), ctx).await?;
            assistant.tool_uses.push(ToolUse {
                id: id.clone(),
                name: tools::CREATE_EVENT.to_string(),
                input: args,
            });
            results.push((id, outcome));
        }

        Ok((assistant, results))
    }

    /// Call a tool. A registry miss becomes an error result for the model;
    /// executor failures propagate.
    async fn invoke(&self, name: &str, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutcome> {
        let result = match self.registry.call(name, args.clone(), ctx).await {
            Ok(result) => result,
            Err(Error::ToolNotFound(missing)) => {
                tracing::warn!(tool = %missing, "model requested an unknown tool");
                ToolResult::error(format!("Tool not found: {}", missing))
            }
            Err(e) => return Err(e),
        };

        Ok(ToolOutcome {
            name: name.to_string(),
            arguments: args,
            result,
        })
    }

    /// Keyword safety net for action requests the model did not act on
    async fn run_heuristic(&self, kind: ActionKind, state: &mut ConversationState, ctx: &ToolContext) -> Result<String> {
        let message = ctx.message.as_str();

        match kind {
            ActionKind::Schedule => {
                let mut args = json!({
                    "title": heuristics::extract_title(message),
                    "start_time": message,
                    "attendees": message_attendees(message),
                });
                if let (Some(minutes), Some(obj)) = (heuristics::extract_duration_minutes(message), args.as_object_mut()) {
                    obj.insert("duration_minutes".to_string(), json!(minutes));
                }
                let outcome = self.invoke(tools::CREATE_EVENT, args, ctx).await?;
                self.finish_deterministic(state, vec![outcome])
            }
            ActionKind::List => {
                let outcome = self.invoke(tools::LIST_EVENTS, json!({}), ctx).await?;
                self.finish_deterministic(state, vec![outcome])
            }
            ActionKind::Update => {
                let Some(query) = heuristics::extract_search_query(message) else {
                    return Ok(ask(state, "Which event do you mean?".to_string()));
                };

                let found = self
                    .invoke(tools::SEARCH_EVENTS, json!({ "query": query }), ctx)
                    .await?;
                let events = found.result.output["events"].as_array().cloned().unwrap_or_default();

                match events.as_slice() {
                    [] => {
                        state.clear_pending();
                        Ok(reply::no_match(&query))
                    }
                    [event] => {
                        let id = event["id"].as_str().unwrap_or_default();
                        let title = event["title"].as_str().unwrap_or("the event");
                        let Some(target) = heuristics::extract_update_target(message) else {
                            return Ok(ask(state, format!("What time should I move {} to?", title)));
                        };
                        let outcome = self
                            .invoke(tools::UPDATE_EVENT, json!({ "event_id": id, "start_time": target }), ctx)
                            .await?;
                        self.finish_deterministic(state, vec![outcome])
                    }
                    _ => Ok(ask(state, reply::several_matches(&query, &found))),
                }
            }
        }
    }

    /// Reply from tool outcomes without another model call
    fn finish_deterministic(&self, state: &mut ConversationState, outcomes: Vec<ToolOutcome>) -> Result<String> {
        if let Some(reply) = short_circuit(state, &outcomes) {
            return Ok(reply);
        }
        if outcomes.iter().all(|o| !o.result.is_error) {
            state.clear_pending();
        }
        Ok(reply::summarize(&outcomes))
    }
}

fn canned_reply(error: &Error) -> &'static str {
    if error.is_transient() {
        reply::UNAVAILABLE_REPLY
    } else {
        reply::ERROR_REPLY
    }
}

fn ask(state: &mut ConversationState, question: String) -> String {
    state.set_pending(PendingState::AwaitingClarification {
        asked_text: question.clone(),
    });
    question
}

/// Arguments for a create call the model should have made.
///
/// Fires when a conflict check in this turn came back ready to create and the
/// turn contains no create call of its own.
fn enforced_create(
    calls: &[ToolUse],
    results: &[(String, ToolOutcome)],
    message: &str,
) -> Option<serde_json::Value> {
    if calls.iter().any(|c| c.name == tools::CREATE_EVENT) {
        return None;
    }

    let (_, check) = results.iter().find(|(_, o)| {
        o.name == tools::CHECK_CONFLICTS && !o.result.is_error && o.result.output["ready_to_create"] == true
    })?;
    let output = &check.result.output;

    let mut title = heuristics::extract_title(message);
    if title == heuristics::DEFAULT_TITLE {
        if let Some(checked) = output["title"].as_str() {
            title = checked.to_string();
        }
    }

    Some(json!({
        "title": title,
        "start_time": output["start_time"].clone(),
        "duration_minutes": output["duration_minutes"].clone(),
        "attendees": message_attendees(message),
    }))
}

/// Names a follow-up message leaves without an address.
///
/// Names mentioned in the message take the supplied addresses first; bare
/// addresses fill the remaining names in the order they were asked for.
fn still_missing(waiting: &[String], emails: &[String], message: &str) -> Vec<String> {
    let lower = message.to_lowercase();
    let named = |n: &&String| lower.contains(&n.to_lowercase());

    let mut order: Vec<&String> = waiting.iter().filter(named).collect();
    order.extend(waiting.iter().filter(|n| !named(n)));
    let covered = &order[..emails.len().min(order.len())];

    waiting.iter().filter(|n| !covered.contains(n)).cloned().collect()
}

/// Named attendees plus any addresses typed directly into the message
fn message_attendees(message: &str) -> Vec<String> {
    let mut attendees = heuristics::extract_attendees(message);
    attendees.extend(heuristics::extract_emails(message));
    attendees
}

/// Stop the turn when a tool needs something only the user can give
fn short_circuit(state: &mut ConversationState, outcomes: &[ToolOutcome]) -> Option<String> {
    if let Some(outcome) = outcomes
        .iter()
        .find(|o| o.status() == Some(status::ATTENDEES_UNRESOLVED))
    {
        let output = &outcome.result.output;
        let names: Vec<String> = serde_json::from_value(output["unresolved_names"].clone()).unwrap_or_default();
        match serde_json::from_value::<EventDraft>(output["draft"].clone()) {
            Ok(draft) => {
                state.set_pending(PendingState::WaitingForEmails {
                    draft,
                    unresolved_names: names.clone(),
                });
                return Some(reply::ask_for_emails(&names));
            }
            Err(e) => tracing::warn!(error = %e, "could not read event draft from tool output"),
        }
    }

    let question = outcomes
        .iter()
        .find(|o| o.status() == Some(status::CLARIFICATION_REQUESTED))
        .and_then(|o| o.result.output["question"].as_str())?;
    Some(ask(state, question.to_string()))
}

/// Pending-state transitions driven by the final reply
fn settle_pending(state: &mut ConversationState, reply: &str, executed: &[ToolOutcome]) {
    if !executed.is_empty() && has_confirmation_marker(reply) {
        state.set_pending(PendingState::AwaitingToolConfirmation {
            tool_results: executed.to_vec(),
        });
    } else if executed.is_empty() && has_question_marker(reply) {
        state.set_pending(PendingState::AwaitingClarification {
            asked_text: reply.to_string(),
        });
    } else if !executed.is_empty() {
        state.clear_pending();
    }
}
