//! Chat engine
//!
//! One task owns the Session and everything that mutates it. It multiplexes
//! three inputs: consumer commands, the active provider stream and tool
//! completions. Tool executions run on their own tasks and report back over a
//! channel, so a slow tool never blocks the stream and vice versa.

use anyhow::{anyhow, Context as _, Result};
use futures::StreamExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::budget::ContextBudget;
use super::continuation::{reassemble, with_default_system, ContinuationEngine};
use super::coordinator::{Announcement, RoundSettled, Settlement, ToolCallStatus, ToolCoordinator};
use super::events::{EngineCommand, EngineEvent};
use super::hooks::{HookRegistry, PreMessage, StreamChunk};
use super::session::Session;
use crate::ai::providers::ProviderId;
use crate::ai::stream::{CompletionProvider, CompletionRequest, EventStream};
use crate::ai::types::{AiTool, Message, StreamEvent, ToolCall};
use crate::config::Config;
use crate::storage::SessionStore;
use crate::tools::{PermissionPolicy, ToolHost};

/// Per-session engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub max_tokens: usize,
    /// Directory tools resolve relative paths against
    pub working_dir: PathBuf,
    pub budget: ContextBudget,
    /// Default system message used when the history has none
    pub system_prompt: String,
    /// Replaces every system message of outbound requests
    pub system_override: Option<String>,
}

impl EngineConfig {
    pub fn from_config(config: &Config, system_prompt: impl Into<String>) -> Self {
        Self {
            model: config.model(),
            max_tokens: config.max_tokens,
            working_dir: config.working_directory(),
            budget: ContextBudget::new(config.context.policy, config.context_budget()),
            system_prompt: system_prompt.into(),
            system_override: None,
        }
    }
}

/// Explicitly constructed collaborators, shared with spawned tool tasks
#[derive(Clone)]
pub struct EngineServices {
    pub provider: Arc<dyn CompletionProvider>,
    pub tools: Arc<dyn ToolHost>,
    pub policy: Arc<dyn PermissionPolicy>,
    pub store: Arc<dyn SessionStore>,
    pub hooks: Arc<HookRegistry>,
}

/// A finished tool execution reported back to the engine task
#[derive(Debug)]
struct ToolCompletion {
    round: u64,
    tool_call_id: String,
    outcome: std::result::Result<String, String>,
}

pub struct ChatEngine {
    config: EngineConfig,
    services: EngineServices,
    session: Session,
    coordinator: ToolCoordinator,
    continuation: ContinuationEngine,
    /// Provider stream of the current turn
    stream: Option<EventStream>,
    /// Assistant message the current stream writes into
    assistant_id: Option<String>,
    tool_definitions: Vec<AiTool>,
    turn_active: bool,
    /// Hook-rewritten history plus the user message that opened the turn
    turn_prefix: Vec<Message>,
    /// Session length once the turn's user message was appended
    turn_start: usize,
    events: mpsc::UnboundedSender<EngineEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<EngineEvent>>,
    completions_tx: mpsc::UnboundedSender<ToolCompletion>,
    completions_rx: mpsc::UnboundedReceiver<ToolCompletion>,
}

impl ChatEngine {
    /// Build an engine for `session_id`, restoring any persisted messages
    pub fn new(
        config: EngineConfig,
        services: EngineServices,
        session_id: impl Into<String>,
        provider: ProviderId,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let messages = services
            .store
            .load(&session_id)
            .with_context(|| format!("Failed to load session {}", session_id))?;
        if !messages.is_empty() {
            info!("Restored session {} with {} message(s)", session_id, messages.len());
        }
        let session =
            Session::new(session_id, provider, config.model.clone()).with_messages(messages);

        let (events, events_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            services,
            session,
            coordinator: ToolCoordinator::new(),
            continuation: ContinuationEngine::new(),
            stream: None,
            assistant_id: None,
            tool_definitions: Vec::new(),
            turn_active: false,
            turn_prefix: Vec::new(),
            turn_start: 0,
            events,
            events_rx: Some(events_rx),
            completions_tx,
            completions_rx,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the engine on its own task
    pub fn spawn(mut self) -> EngineHandle {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (_, empty) = mpsc::unbounded_channel();
        let events = self.events_rx.take().unwrap_or(empty);
        let task = tokio::spawn(self.run(commands_rx));
        EngineHandle {
            commands,
            events,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<EngineCommand>) -> Session {
        info!("Chat engine started for session {}", self.session.id);
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                event = next_stream_event(&mut self.stream) => self.handle_stream_event(event),
                Some(completion) = self.completions_rx.recv() => self.handle_completion(completion),
            }
        }

        if let Some(stream) = self.stream.take() {
            stream.cancel();
            self.session.finish_in_flight();
        }
        self.persist();
        info!("Chat engine stopped for session {}", self.session.id);
        self.session
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Submit { content } => self.submit(content).await,
            EngineCommand::Allow { tool_call_id } => {
                if let Some(call) = self.coordinator.allow(&tool_call_id) {
                    self.emit_status(&call, ToolCallStatus::Executing);
                    self.execute(call);
                }
            }
            EngineCommand::Deny { tool_call_id } => {
                if let Some(settlement) = self.coordinator.deny(&tool_call_id) {
                    self.apply_settlement(settlement);
                }
            }
            EngineCommand::Cancel => self.cancel(),
            EngineCommand::Shutdown => {}
        }
    }

    async fn submit(&mut self, content: String) {
        if self.turn_active {
            debug!("Submit while a turn is running");
            self.emit(EngineEvent::Busy);
            return;
        }

        self.turn_active = true;
        self.coordinator.begin_turn();

        let pre = PreMessage {
            content,
            history: self.session.messages().to_vec(),
        };
        let pre = match self.services.hooks.process_pre_message(pre) {
            Ok(pre) => pre,
            Err(e) => {
                error!("Pre-message hook failed: {:#}", e);
                self.emit(EngineEvent::Stream {
                    event: StreamEvent::Error {
                        error: format!("Pre-message hook error: {:#}", e),
                    },
                });
                self.end_turn();
                return;
            }
        };

        let user = Message::user(pre.content);
        self.turn_prefix = pre.history;
        self.turn_prefix.push(user.clone());
        self.session.append(user);
        self.turn_start = self.session.messages().len();

        let policy = self.services.policy.clone();
        self.tool_definitions = self
            .services
            .tools
            .definitions()
            .await
            .into_iter()
            .filter(|tool| policy.is_enabled(&tool.name))
            .collect();

        let outbound = with_default_system(self.turn_messages(), &self.config.system_prompt);
        self.open_stream(outbound);
    }

    /// History for this turn's requests: the hook view of everything before
    /// the user message, then whatever the turn has added since
    fn turn_messages(&self) -> Vec<Message> {
        let added = self
            .session
            .messages()
            .get(self.turn_start..)
            .unwrap_or(&[]);
        let mut messages = self.turn_prefix.clone();
        messages.extend_from_slice(added);
        messages
    }

    /// Budget-check `messages` and start a provider stream for them
    fn open_stream(&mut self, messages: Vec<Message>) {
        let outcome = self
            .config
            .budget
            .apply(&messages, self.config.system_override.as_deref());
        self.emit(EngineEvent::ContextUsage {
            usage: outcome.usage,
        });

        if outcome.halted {
            self.emit(EngineEvent::Halted {
                usage: outcome.usage,
            });
            self.end_turn();
            return;
        }

        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: outcome.messages,
            tools: self.tool_definitions.clone(),
            max_tokens: self.config.max_tokens,
        };
        info!(
            "Opening stream: model={}, {} message(s), {} tool(s), {} evicted",
            request.model,
            request.messages.len(),
            request.tools.len(),
            outcome.evicted
        );

        self.assistant_id = Some(self.session.begin_in_flight(Message::assistant("")));
        self.stream = Some(
            self.services
                .provider
                .stream(request, CancellationToken::new()),
        );
    }

    fn handle_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Content { content } => self.stream_chunk(content, false),
            StreamEvent::Reasoning { content } => self.stream_chunk(content, true),
            StreamEvent::Usage { .. } => self.emit(EngineEvent::Stream { event }),
            StreamEvent::ToolCall { tool_call } => self.announce(tool_call),
            StreamEvent::Done => {
                self.close_stream();
                self.emit(EngineEvent::Stream { event });
                match self.coordinator.mark_stream_finished() {
                    Some(round) => self.continue_round(round),
                    None => self.maybe_end_turn(),
                }
            }
            StreamEvent::Cancelled | StreamEvent::Error { .. } => {
                if let StreamEvent::Error { error } = &event {
                    error!("Stream failed: {}", error);
                }
                self.close_stream();
                self.coordinator.abandon();
                self.emit(EngineEvent::Stream { event });
                self.maybe_end_turn();
            }
        }
    }

    /// Pass a content or reasoning delta through the stream hooks, then
    /// append and forward it
    fn stream_chunk(&mut self, content: String, is_reasoning: bool) {
        let content = if self.services.hooks.is_empty() {
            content
        } else {
            let full_text = self
                .session
                .in_flight()
                .and_then(|id| self.session.get(id))
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let chunk = StreamChunk {
                content,
                is_reasoning,
                full_text,
            };
            match self.services.hooks.process_stream_chunk(chunk) {
                Ok(chunk) => chunk.content,
                Err(e) => {
                    if let Some(stream) = self.stream.as_ref() {
                        stream.cancel();
                    }
                    self.handle_stream_event(StreamEvent::Error {
                        error: format!("Stream hook error: {:#}", e),
                    });
                    return;
                }
            }
        };

        if is_reasoning {
            self.session.append_reasoning(&content);
            self.emit(EngineEvent::Stream {
                event: StreamEvent::Reasoning { content },
            });
        } else {
            self.session.append_content(&content);
            self.emit(EngineEvent::Stream {
                event: StreamEvent::Content { content },
            });
        }
    }

    /// Drop the stream and freeze the in-flight message
    ///
    /// An assistant message that received nothing is removed.
    fn close_stream(&mut self) {
        self.stream = None;
        if let Some(id) = self.session.finish_in_flight() {
            let empty = self.session.get(&id).is_some_and(|m| {
                m.content.is_empty() && m.reasoning.is_none() && m.calls().is_empty()
            });
            if empty {
                debug!("Removing empty assistant message {}", id);
                self.session.delete_by_id(&id);
            }
        }
    }

    fn announce(&mut self, call: ToolCall) {
        let announcement =
            self.coordinator
                .announce(call.clone(), self.session.messages(), self.services.policy.as_ref());
        if announcement == Announcement::Duplicate {
            return;
        }

        if let Some(id) = self.session.in_flight().map(str::to_string) {
            self.session.update_by_id(&id, |m| {
                m.tool_calls.get_or_insert_with(Vec::new).push(call.clone())
            });
        }
        self.emit(EngineEvent::Stream {
            event: StreamEvent::ToolCall { tool_call: call },
        });

        match announcement {
            Announcement::Execute(call) => {
                self.emit_status(&call, ToolCallStatus::Executing);
                self.execute(call);
            }
            Announcement::AwaitPermission(call) => {
                self.emit_status(&call, ToolCallStatus::PermissionPending);
                self.emit(EngineEvent::PermissionRequested { tool_call: call });
            }
            Announcement::Settled(settlement) => self.apply_settlement(settlement),
            Announcement::Duplicate => {}
        }
    }

    /// Run `call` on its own task; the result comes back as a `ToolCompletion`
    fn execute(&mut self, call: ToolCall) {
        let args = match parse_arguments(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!("Tool call {} has unparseable arguments: {}", call.id, e);
                let outcome = Err(format!("Invalid arguments for '{}': {}", call.name, e));
                if let Some(settlement) = self.coordinator.settle(&call.id, outcome) {
                    self.apply_settlement(settlement);
                }
                return;
            }
        };

        let round = self.coordinator.round();
        let tools = self.services.tools.clone();
        let working_dir = self.config.working_dir.clone();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let name = call.name.clone();
            let task = tokio::spawn(async move { tools.execute(&name, args, &working_dir).await });
            let outcome = match task.await {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(e) if e.is_panic() => {
                    error!("Tool {} panicked", call.name);
                    Err(format!("Tool '{}' panicked", call.name))
                }
                Err(e) => Err(format!("Tool '{}' did not finish: {}", call.name, e)),
            };
            let _ = completions.send(ToolCompletion {
                round,
                tool_call_id: call.id,
                outcome,
            });
        });
    }

    fn handle_completion(&mut self, completion: ToolCompletion) {
        if completion.round != self.coordinator.round() {
            warn!(
                "Dropping result for {} from stale round {}",
                completion.tool_call_id, completion.round
            );
            return;
        }
        if let Some(settlement) = self
            .coordinator
            .settle(&completion.tool_call_id, completion.outcome)
        {
            self.apply_settlement(settlement);
        }
    }

    fn apply_settlement(&mut self, settlement: Settlement) {
        self.session.append(settlement.message.clone());
        self.emit_status(&settlement.tool_call, settlement.status);
        self.emit(EngineEvent::ToolResult {
            message: settlement.message,
        });

        match settlement.round {
            Some(round) => self.continue_round(round),
            None => self.maybe_end_turn(),
        }
    }

    /// The coordinator hands out each round's `RoundSettled` once; the
    /// continuation flag only rejects re-entry while the next stream opens
    fn continue_round(&mut self, round: RoundSettled) {
        if !self.continuation.try_begin() {
            return;
        }
        let outbound = reassemble(
            &self.turn_messages(),
            self.assistant_id.as_deref(),
            &round,
            &self.config.system_prompt,
        );
        self.coordinator.begin_turn();
        self.open_stream(outbound);
        self.continuation.finish();
    }

    fn cancel(&mut self) {
        if let Some(stream) = self.stream.as_ref() {
            info!("Cancelling active stream");
            stream.cancel();
            self.handle_stream_event(StreamEvent::Cancelled);
        } else if self.coordinator.has_outstanding() {
            self.coordinator.abandon();
        } else {
            debug!("Cancel with nothing to cancel");
        }
    }

    /// End the turn once nothing can still produce output for it
    fn maybe_end_turn(&mut self) {
        if self.stream.is_some() || self.coordinator.has_outstanding() {
            return;
        }
        self.end_turn();
    }

    fn end_turn(&mut self) {
        if !self.turn_active {
            return;
        }
        self.turn_active = false;
        self.persist();
        self.emit(EngineEvent::TurnComplete);
    }

    fn persist(&self) {
        if let Err(e) = self
            .services
            .store
            .save(&self.session.id, self.session.messages())
        {
            error!("Failed to save session {}: {:#}", self.session.id, e);
        }
    }

    fn emit_status(&self, call: &ToolCall, status: ToolCallStatus) {
        self.emit(EngineEvent::ToolStatus {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            status,
        });
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}

/// Next event of the active stream; pends forever when there is none
async fn next_stream_event(stream: &mut Option<EventStream>) -> StreamEvent {
    match stream {
        Some(stream) => match stream.next().await {
            Some(event) => event,
            None => {
                warn!("Provider stream ended without a terminal event");
                StreamEvent::Done
            }
        },
        None => std::future::pending().await,
    }
}

/// Decode an assembled argument payload into a JSON object
fn parse_arguments(arguments: &str) -> std::result::Result<Value, String> {
    let trimmed = arguments.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
    match value {
        Value::String(inner) => serde_json::from_str(&inner).map_err(|e| e.to_string()),
        other => Ok(other),
    }
}

/// Consumer side of a running `ChatEngine`
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    task: JoinHandle<Session>,
}

impl EngineHandle {
    pub fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("Chat engine has stopped"))
    }

    pub fn submit(&self, content: impl Into<String>) -> Result<()> {
        self.send(EngineCommand::Submit {
            content: content.into(),
        })
    }

    pub fn allow(&self, tool_call_id: impl Into<String>) -> Result<()> {
        self.send(EngineCommand::Allow {
            tool_call_id: tool_call_id.into(),
        })
    }

    pub fn deny(&self, tool_call_id: impl Into<String>) -> Result<()> {
        self.send(EngineCommand::Deny {
            tool_call_id: tool_call_id.into(),
        })
    }

    pub fn cancel(&self) -> Result<()> {
        self.send(EngineCommand::Cancel)
    }

    pub async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }

    /// Stop the engine and return the final session
    pub async fn shutdown(self) -> Result<Session> {
        let _ = self.commands.send(EngineCommand::Shutdown);
        self.task.await.context("Chat engine task failed")
    }
}
