//! Frame stream processing
//!
//! Splits provider response bytes into frames (SSE `data:` records or
//! newline-delimited JSON), hands each frame to a provider-specific parser and
//! forwards the resulting neutral events. Guarantees exactly one terminal
//! event per stream.

use bytes::BytesMut;
use serde_json::Value;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::{StreamEvent, ToolCall, Usage};

/// How a provider delimits frames on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Server-sent events, payload in `data:` lines
    Sse,
    /// One JSON object per line
    JsonLines,
}

/// Why the model stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    Other(String),
}

/// Events a parser can extract from one frame
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    TextDelta(String),
    ReasoningDelta(String),
    ToolCallComplete(ToolCall),
    Usage(Usage),
    Finish { reason: FinishReason },
    /// The vendor reported a failure inside the stream
    Error(String),
    Skip,
}

/// Provider-specific frame decoding
///
/// Parsers own whatever assembly state their vendor needs (partial tool
/// calls keyed by id or by index). An `Err` marks the frame as malformed; the
/// processor logs and skips it.
pub trait FrameParser: Send {
    fn parse_event(&mut self, json: &Value) -> anyhow::Result<Vec<ParsedEvent>>;

    /// Called once when the byte stream ends; flushes anything still buffered
    fn finish(&mut self) -> Vec<ParsedEvent> {
        Vec::new()
    }
}

/// Common helper to parse finish reasons
pub fn parse_finish_reason(reason_str: &str) -> FinishReason {
    match reason_str {
        "stop" | "end_turn" | "STOP" => FinishReason::Stop,
        "max_tokens" | "length" | "MAX_TOKENS" => FinishReason::Length,
        "tool_use" | "tool_calls" => FinishReason::ToolCalls,
        _ => FinishReason::Other(reason_str.to_string()),
    }
}

/// Frame processor that handles partial lines and terminal bookkeeping
pub struct SseStreamProcessor {
    framing: Framing,
    /// Bytes of an incomplete line carried over from the previous chunk
    pending: BytesMut,
    tx: mpsc::UnboundedSender<StreamEvent>,
    stream_start: Instant,
    event_count: usize,
    bytes_received: usize,
    skipped_frames: usize,
    terminated: bool,
}

impl SseStreamProcessor {
    pub fn new(framing: Framing, tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        debug!("Frame processor created ({:?})", framing);
        Self {
            framing,
            pending: BytesMut::with_capacity(256),
            tx,
            stream_start: Instant::now(),
            event_count: 0,
            bytes_received: 0,
            skipped_frames: 0,
            terminated: false,
        }
    }

    /// Whether a terminal event has been emitted
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of malformed frames skipped so far
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    /// Process a chunk of bytes from the response body
    pub fn process_chunk(&mut self, bytes: &[u8], parser: &mut dyn FrameParser) {
        self.bytes_received += bytes.len();
        self.pending.extend_from_slice(bytes);

        debug!(
            "Chunk received: {} bytes (total: {} bytes)",
            bytes.len(),
            self.bytes_received
        );

        // Split on raw bytes so multi-byte characters cut by the network stay intact
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line_bytes = self.pending.split_to(pos + 1);
            let line = String::from_utf8_lossy(&line_bytes);
            self.process_line(line.trim_end_matches(['\n', '\r']), parser);
        }
    }

    fn process_line(&mut self, line: &str, parser: &mut dyn FrameParser) {
        if line.trim().is_empty() {
            return;
        }
        match self.framing {
            Framing::JsonLines => self.process_frame(line, parser),
            Framing::Sse => {
                // Comments and event/id/retry fields carry nothing we need
                if line.starts_with(':') {
                    return;
                }
                if let Some(data) = line.strip_prefix("data:") {
                    self.process_frame(data.strip_prefix(' ').unwrap_or(data), parser);
                }
            }
        }
    }

    /// Process one frame payload using the provider-specific parser
    pub fn process_frame(&mut self, data: &str, parser: &mut dyn FrameParser) {
        if self.terminated {
            return;
        }
        self.event_count += 1;
        let elapsed = self.stream_start.elapsed();

        // Handle end-of-stream marker
        if data == "[DONE]" {
            info!(
                "Stream [DONE] marker received after {:?}, {} events, {} bytes",
                elapsed, self.event_count, self.bytes_received
            );
            self.dispatch(parser.finish());
            self.emit(StreamEvent::Done);
            return;
        }

        let json = match serde_json::from_str::<Value>(data) {
            Ok(json) => json,
            Err(e) => {
                self.skipped_frames += 1;
                warn!(
                    "Skipping malformed frame #{} ({}): {}",
                    self.event_count, e, data
                );
                return;
            }
        };

        match parser.parse_event(&json) {
            Ok(events) => {
                debug!(
                    "Frame #{} at {:?}: {} event(s)",
                    self.event_count,
                    elapsed,
                    events.len()
                );
                self.dispatch(events);
            }
            Err(e) => {
                self.skipped_frames += 1;
                warn!("Skipping undecodable frame #{}: {}", self.event_count, e);
            }
        }
    }

    fn dispatch(&mut self, events: Vec<ParsedEvent>) {
        for event in events {
            match event {
                ParsedEvent::TextDelta(text) => {
                    if !text.is_empty() {
                        self.emit(StreamEvent::Content { content: text });
                    }
                }
                ParsedEvent::ReasoningDelta(text) => {
                    if !text.is_empty() {
                        self.emit(StreamEvent::Reasoning { content: text });
                    }
                }
                ParsedEvent::ToolCallComplete(tool_call) => {
                    info!(
                        "ToolCallComplete: id={}, name={} at {:?}",
                        tool_call.id,
                        tool_call.name,
                        self.stream_start.elapsed()
                    );
                    self.emit(StreamEvent::ToolCall { tool_call });
                }
                ParsedEvent::Usage(usage) => {
                    info!(
                        "Usage: prompt={}, completion={}, total={}",
                        usage.prompt, usage.completion, usage.total
                    );
                    self.emit(StreamEvent::Usage { usage });
                }
                ParsedEvent::Finish { reason } => {
                    info!(
                        "Finish: reason={:?} at {:?} ({} events, {} bytes)",
                        reason,
                        self.stream_start.elapsed(),
                        self.event_count,
                        self.bytes_received
                    );
                    self.emit(StreamEvent::Done);
                }
                ParsedEvent::Error(message) => {
                    warn!("Provider reported stream error: {}", message);
                    self.emit(StreamEvent::Error { error: message });
                }
                ParsedEvent::Skip => {}
            }
        }
    }

    fn emit(&mut self, event: StreamEvent) {
        if self.terminated {
            debug!("Dropping event after terminal: {:?}", event);
            return;
        }
        if event.is_terminal() {
            self.terminated = true;
        }
        // Receiver gone means nobody is listening anymore
        let _ = self.tx.send(event);
    }

    /// End of the byte stream: flush buffered state and close with `Done`
    pub fn finish(&mut self, parser: &mut dyn FrameParser) {
        if !self.pending.is_empty() && !self.terminated {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.process_line(line.trim_end_matches('\r'), parser);
        }
        if !self.terminated {
            self.dispatch(parser.finish());
        }
        info!(
            "Frame processor finishing: {:?} elapsed, {} events, {} bytes, {} skipped",
            self.stream_start.elapsed(),
            self.event_count,
            self.bytes_received,
            self.skipped_frames
        );
        self.emit(StreamEvent::Done);
    }

    /// Transport failure: close with a single `Error`
    pub fn fail(&mut self, error: impl Into<String>) {
        self.emit(StreamEvent::Error {
            error: error.into(),
        });
    }

    /// Explicit cancellation: close with a single `Cancelled`
    pub fn cancel(&mut self) {
        info!(
            "Stream cancelled after {:?}, {} events",
            self.stream_start.elapsed(),
            self.event_count
        );
        self.emit(StreamEvent::Cancelled);
    }
}

/// Tool call accumulator for providers that stream arguments in parts
#[derive(Debug, Clone)]
pub struct ToolCallAccumulator {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallAccumulator {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            arguments: String::new(),
        }
    }

    pub fn add_arguments(&mut self, delta: &str) {
        self.arguments.push_str(delta);
    }

    /// Finish the call; an empty payload becomes `{}`
    pub fn complete(self) -> ToolCall {
        let arguments = if self.arguments.trim().is_empty() {
            "{}".to_string()
        } else {
            self.arguments
        };
        ToolCall {
            id: self.id,
            name: self.name,
            arguments,
        }
    }
}

/// Synthesize an id for vendors that do not assign one
pub fn synthesize_call_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}
