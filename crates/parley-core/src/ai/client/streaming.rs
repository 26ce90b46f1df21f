//! Streaming API calls
//!
//! Opens the vendor connection in a background task and decodes frames into
//! neutral events until the stream ends, fails, or is cancelled.

use futures::StreamExt;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::core::{describe_error_body, AiClient};
use crate::ai::format::get_format_handler;
use crate::ai::sse::{FrameParser, Framing, SseStreamProcessor};
use crate::ai::stream::{CompletionProvider, CompletionRequest, EventStream};
use crate::ai::types::StreamEvent;

impl CompletionProvider for AiClient {
    fn stream(&self, request: CompletionRequest, cancel: CancellationToken) -> EventStream {
        info!("=== API CALL START ===");
        info!(
            "Provider: {}, Model: {}, Messages: {}, Tools: {}",
            self.provider_id(),
            request.model,
            request.messages.len(),
            request.tools.len()
        );

        let handler = get_format_handler(self.config().provider.api_format);
        let url = self.config().api_url(&handler.endpoint_path(&request.model));
        let body = handler.build_streaming_body(&request);
        let http_request = self.build_request(&url).json(&body);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_stream(
            http_request,
            handler.framing(),
            handler.parser(),
            tx,
            cancel.clone(),
        ));
        EventStream::new(rx, cancel)
    }
}

/// Drive one response to exactly one terminal event
async fn run_stream(
    request: reqwest::RequestBuilder,
    framing: Framing,
    mut parser: Box<dyn FrameParser>,
    tx: mpsc::UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
) {
    let call_start = Instant::now();
    let mut processor = SseStreamProcessor::new(framing, tx);

    info!("Sending API request...");
    let response = tokio::select! {
        _ = cancel.cancelled() => {
            processor.cancel();
            return;
        }
        result = request.send() => result,
    };

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            error!("API request failed: {}", e);
            processor.fail(format!("Connection failed: {}", e));
            return;
        }
    };

    let status = response.status();
    info!("API response: {} in {:?}", status, call_start.elapsed());

    if !status.is_success() {
        let error_text = tokio::select! {
            _ = cancel.cancelled() => {
                processor.cancel();
                return;
            }
            text = response.text() => text.unwrap_or_else(|_| "Unknown error".to_string()),
        };
        error!("API error response: {} - {}", status, error_text);
        processor.fail(describe_error_body(status, &error_text));
        return;
    }

    let stream = response.bytes_stream();
    tokio::pin!(stream);
    let mut chunk_count = 0usize;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // Dropping the body stream closes the connection
                processor.cancel();
                return;
            }
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    chunk_count += 1;
                    processor.process_chunk(&bytes, parser.as_mut());
                    if processor.is_terminated() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    error!("Stream read error at chunk #{}: {}", chunk_count, e);
                    processor.fail(format!("Stream interrupted: {}", e));
                    return;
                }
                None => break,
            }
        }
    }

    info!(
        "Stream ended after {} chunks in {:?}",
        chunk_count,
        call_start.elapsed()
    );
    processor.finish(parser.as_mut());
}
