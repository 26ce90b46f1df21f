//! Terminal front end for the chat engine
//!
//! Assistant text goes to stdout; tool activity, prompts and errors go to
//! stderr so the answer can be piped.

use anyhow::{bail, Result};
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use parley_core::agent::{EngineEvent, EngineHandle, ToolCallStatus};
use parley_core::StreamEvent;

type Input = Lines<BufReader<Stdin>>;

fn stdin_lines() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Outcome of waiting for one line of input
#[derive(Debug, PartialEq)]
enum Reply {
    Line(String),
    Eof,
    Interrupted,
}

/// Next line from `input`, unless `interrupt` fires first
///
/// Once the engine listens for Ctrl-C the default SIGINT exit is gone, so
/// every prompt has to watch for it itself.
async fn read_reply<R, F>(input: &mut Lines<R>, interrupt: F) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        biased;
        _ = interrupt => Ok(Reply::Interrupted),
        line = input.next_line() => Ok(match line? {
            Some(line) => Reply::Line(line),
            None => Reply::Eof,
        }),
    }
}

async fn read_stdin_reply(input: &mut Input) -> Result<Reply> {
    read_reply(input, tokio::signal::ctrl_c()).await
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Send one prompt and print the exchange, tool rounds included
pub async fn run_once(handle: &mut EngineHandle, prompt: &str) -> Result<()> {
    let mut input = stdin_lines();
    exchange(handle, &mut input, prompt).await
}

/// Read prompts line by line until EOF or `/exit`
pub async fn run_interactive(handle: &mut EngineHandle) -> Result<()> {
    let mut input = stdin_lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();
        let line = match read_stdin_reply(&mut input).await? {
            Reply::Line(line) => line,
            Reply::Eof | Reply::Interrupted => {
                eprintln!();
                return Ok(());
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/exit" || line == "/quit" {
            return Ok(());
        }
        exchange(handle, &mut input, line).await?;
    }
}

async fn exchange(handle: &mut EngineHandle, input: &mut Input, prompt: &str) -> Result<()> {
    handle.submit(prompt)?;
    let mut stdout = std::io::stdout();

    loop {
        let event = tokio::select! {
            event = handle.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                handle.cancel()?;
                continue;
            }
        };
        let Some(event) = event else {
            bail!("Chat engine stopped unexpectedly");
        };

        match event {
            EngineEvent::Stream { event } => match event {
                StreamEvent::Content { content } => {
                    print!("{}", content);
                    stdout.flush().ok();
                }
                StreamEvent::Error { error } => eprintln!("\nerror: {}", error),
                StreamEvent::Cancelled => eprintln!("\n[cancelled]"),
                StreamEvent::Reasoning { content } => {
                    tracing::debug!("Reasoning: {}", content);
                }
                StreamEvent::ToolCall { .. } | StreamEvent::Usage { .. } | StreamEvent::Done => {}
            },
            EngineEvent::ToolStatus {
                name,
                status: ToolCallStatus::Executing,
                ..
            } => eprintln!("\n[running {}]", name),
            EngineEvent::ToolStatus {
                name,
                status: ToolCallStatus::Errored,
                ..
            } => eprintln!("[{} failed]", name),
            EngineEvent::ToolStatus { .. } => {}
            EngineEvent::PermissionRequested { tool_call } => {
                eprint!("\nAllow {} {}? [y/N] ", tool_call.name, tool_call.arguments);
                std::io::stderr().flush().ok();
                match read_stdin_reply(input).await? {
                    Reply::Line(answer) if is_yes(&answer) => handle.allow(tool_call.id)?,
                    Reply::Interrupted => {
                        eprintln!();
                        handle.deny(tool_call.id)?;
                        handle.cancel()?;
                    }
                    Reply::Line(_) | Reply::Eof => handle.deny(tool_call.id)?,
                }
            }
            EngineEvent::ToolResult { message } => {
                tracing::debug!(
                    "Tool result for {:?}: {} chars",
                    message.tool_call_id,
                    message.content.len()
                );
            }
            EngineEvent::ContextUsage { usage } => {
                tracing::debug!(
                    "Context usage {}/{} ({}%)",
                    usage.used,
                    usage.total,
                    usage.percent()
                );
            }
            EngineEvent::Halted { usage } => {
                eprintln!(
                    "Context budget exhausted ({} of {} tokens); raise [context] budget or start a new session",
                    usage.used, usage.total
                );
            }
            EngineEvent::Busy => eprintln!("[still working on the previous prompt]"),
            EngineEvent::TurnComplete => {
                println!();
                return Ok(());
            }
        }
    }
}
