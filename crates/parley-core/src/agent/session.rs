//! Conversation session
//!
//! Owns the ordered message list. Messages change only through `append`,
//! `update_by_id` and `delete_by_id`, and at most one message is in flight.

use serde::{Deserialize, Serialize};

use crate::ai::providers::ProviderId;
use crate::ai::types::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    messages: Vec<Message>,
    pub provider: ProviderId,
    pub model: String,
    /// Id of the assistant message currently being streamed into
    #[serde(skip)]
    in_flight: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            provider,
            model: model.into(),
            in_flight: None,
        }
    }

    /// Builder: seed with previously persisted messages
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Apply `f` to the message with `id`; returns whether it was found
    pub fn update_by_id(&mut self, id: &str, f: impl FnOnce(&mut Message)) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                f(message);
                true
            }
            None => false,
        }
    }

    pub fn delete_by_id(&mut self, id: &str) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        if self.in_flight.as_deref() == Some(id) {
            self.in_flight = None;
        }
        Some(self.messages.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Append `message` and mark it in flight, returning its id
    ///
    /// Any previous in-flight message is finished first.
    pub fn begin_in_flight(&mut self, message: Message) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        self.in_flight = Some(id.clone());
        id
    }

    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    /// Finish the in-flight message, returning its id
    pub fn finish_in_flight(&mut self) -> Option<String> {
        self.in_flight.take()
    }

    /// Append text to the in-flight message; no-op when nothing is in flight
    pub fn append_content(&mut self, delta: &str) {
        if let Some(id) = self.in_flight.clone() {
            self.update_by_id(&id, |m| m.content.push_str(delta));
        }
    }

    pub fn append_reasoning(&mut self, delta: &str) {
        if let Some(id) = self.in_flight.clone() {
            self.update_by_id(&id, |m| {
                m.reasoning.get_or_insert_with(String::new).push_str(delta)
            });
        }
    }
}
