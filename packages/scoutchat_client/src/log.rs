//! Append-only message log in arrival order. No dedup, no reordering: the
//! log shows exactly what the relay delivered, in the order it delivered it.

use scoutchat_proto::ChatMessage;

#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
