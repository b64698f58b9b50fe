// SPDX-License-Identifier: MIT
use std::ops::Deref;

use loom_message::Message;

use crate::event::TaskEvent;
use crate::subject::EventSubject;

/// View over the in-flight conversation handed to interceptors.
///
/// Appending through [`ConversationProxy::push`] automatically emits a
/// `message` event to the task's [`EventSubject`]; any other mutation
/// (splice, in-place edit) is the interceptor's own responsibility to
/// announce if it wants subscribers to observe it.
pub struct ConversationProxy<'a> {
    messages: &'a mut Vec<Message>,
    subject: &'a EventSubject,
}

impl<'a> ConversationProxy<'a> {
    pub fn new(messages: &'a mut Vec<Message>, subject: &'a EventSubject) -> Self {
        Self { messages, subject }
    }

    /// Append a message, emitting a `message` event for it.
    pub fn push(&mut self, message: Message) {
        self.subject.emit(TaskEvent::Message { message: message.clone() });
        self.messages.push(message);
    }

    pub fn as_slice(&self) -> &[Message] {
        self.messages.as_slice()
    }
}

impl<'a> Deref for ConversationProxy<'a> {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        self.messages.as_slice()
    }
}
