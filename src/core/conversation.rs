//! Conversation state machine.
//!
//! [`Conversation`] is the single owner of the message history, the turn
//! status and the input buffer. User commands (`update_input`, `send`,
//! `new_chat`) and stream events (`on_stream_*`) are the only ways to mutate
//! it, and every mutation is published to subscribers as a
//! [`ConversationEvent`].
//!
//! Stream events carry the generation of the turn they belong to. Each
//! successful `send` and every `new_chat` advances the generation, so events
//! from an abandoned turn no longer match and are dropped without touching
//! state.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::ChatMessage;
use crate::core::chat_stream::StreamEvent;
use crate::core::error::ChatError;
use crate::core::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatStatus {
    /// No request in flight.
    #[default]
    Ready,
    /// Request dispatched, waiting for the response to open.
    Submitted,
    /// Tokens are arriving.
    Streaming,
    /// The last request failed.
    Error,
}

impl ChatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatStatus::Ready => "ready",
            ChatStatus::Submitted => "submitted",
            ChatStatus::Streaming => "streaming",
            ChatStatus::Error => "error",
        }
    }

    /// Whether a turn is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, ChatStatus::Submitted | ChatStatus::Streaming)
    }

    fn accepts_send(self) -> bool {
        matches!(self, ChatStatus::Ready | ChatStatus::Error)
    }
}

impl fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification published after every state mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
    InputChanged,
    MessageAppended { index: usize },
    MessageUpdated { index: usize },
    StatusChanged { from: ChatStatus, to: ChatStatus },
    Reset,
}

/// Everything the transport needs to run one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub generation: u64,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug)]
pub struct Conversation {
    messages: Vec<Message>,
    status: ChatStatus,
    input: String,
    context: String,
    pending_error: Option<ChatError>,
    generation: u64,
    listeners: Vec<mpsc::UnboundedSender<ConversationEvent>>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![Message::greeting()],
            status: ChatStatus::Ready,
            input: String::new(),
            context: String::new(),
            pending_error: None,
            generation: 0,
            listeners: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn pending_error(&self) -> Option<&ChatError> {
        self.pending_error.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Register a listener. The receiver gets every event published from
    /// now on; dropping it unsubscribes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ConversationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    fn publish(&mut self, event: ConversationEvent) {
        self.listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    fn set_status(&mut self, to: ChatStatus) {
        let from = self.status;
        if from == to {
            return;
        }
        self.status = to;
        debug!(%from, %to, generation = self.generation, "conversation status changed");
        self.publish(ConversationEvent::StatusChanged { from, to });
    }

    fn push_message(&mut self, message: Message) {
        self.messages.push(message);
        let index = self.messages.len() - 1;
        self.publish(ConversationEvent::MessageAppended { index });
    }

    pub fn update_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
        self.publish(ConversationEvent::InputChanged);
    }

    /// Set the text prepended to the next message that gets sent.
    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    /// Start a new turn from the input buffer.
    ///
    /// Returns `None` without touching any state when a turn is already in
    /// flight or the input is blank.
    pub fn send(&mut self) -> Option<TurnRequest> {
        if !self.status.accepts_send() || self.input.trim().is_empty() {
            return None;
        }

        let input = std::mem::take(&mut self.input);
        let content = if self.context.is_empty() {
            input
        } else {
            format!("{}\n\n{}", self.context, input)
        };

        self.pending_error = None;
        self.generation += 1;
        self.push_message(Message::user(content));
        self.publish(ConversationEvent::InputChanged);
        self.set_status(ChatStatus::Submitted);

        info!(
            generation = self.generation,
            history = self.messages.len(),
            "submitting chat turn"
        );

        Some(TurnRequest {
            generation: self.generation,
            messages: self.messages.iter().map(ChatMessage::from).collect(),
        })
    }

    /// The response opened: add the assistant placeholder tokens land in.
    pub fn on_stream_start(&mut self, generation: u64) -> bool {
        if !self.accepts_event(generation, "start", &[ChatStatus::Submitted]) {
            return false;
        }
        self.set_status(ChatStatus::Streaming);
        self.push_message(Message::assistant(String::new()));
        true
    }

    pub fn on_stream_token(&mut self, generation: u64, chunk: &str) -> bool {
        if !self.accepts_event(generation, "token", &[ChatStatus::Streaming]) {
            return false;
        }
        let index = self.messages.len() - 1;
        match self.messages.last_mut() {
            Some(message) if message.is_assistant() => message.content.push_str(chunk),
            _ => {
                debug!(generation, "no assistant placeholder for token, dropping");
                return false;
            }
        }
        self.publish(ConversationEvent::MessageUpdated { index });
        true
    }

    pub fn on_stream_end(&mut self, generation: u64) -> bool {
        if !self.accepts_event(
            generation,
            "end",
            &[ChatStatus::Submitted, ChatStatus::Streaming],
        ) {
            return false;
        }
        self.set_status(ChatStatus::Ready);
        true
    }

    /// Record a failed turn. Whatever was streamed so far stays in place.
    pub fn on_error(&mut self, generation: u64, err: ChatError) -> bool {
        if !self.accepts_event(
            generation,
            "error",
            &[ChatStatus::Submitted, ChatStatus::Streaming],
        ) {
            return false;
        }
        info!(generation, error = %err, "chat turn failed");
        self.pending_error = Some(err);
        self.set_status(ChatStatus::Error);
        true
    }

    pub fn apply_stream_event(&mut self, generation: u64, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Start => self.on_stream_start(generation),
            StreamEvent::Token(chunk) => self.on_stream_token(generation, &chunk),
            StreamEvent::End => self.on_stream_end(generation),
            StreamEvent::Error(err) => self.on_error(generation, err),
        }
    }

    /// Drop all history and start over from the greeting. Any turn still in
    /// flight is abandoned.
    pub fn new_chat(&mut self) {
        self.generation += 1;
        self.messages = vec![Message::greeting()];
        self.input.clear();
        self.pending_error = None;
        self.status = ChatStatus::Ready;
        info!(generation = self.generation, "conversation reset");
        self.publish(ConversationEvent::Reset);
    }

    fn accepts_event(&self, generation: u64, kind: &str, allowed: &[ChatStatus]) -> bool {
        if generation != self.generation {
            debug!(
                event = kind,
                stale = generation,
                current = self.generation,
                "dropping stale stream event"
            );
            return false;
        }
        if !allowed.contains(&self.status) {
            debug!(event = kind, status = %self.status, generation, "stream event out of order, dropping");
            return false;
        }
        true
    }
}
