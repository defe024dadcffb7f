use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ChatMessage;
use crate::core::conversation::TurnRequest;
use crate::core::error::ChatError;
use crate::core::transport::Transport;

/// Lifecycle of one turn as seen by the conversation.
///
/// A turn produces at most one `Start`, which precedes every `Token`, and
/// ends with exactly one of `End` or `Error`. A turn whose request never
/// opens produces a lone `Error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Start,
    Token(String),
    End,
    Error(ChatError),
}

/// Events tagged with the generation of the turn that produced them.
pub type StreamSender = mpsc::UnboundedSender<(StreamEvent, u64)>;
pub type StreamReceiver = mpsc::UnboundedReceiver<(StreamEvent, u64)>;

/// Run one turn against `transport`, forwarding its events to `tx`.
pub async fn drive_stream(
    transport: &dyn Transport,
    messages: Vec<ChatMessage>,
    generation: u64,
    tx: &StreamSender,
) {
    run_turn(transport, messages, generation, tx, None).await;
}

/// Send one event unless the turn was cancelled. Returns false once the
/// turn should stop.
fn emit(
    tx: &StreamSender,
    cancel: Option<&CancellationToken>,
    event: StreamEvent,
    generation: u64,
) -> bool {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        debug!(generation, "chat stream cancelled, dropping event");
        return false;
    }
    tx.send((event, generation)).is_ok()
}

async fn run_turn(
    transport: &dyn Transport,
    messages: Vec<ChatMessage>,
    generation: u64,
    tx: &StreamSender,
    cancel: Option<&CancellationToken>,
) {
    let mut tokens = match transport.open(messages).await {
        Ok(tokens) => tokens,
        Err(err) => {
            warn!(generation, error = %err, "chat request failed");
            emit(tx, cancel, StreamEvent::Error(err), generation);
            return;
        }
    };

    if !emit(tx, cancel, StreamEvent::Start, generation) {
        return;
    }

    while let Some(item) = tokens.next().await {
        match item {
            Ok(chunk) if chunk.is_empty() => {}
            Ok(chunk) => {
                if !emit(tx, cancel, StreamEvent::Token(chunk), generation) {
                    debug!(generation, "abandoning turn");
                    return;
                }
            }
            Err(err) => {
                warn!(generation, error = %err, "chat stream failed");
                emit(tx, cancel, StreamEvent::Error(err), generation);
                return;
            }
        }
    }

    debug!(generation, "chat stream completed");
    emit(tx, cancel, StreamEvent::End, generation);
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: StreamSender,
    transport: Arc<dyn Transport>,
}

impl ChatStreamService {
    pub fn new(transport: Arc<dyn Transport>) -> (Self, StreamReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, transport }, rx)
    }

    /// Spawn the turn on the runtime. Cancelling the returned token stops
    /// the turn without emitting anything further.
    pub fn spawn_stream(&self, request: TurnRequest) -> CancellationToken {
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();
        let tx = self.tx.clone();
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            let TurnRequest {
                generation,
                messages,
            } = request;
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!(generation, "chat stream cancelled");
                }
                _ = run_turn(transport.as_ref(), messages, generation, &tx, Some(&task_token)) => {}
            }
        });

        cancel_token
    }
}
