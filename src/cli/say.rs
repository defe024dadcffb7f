//! TUI-less "say" command

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use crate::core::chat_stream::{ChatStreamService, StreamEvent};
use crate::core::conversation::Conversation;
use crate::core::error::ChatError;
use crate::core::transport::Transport;

/// Run one turn through a fresh conversation, writing tokens to `out` as
/// they arrive. Returns the full reply.
pub async fn stream_reply<W: Write>(
    transport: Arc<dyn Transport>,
    context: &str,
    prompt: &str,
    out: &mut W,
) -> Result<String, Box<dyn Error>> {
    let mut conversation = Conversation::new();
    conversation.set_context(context);
    conversation.update_input(prompt);
    let Some(request) = conversation.send() else {
        return Err("prompt is empty".into());
    };

    let (stream_service, mut rx) = ChatStreamService::new(transport);
    let _cancel = stream_service.spawn_stream(request);
    drop(stream_service);

    while let Some((event, generation)) = rx.recv().await {
        let token = match &event {
            StreamEvent::Token(token) => Some(token.clone()),
            _ => None,
        };
        let terminal = matches!(event, StreamEvent::End | StreamEvent::Error(_));
        if conversation.apply_stream_event(generation, event) {
            if let Some(token) = token {
                out.write_all(token.as_bytes())?;
                out.flush()?;
            }
        }
        if terminal {
            break;
        }
    }

    if let Some(err) = conversation.pending_error() {
        return Err(Box::new(err.clone()));
    }

    match conversation.last_message() {
        Some(message) if message.is_assistant() => Ok(message.content.clone()),
        _ => Err(Box::new(ChatError::Stream(
            "stream closed before a reply arrived".to_string(),
        ))),
    }
}

pub async fn run_say(
    prompt: Vec<String>,
    transport: Arc<dyn Transport>,
    context: &str,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: sidechat say <prompt>");
        std::process::exit(1);
    }

    let mut stdout = io::stdout();
    match stream_reply(transport, context, &prompt, &mut stdout).await {
        Ok(_) => {
            println!();
            Ok(())
        }
        Err(err) => {
            eprintln!("\n\n❌ Error: {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use crate::utils::test_utils::ScriptedTransport;

    #[tokio::test]
    async fn prints_tokens_and_returns_reply() {
        let transport = Arc::new(ScriptedTransport::tokens(&["Hel", "lo", "!"]));
        let mut out = Vec::new();
        let reply = stream_reply(transport.clone(), "", "Hi", &mut out)
            .await
            .expect("reply");
        assert_eq!(reply, "Hello!");
        assert_eq!(out, b"Hello!");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let sent = &requests[0];
        assert_eq!(sent[0].role, Role::Assistant);
        assert_eq!(sent.last().expect("user message").content, "Hi");
    }

    #[tokio::test]
    async fn context_is_prefixed() {
        let transport = Arc::new(ScriptedTransport::tokens(&["ok"]));
        let mut out = Vec::new();
        stream_reply(transport.clone(), "Page: docs", "Summarise", &mut out)
            .await
            .expect("reply");
        let sent = &transport.requests()[0];
        assert_eq!(
            sent.last().expect("user message").content,
            "Page: docs\n\nSummarise"
        );
    }

    #[tokio::test]
    async fn open_failure_is_returned() {
        let transport = Arc::new(ScriptedTransport::failing(ChatError::Http {
            status: 401,
            message: "Invalid API key".into(),
        }));
        let mut out = Vec::new();
        let err = stream_reply(transport, "", "Hi", &mut out)
            .await
            .expect_err("error");
        assert_eq!(err.to_string(), "API error (401): Invalid API key");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn partial_reply_then_error_keeps_streamed_text() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok("par".into()),
            Err(ChatError::Stream("connection reset".into())),
        ]));
        let mut out = Vec::new();
        let err = stream_reply(transport, "", "Hi", &mut out)
            .await
            .expect_err("error");
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(out, b"par");
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let transport = Arc::new(ScriptedTransport::tokens(&["unused"]));
        let mut out = Vec::new();
        assert!(stream_reply(transport.clone(), "", "  ", &mut out).await.is_err());
        assert!(transport.requests().is_empty());
    }
}
