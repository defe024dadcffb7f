//! HTTP transport for chat turns.
//!
//! A [`Transport`] takes the full message history and hands back the
//! assistant reply as a stream of text chunks. [`HttpTransport`] talks to an
//! OpenAI-compatible `chat/completions` endpoint and understands two body
//! formats: server-sent events carrying completion deltas, and a plain text
//! body where every network chunk is a token.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use memchr::memchr;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::error::ChatError;
use crate::core::message::Role;
use crate::utils::url::construct_api_url;

pub type TokenStream = BoxStream<'static, Result<String, ChatError>>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one request for `messages` and expose the reply as tokens.
    async fn open(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, ChatError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// `data: {...}` lines with completion deltas, closed by `[DONE]`.
    #[default]
    Sse,
    /// Raw UTF-8 text.
    Text,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub wire_format: WireFormat,
}

pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: TransportConfig) -> Self {
        Self { client, config }
    }

    fn build_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = self
            .config
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            api_messages.push(ChatMessage {
                role: Role::System,
                content: prompt.to_string(),
            });
        }
        api_messages.extend(messages);

        ChatRequest {
            model: self.config.model.clone(),
            messages: api_messages,
            stream: true,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, ChatError> {
        let request = self.build_request(messages);
        let url = construct_api_url(&self.config.base_url, "chat/completions");
        debug!(%url, model = %request.model, messages = request.messages.len(), "opening chat stream");

        let mut http_request = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if !self.config.api_key.is_empty() {
            http_request =
                http_request.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = http_request.json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ChatError::Http {
                status: status.as_u16(),
                message: summarize_error_body(&body),
            });
        }

        let body = response.bytes_stream();
        Ok(match self.config.wire_format {
            WireFormat::Sse => decode_body(body, SseDecoder::default()),
            WireFormat::Text => decode_body(body, TextDecoder::default()),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Decoded {
    Token(String),
    Done,
    Error(ChatError),
}

trait ChunkDecoder: Send + 'static {
    fn feed(&mut self, bytes: &[u8], out: &mut VecDeque<Decoded>);
    fn finish(&mut self, out: &mut VecDeque<Decoded>);
}

#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn process_line(line: &str, out: &mut VecDeque<Decoded>) {
        let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
            return;
        };
        if payload.is_empty() {
            return;
        }
        if payload == "[DONE]" {
            out.push_back(Decoded::Done);
            return;
        }

        match serde_json::from_str::<ChatResponse>(payload) {
            Ok(response) => {
                if let Some(content) = response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                {
                    if !content.is_empty() {
                        out.push_back(Decoded::Token(content));
                    }
                }
            }
            Err(parse_err) => match serde_json::from_str::<serde_json::Value>(payload) {
                Ok(value) => match extract_error_summary(&value) {
                    Some(summary) => out.push_back(Decoded::Error(ChatError::Stream(summary))),
                    None => debug!(%payload, "skipping unrecognised stream payload"),
                },
                Err(_) => out.push_back(Decoded::Error(ChatError::Decode(format!(
                    "invalid stream payload: {parse_err}"
                )))),
            },
        }
    }
}

impl ChunkDecoder for SseDecoder {
    fn feed(&mut self, bytes: &[u8], out: &mut VecDeque<Decoded>) {
        self.buffer.extend_from_slice(bytes);
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            match std::str::from_utf8(&self.buffer[..newline_pos]) {
                Ok(line) => Self::process_line(line.trim(), out),
                Err(e) => out.push_back(invalid_utf8_line(e)),
            }
            self.buffer.drain(..=newline_pos);
        }
    }

    fn finish(&mut self, out: &mut VecDeque<Decoded>) {
        if self.buffer.is_empty() {
            return;
        }
        let rest = std::mem::take(&mut self.buffer);
        match std::str::from_utf8(&rest) {
            Ok(line) => Self::process_line(line.trim(), out),
            Err(e) => out.push_back(invalid_utf8_line(e)),
        }
    }
}

fn invalid_utf8_line(err: std::str::Utf8Error) -> Decoded {
    warn!("Invalid UTF-8 in stream: {err}");
    Decoded::Error(ChatError::Decode(format!(
        "invalid UTF-8 in stream line: {err}"
    )))
}

/// Decodes a raw text body, holding back incomplete UTF-8 sequences until
/// the rest of the character arrives.
#[derive(Default)]
struct TextDecoder {
    carry: Vec<u8>,
}

impl ChunkDecoder for TextDecoder {
    fn feed(&mut self, bytes: &[u8], out: &mut VecDeque<Decoded>) {
        self.carry.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.carry) {
            Ok(_) => self.carry.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                out.push_back(Decoded::Error(ChatError::Decode(format!(
                    "invalid UTF-8 in response body: {e}"
                ))));
                self.carry.clear();
                return;
            }
        };
        if valid_up_to == 0 {
            return;
        }
        let rest = self.carry.split_off(valid_up_to);
        let text = String::from_utf8(std::mem::replace(&mut self.carry, rest))
            .unwrap_or_default();
        out.push_back(Decoded::Token(text));
    }

    fn finish(&mut self, out: &mut VecDeque<Decoded>) {
        if !self.carry.is_empty() {
            self.carry.clear();
            out.push_back(Decoded::Error(ChatError::Decode(
                "response body ended inside a UTF-8 sequence".to_string(),
            )));
        }
    }
}

struct DecodeState<D> {
    body: BoxStream<'static, Result<Vec<u8>, ChatError>>,
    decoder: D,
    pending: VecDeque<Decoded>,
    exhausted: bool,
    finished: bool,
}

impl<D: ChunkDecoder> DecodeState<D> {
    async fn next_token(&mut self) -> Option<Result<String, ChatError>> {
        loop {
            if self.finished {
                return None;
            }
            match self.pending.pop_front() {
                Some(Decoded::Token(token)) => return Some(Ok(token)),
                Some(Decoded::Done) => {
                    self.finished = true;
                    return None;
                }
                Some(Decoded::Error(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None if self.exhausted => {
                    self.finished = true;
                    return None;
                }
                None => {}
            }

            match self.body.next().await {
                Some(Ok(bytes)) => self.decoder.feed(&bytes, &mut self.pending),
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.exhausted = true;
                    self.decoder.finish(&mut self.pending);
                }
            }
        }
    }
}

fn decode_body<S, B, E, D>(body: S, decoder: D) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Into<ChatError>,
    D: ChunkDecoder,
{
    let body = body
        .map(|item| item.map(|bytes| bytes.as_ref().to_vec()).map_err(Into::into))
        .boxed();
    let state = DecodeState {
        body,
        decoder,
        pending: VecDeque::new(),
        exhausted: false,
        finished: false,
    };
    stream::unfold(state, |mut state| async move {
        state.next_token().await.map(|item| (item, state))
    })
    .boxed()
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

const MAX_ERROR_BODY_CHARS: usize = 300;

fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&value) {
            return summary;
        }
    }
    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = collapsed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}…")
    } else {
        collapsed
    }
}
