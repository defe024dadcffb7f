use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::api::ChatMessage;
use crate::core::app::App;
use crate::core::config::Settings;
use crate::core::error::ChatError;
use crate::core::transport::{TokenStream, Transport, TransportConfig, WireFormat};
use crate::ui::layout::DEFAULT_CHAT_PERCENT;
use crate::ui::theme::ThemeKind;

pub fn test_transport_config(base_url: &str) -> TransportConfig {
    TransportConfig {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        system_prompt: Some("You are a friendly assistant".to_string()),
        wire_format: WireFormat::Sse,
    }
}

pub fn create_test_settings() -> Settings {
    Settings {
        transport: test_transport_config("http://localhost:9/v1"),
        theme: ThemeKind::Dark,
        sound: false,
        chat_panel_percent: DEFAULT_CHAT_PERCENT,
        context: String::new(),
    }
}

pub fn create_test_app() -> App {
    App::new(&create_test_settings())
}

enum Script {
    Tokens(Vec<Result<String, ChatError>>),
    Fail(ChatError),
    Pending,
}

/// Transport double that replays a fixed reply and records each request.
pub struct ScriptedTransport {
    script: Script,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedTransport {
    pub fn new(items: Vec<Result<String, ChatError>>) -> Self {
        Self::with_script(Script::Tokens(items))
    }

    pub fn tokens(tokens: &[&str]) -> Self {
        Self::new(tokens.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn failing(err: ChatError) -> Self {
        Self::with_script(Script::Fail(err))
    }

    /// A transport whose request never completes.
    pub fn pending() -> Self {
        Self::with_script(Script::Pending)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, ChatError> {
        self.requests.lock().expect("requests lock").push(messages);
        match &self.script {
            Script::Tokens(items) => Ok(stream::iter(items.clone()).boxed()),
            Script::Fail(err) => Err(err.clone()),
            Script::Pending => futures_util::future::pending().await,
        }
    }
}

pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer[header_end + 4..].to_vec();
    while body.len() < content_length {
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

/// Serve a single canned HTTP response on a loopback port. Returns the
/// `/v1` base URL and a handle resolving to the captured request.
pub async fn serve_once(
    status: &str,
    content_type: &str,
    body: &str,
) -> (String, JoinHandle<Result<CapturedRequest, String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n{body}"
    );

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.map_err(|err| err.to_string())?;
        let captured = read_http_request(&mut stream).await?;
        stream
            .write_all(response.as_bytes())
            .await
            .map_err(|err| err.to_string())?;
        stream.shutdown().await.map_err(|err| err.to_string())?;
        Ok(captured)
    });

    (format!("http://{addr}/v1"), handle)
}
