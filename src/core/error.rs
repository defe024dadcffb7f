use std::error::Error as StdError;
use std::fmt;

/// Failure of a single chat turn, as surfaced to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The request never reached the endpoint (DNS, connect, TLS, ...).
    Network(String),

    /// The endpoint answered with a non-success status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Summary of the response body.
        message: String,
    },

    /// The response stream broke off or carried an in-band error.
    Stream(String),

    /// The response could not be decoded.
    Decode(String),
}

impl ChatError {
    /// Short label suitable for a transient notification.
    pub fn name(&self) -> &'static str {
        match self {
            ChatError::Network(_) => "Network error",
            ChatError::Http { .. } => "API error",
            ChatError::Stream(_) => "Stream error",
            ChatError::Decode(_) => "Decode error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ChatError::Network(message)
            | ChatError::Stream(message)
            | ChatError::Decode(message) => message,
            ChatError::Http { message, .. } => message,
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Network(message) => write!(f, "Network error: {message}"),
            ChatError::Http { status, message } => write!(f, "API error ({status}): {message}"),
            ChatError::Stream(message) => write!(f, "Stream error: {message}"),
            ChatError::Decode(message) => write!(f, "Decode error: {message}"),
        }
    }
}

impl StdError for ChatError {}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Decode(err.to_string())
        } else if err.is_body() {
            ChatError::Stream(err.to_string())
        } else {
            ChatError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_status_for_http_errors() {
        let err = ChatError::Http {
            status: 429,
            message: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "API error (429): rate limited");
        assert_eq!(err.name(), "API error");
        assert_eq!(err.message(), "rate limited");
    }

    #[test]
    fn message_returns_payload_without_prefix() {
        let err = ChatError::Network("network down".into());
        assert_eq!(err.message(), "network down");
        assert_eq!(err.to_string(), "Network error: network down");
    }
}
