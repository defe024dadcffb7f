use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::transport::WireFormat;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "deepseek-r1-distill-llama-70b";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly assistant";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// OpenAI-compatible API root, e.g. "https://api.groq.com/openai/v1"
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// System prompt sent ahead of the conversation. Empty disables it.
    pub system_prompt: Option<String>,
    /// UI theme name ("dark" or "light")
    pub theme: Option<String>,
    /// Ring the terminal bell on sends and sidebar toggles
    pub sound: Option<bool>,
    pub wire_format: Option<WireFormat>,
    /// Width of the chat sidebar in percent of the terminal
    pub chat_panel_percent: Option<u16>,
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        print_value("base-url", self.base_url.as_deref());
        print_value("model", self.model.as_deref());
        print_value("system-prompt", self.system_prompt.as_deref());
        print_value("theme", self.theme.as_deref());
        match self.sound {
            Some(true) => println!("  sound: on"),
            Some(false) => println!("  sound: off"),
            None => println!("  sound: (unset)"),
        }
        match self.wire_format {
            Some(WireFormat::Sse) => println!("  wire-format: sse"),
            Some(WireFormat::Text) => println!("  wire-format: text"),
            None => println!("  wire-format: (unset)"),
        }
        match self.chat_panel_percent {
            Some(percent) => println!("  chat-panel-percent: {percent}"),
            None => println!("  chat-panel-percent: (unset)"),
        }
    }
}

fn print_value(key: &str, value: Option<&str>) {
    match value {
        Some(value) => println!("  {key}: {value}"),
        None => println!("  {key}: (unset)"),
    }
}

/// Render a path for humans, abbreviating the home directory as `~`.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            theme = "light"
            sound = false
            wire_format = "text"
            "#,
        )
        .expect("parse");
        assert_eq!(config.theme.as_deref(), Some("light"));
        assert_eq!(config.sound, Some(false));
        assert_eq!(config.wire_format, Some(WireFormat::Text));
        assert!(config.base_url.is_none());
    }

    #[test]
    fn empty_file_is_default() {
        let config: Config = toml::from_str("").expect("parse");
        assert_eq!(config, Config::default());
    }
}
