use std::error::Error as StdError;
use std::fmt;

use tracing::warn;

use crate::core::config::data::{Config, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};
use crate::core::transport::TransportConfig;
use crate::ui::layout::DEFAULT_CHAT_PERCENT;
use crate::ui::theme::ThemeKind;

pub const API_KEY_ENV: &str = "GROQ_API_KEY";
pub const BASE_URL_ENV: &str = "SIDECHAT_BASE_URL";
pub const SKIP_VALIDATION_ENV: &str = "SKIP_ENV_VALIDATION";

/// Values supplied on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub theme: Option<String>,
    pub no_sound: bool,
    pub context: Option<String>,
}

#[derive(Debug)]
pub enum SettingsError {
    /// A required environment variable is unset or empty.
    MissingEnv { var: &'static str },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::MissingEnv { var } => write!(
                f,
                "{var} environment variable not set\n\n\
                 Please set your API key:\n\
                 export {var}=\"your-api-key-here\"\n\n\
                 Optionally, point the client at another OpenAI-compatible endpoint:\n\
                 export {BASE_URL_ENV}=\"{DEFAULT_BASE_URL}\"\n\n\
                 Set {SKIP_VALIDATION_ENV}=1 to start without a key."
            ),
        }
    }
}

impl StdError for SettingsError {}

/// Fully resolved session settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub transport: TransportConfig,
    pub theme: ThemeKind,
    pub sound: bool,
    pub chat_panel_percent: u16,
    pub context: String,
}

impl Settings {
    pub fn from_env(config: &Config, overrides: SettingsOverrides) -> Result<Self, SettingsError> {
        Self::resolve(config, overrides, |key| std::env::var(key).ok())
    }

    /// Layer CLI flags, environment and config file, in that order of
    /// precedence. Empty environment values count as unset.
    pub fn resolve<F>(
        config: &Config,
        overrides: SettingsOverrides,
        env: F,
    ) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let api_key = match lookup(API_KEY_ENV) {
            Some(key) => key,
            None if lookup(SKIP_VALIDATION_ENV).is_some() => {
                warn!("{API_KEY_ENV} unset, continuing because {SKIP_VALIDATION_ENV} is set");
                String::new()
            }
            None => return Err(SettingsError::MissingEnv { var: API_KEY_ENV }),
        };

        let base_url = overrides
            .base_url
            .or_else(|| lookup(BASE_URL_ENV))
            .or_else(|| config.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = overrides
            .model
            .filter(|model| !model.trim().is_empty())
            .or_else(|| config.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let system_prompt = match &config.system_prompt {
            Some(prompt) if prompt.trim().is_empty() => None,
            Some(prompt) => Some(prompt.clone()),
            None => Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        let theme_name = overrides.theme.or_else(|| config.theme.clone());
        let theme = match theme_name.as_deref() {
            None => ThemeKind::default(),
            Some(name) => ThemeKind::from_name(name).unwrap_or_else(|| {
                warn!(theme = name, "unknown theme, falling back to dark");
                ThemeKind::default()
            }),
        };

        Ok(Settings {
            transport: TransportConfig {
                base_url,
                api_key,
                model,
                system_prompt,
                wire_format: config.wire_format.unwrap_or_default(),
            },
            theme,
            sound: !overrides.no_sound && config.sound.unwrap_or(true),
            chat_panel_percent: config.chat_panel_percent.unwrap_or(DEFAULT_CHAT_PERCENT),
            context: overrides.context.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::WireFormat;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = Settings::resolve(&Config::default(), SettingsOverrides::default(), env_of(&[]))
            .expect_err("missing key");
        assert!(matches!(err, SettingsError::MissingEnv { var: API_KEY_ENV }));
        assert!(err.to_string().contains("export GROQ_API_KEY"));
    }

    #[test]
    fn empty_key_counts_as_unset() {
        let result = Settings::resolve(
            &Config::default(),
            SettingsOverrides::default(),
            env_of(&[(API_KEY_ENV, "")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn skip_validation_allows_missing_key() {
        let settings = Settings::resolve(
            &Config::default(),
            SettingsOverrides::default(),
            env_of(&[(SKIP_VALIDATION_ENV, "1")]),
        )
        .expect("settings");
        assert_eq!(settings.transport.api_key, "");
    }

    #[test]
    fn defaults_follow_hosted_setup() {
        let settings = Settings::resolve(
            &Config::default(),
            SettingsOverrides::default(),
            env_of(&[(API_KEY_ENV, "k")]),
        )
        .expect("settings");
        assert_eq!(settings.transport.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.transport.model, DEFAULT_MODEL);
        assert_eq!(
            settings.transport.system_prompt.as_deref(),
            Some(DEFAULT_SYSTEM_PROMPT)
        );
        assert_eq!(settings.transport.wire_format, WireFormat::Sse);
        assert_eq!(settings.theme, ThemeKind::Dark);
        assert!(settings.sound);
        assert_eq!(settings.chat_panel_percent, DEFAULT_CHAT_PERCENT);
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let config = Config {
            base_url: Some("http://file".into()),
            model: Some("file-model".into()),
            theme: Some("light".into()),
            sound: Some(true),
            system_prompt: Some("".into()),
            ..Config::default()
        };
        let env = env_of(&[(API_KEY_ENV, "k"), (BASE_URL_ENV, "http://env")]);

        let settings = Settings::resolve(&config, SettingsOverrides::default(), &env)
            .expect("settings");
        assert_eq!(settings.transport.base_url, "http://env");
        assert_eq!(settings.transport.model, "file-model");
        assert_eq!(settings.theme, ThemeKind::Light);
        assert!(settings.transport.system_prompt.is_none());

        let overrides = SettingsOverrides {
            model: Some("cli-model".into()),
            base_url: Some("http://cli".into()),
            theme: Some("dark".into()),
            no_sound: true,
            context: Some("ctx".into()),
        };
        let settings = Settings::resolve(&config, overrides, &env).expect("settings");
        assert_eq!(settings.transport.base_url, "http://cli");
        assert_eq!(settings.transport.model, "cli-model");
        assert_eq!(settings.theme, ThemeKind::Dark);
        assert!(!settings.sound);
        assert_eq!(settings.context, "ctx");
    }

    #[test]
    fn unknown_theme_falls_back_to_dark() {
        let overrides = SettingsOverrides {
            theme: Some("solarized".into()),
            ..SettingsOverrides::default()
        };
        let settings = Settings::resolve(&Config::default(), overrides, env_of(&[(API_KEY_ENV, "k")]))
            .expect("settings");
        assert_eq!(settings.theme, ThemeKind::Dark);
    }
}
