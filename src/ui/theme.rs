use ratatui::style::{Color, Modifier, Style};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeKind {
    #[default]
    Dark,
    Light,
}

impl ThemeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeKind::Dark => "dark",
            ThemeKind::Light => "light",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(ThemeKind::Dark),
            "light" => Some(ThemeKind::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeKind::Dark => ThemeKind::Light,
            ThemeKind::Light => ThemeKind::Dark,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub kind: ThemeKind,
    // Overall background color to paint the full frame
    pub background_color: Color,
    pub body_style: Style,
    pub border_style: Style,
    pub title_style: Style,
    pub hint_style: Style,

    // Chat message styles
    pub user_label_style: Style,
    pub user_text_style: Style,
    pub assistant_label_style: Style,
    pub assistant_text_style: Style,
    pub error_text_style: Style,
    pub streaming_indicator_style: Style,

    // Input area
    pub input_text_style: Style,
    pub input_disabled_style: Style,
    pub input_border_style: Style,

    pub toast_style: Style,
}

impl Theme {
    pub fn for_kind(kind: ThemeKind) -> Self {
        match kind {
            ThemeKind::Dark => Self::dark(),
            ThemeKind::Light => Self::light(),
        }
    }

    pub fn dark() -> Self {
        Theme {
            kind: ThemeKind::Dark,
            background_color: Color::Rgb(0x12, 0x12, 0x16),
            body_style: Style::default().fg(Color::Rgb(0xd8, 0xd8, 0xe0)),
            border_style: Style::default().fg(Color::DarkGray),
            title_style: Style::default()
                .fg(Color::Rgb(0xf0, 0xf0, 0xf5))
                .add_modifier(Modifier::BOLD),
            hint_style: Style::default().fg(Color::DarkGray),

            user_label_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            user_text_style: Style::default().fg(Color::Cyan),
            assistant_label_style: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
            assistant_text_style: Style::default().fg(Color::White),
            error_text_style: Style::default().fg(Color::LightRed),
            streaming_indicator_style: Style::default().fg(Color::White),

            input_text_style: Style::default().fg(Color::White),
            input_disabled_style: Style::default().fg(Color::DarkGray),
            input_border_style: Style::default().fg(Color::Gray),

            toast_style: Style::default()
                .fg(Color::Black)
                .bg(Color::Rgb(0xe0, 0xe0, 0xe6)),
        }
    }

    pub fn light() -> Self {
        Theme {
            kind: ThemeKind::Light,
            background_color: Color::Rgb(0xfa, 0xfa, 0xfa),
            body_style: Style::default().fg(Color::Rgb(0x20, 0x20, 0x28)),
            border_style: Style::default().fg(Color::Gray),
            title_style: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            hint_style: Style::default().fg(Color::Gray),

            user_label_style: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            user_text_style: Style::default().fg(Color::Blue),
            assistant_label_style: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
            assistant_text_style: Style::default().fg(Color::Black),
            error_text_style: Style::default().fg(Color::Red),
            streaming_indicator_style: Style::default().fg(Color::Black),

            input_text_style: Style::default().fg(Color::Black),
            input_disabled_style: Style::default().fg(Color::Gray),
            input_border_style: Style::default().fg(Color::DarkGray),

            toast_style: Style::default()
                .fg(Color::White)
                .bg(Color::Rgb(0x30, 0x30, 0x38)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_case_insensitively() {
        assert_eq!(ThemeKind::from_name(" Light "), Some(ThemeKind::Light));
        assert_eq!(ThemeKind::from_name("DARK"), Some(ThemeKind::Dark));
        assert_eq!(ThemeKind::from_name("dracula"), None);
    }

    #[test]
    fn toggle_flips_palette() {
        let kind = ThemeKind::default().toggled();
        assert_eq!(kind, ThemeKind::Light);
        let theme = Theme::for_kind(kind);
        assert_eq!(theme.kind, ThemeKind::Light);
        assert_ne!(theme.background_color, Theme::dark().background_color);
        assert_eq!(kind.toggled(), ThemeKind::Dark);
    }
}
