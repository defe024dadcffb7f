use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::app::App;
use crate::core::conversation::ChatStatus;
use crate::ui::theme::Theme;
use crate::ui::wrap::wrap_text;

const INPUT_HEIGHT: u16 = 3;
const INPUT_PLACEHOLDER: &str = "Say something...";

pub fn ui(f: &mut Frame, app: &mut App) {
    let area = f.area();
    f.render_widget(
        Block::default().style(Style::default().bg(app.theme.background_color)),
        area,
    );

    let (content_area, chat_area) = app.layout.split(area);
    render_content_pane(f, app, content_area);
    if app.layout.is_collapsed() {
        render_collapsed_chat(f, app, chat_area);
    } else {
        render_chat_pane(f, app, chat_area);
    }
    render_toast(f, app, area);
}

fn render_content_pane(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let hint = format!(
        " Ctrl+D {} theme · Ctrl+B chat ",
        theme.kind.toggled().as_str()
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_style)
        .title(Line::from(Span::styled(" Content ", theme.title_style)))
        .title(Line::from(Span::styled(hint, theme.hint_style)).right_aligned());

    let body = vec![
        Line::from(Span::styled("Workspace", theme.title_style)),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "Your content lives here. Ask questions in the chat sidebar; answers stream in from {}.",
                app.model
            ),
            theme.body_style,
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Enter send · Esc clear · Ctrl+N new chat · Ctrl+←/→ resize · Ctrl+S sound · Ctrl+C quit",
            theme.hint_style,
        )),
    ];

    f.render_widget(
        Paragraph::new(body)
            .block(block)
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_collapsed_chat(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::LEFT)
        .border_style(app.theme.border_style);
    f.render_widget(
        Paragraph::new(Line::from(Span::styled("◂", app.theme.title_style))).block(block),
        area,
    );
}

fn render_chat_pane(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(app.theme.border_style)
        .title(Line::from(Span::styled(" Chat ", app.theme.title_style)));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(INPUT_HEIGHT)])
        .split(inner);

    let lines = build_transcript_lines(app, chunks[0].width as usize, Instant::now());
    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    app.transcript.max_offset = total.saturating_sub(chunks[0].height);

    f.render_widget(
        Paragraph::new(lines).scroll((app.transcript.effective_offset(), 0)),
        chunks[0],
    );

    render_input(f, app, chunks[1]);
}

/// Pre-wrapped transcript lines for a pane `width` columns wide.
pub fn build_transcript_lines(app: &App, width: usize, now: Instant) -> Vec<Line<'static>> {
    let theme = &app.theme;
    let mut lines = Vec::new();

    for message in app.conversation.messages() {
        let (label, label_style, text_style) = if message.is_user() {
            ("You", theme.user_label_style, theme.user_text_style)
        } else {
            (
                "Assistant",
                theme.assistant_label_style,
                theme.assistant_text_style,
            )
        };
        lines.push(Line::from(Span::styled(label, label_style)));
        for row in wrap_text(&message.content, width) {
            lines.push(Line::from(Span::styled(row, text_style)));
        }
        lines.push(Line::from(""));
    }

    if app.conversation.status() == ChatStatus::Streaming {
        let symbol = pulse_symbol(now.saturating_duration_since(app.pulse_start).as_millis());
        lines.push(Line::from(Span::styled(
            symbol,
            theme.streaming_indicator_style,
        )));
    }

    if let Some(err) = app.conversation.pending_error() {
        for row in wrap_text(&format!("Error: {err}"), width) {
            lines.push(Line::from(Span::styled(row, theme.error_text_style)));
        }
    }

    lines
}

fn pulse_symbol(elapsed_ms: u128) -> &'static str {
    // Two cycles per second, rising then falling.
    let phase = (elapsed_ms % 1000) as f32 / 500.0;
    let intensity = if phase < 1.0 { phase } else { 2.0 - phase };
    if intensity < 0.33 {
        "○"
    } else if intensity < 0.66 {
        "◐"
    } else {
        "●"
    }
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let enabled = app.input_enabled();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(if enabled {
            theme.input_border_style
        } else {
            theme.input_disabled_style
        });
    let inner = block.inner(area);
    let width = inner.width as usize;

    let input = app.conversation.input();
    let line = if input.is_empty() {
        Line::from(Span::styled(INPUT_PLACEHOLDER, theme.hint_style))
    } else {
        let style = input_style(theme, enabled);
        Line::from(Span::styled(visible_tail(input, width.saturating_sub(1)), style))
    };

    f.render_widget(Paragraph::new(line).block(block), area);

    if enabled && inner.width > 0 && inner.height > 0 {
        let shown = visible_tail(input, width.saturating_sub(1)).width() as u16;
        f.set_cursor_position((inner.x + shown.min(inner.width - 1), inner.y));
    }
}

fn input_style(theme: &Theme, enabled: bool) -> Style {
    if enabled {
        theme.input_text_style
    } else {
        theme.input_disabled_style
    }
}

/// The trailing part of `text` that fits in `width` columns.
pub fn visible_tail(text: &str, width: usize) -> &str {
    let mut used = 0;
    let mut start = text.len();
    for (idx, ch) in text.char_indices().rev() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start = idx;
    }
    &text[start..]
}

fn render_toast(f: &mut Frame, app: &App, area: Rect) {
    let Some(toast) = &app.toast else {
        return;
    };
    let rect = toast_rect(&toast.text, area);
    if rect.width == 0 || rect.height == 0 {
        return;
    }
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(Line::from(format!(" {} ", toast.text)).centered())
            .style(app.theme.toast_style)
            .block(Block::default().borders(Borders::ALL).style(app.theme.toast_style)),
        rect,
    );
}

/// Bottom-centred box for a toast, one row above the screen edge.
pub fn toast_rect(text: &str, area: Rect) -> Rect {
    let width = (text.width() as u16).saturating_add(6).min(area.width);
    let height = 3.min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area
        .bottom()
        .saturating_sub(height)
        .saturating_sub(1)
        .max(area.y);
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::AppAction;
    use crate::core::chat_stream::StreamEvent;
    use crate::core::error::ChatError;
    use crate::utils::test_utils::create_test_app;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn transcript_starts_with_greeting() {
        let app = create_test_app();
        let lines = plain(&build_transcript_lines(&app, 40, Instant::now()));
        assert_eq!(lines, vec!["Assistant", "How can I help you today?", ""]);
    }

    #[test]
    fn streaming_shows_indicator_and_error_shows_message() {
        let now = Instant::now();
        let mut app = create_test_app();
        app.apply_action(AppAction::InsertText("Hi".into()), now);
        let Some(crate::core::app::AppCommand::SpawnStream(request)) =
            app.apply_action(AppAction::Send, now).into_iter().next()
        else {
            panic!("expected spawn");
        };
        app.apply_action(
            AppAction::Stream {
                event: StreamEvent::Start,
                generation: request.generation,
            },
            now,
        );
        let lines = plain(&build_transcript_lines(&app, 40, now));
        assert!(["○", "◐", "●"].contains(&lines.last().expect("line").as_str()));

        app.apply_action(
            AppAction::Stream {
                event: StreamEvent::Error(ChatError::Stream("reset".into())),
                generation: request.generation,
            },
            now,
        );
        let lines = plain(&build_transcript_lines(&app, 80, now));
        assert_eq!(lines.last().expect("line"), "Error: Stream error: reset");
    }

    #[test]
    fn visible_tail_keeps_end_of_long_input() {
        assert_eq!(visible_tail("hello world", 5), "world");
        assert_eq!(visible_tail("short", 10), "short");
        assert_eq!(visible_tail("日本語", 4), "本語");
        assert_eq!(visible_tail("abc", 0), "");
    }

    #[test]
    fn toast_sits_bottom_centre() {
        let rect = toast_rect("Network error", Rect::new(0, 0, 100, 30));
        assert_eq!(rect.width, 19);
        assert_eq!(rect.height, 3);
        assert_eq!(rect.x, 40);
        assert_eq!(rect.y, 26);
    }

    #[test]
    fn toast_fits_tiny_screens() {
        let rect = toast_rect("Network error", Rect::new(0, 0, 10, 2));
        assert_eq!(rect, Rect::new(0, 0, 10, 2));
    }

    #[test]
    fn pulse_cycles_through_symbols() {
        assert_eq!(pulse_symbol(0), "○");
        assert_eq!(pulse_symbol(250), "◐");
        assert_eq!(pulse_symbol(480), "●");
    }
}
