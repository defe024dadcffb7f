//! Session-level application state.
//!
//! [`App`] wraps the [`Conversation`] together with the purely visual state
//! around it (layout, theme, toast, scroll position). Input from the
//! terminal and events from the stream service arrive as [`AppAction`]s;
//! anything that has to happen outside the state (spawning a request,
//! ringing the bell, writing the config file) comes back as an
//! [`AppCommand`] for the event loop to execute.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::chat_stream::StreamEvent;
use crate::core::config::Settings;
use crate::core::conversation::{ChatStatus, Conversation, ConversationEvent, TurnRequest};
use crate::ui::layout::PanelLayout;
use crate::ui::sound::SoundEffect;
use crate::ui::theme::{Theme, ThemeKind};

pub const TOAST_DURATION: Duration = Duration::from_secs(4);

pub enum AppAction {
    InsertChar(char),
    InsertText(String),
    Backspace,
    ClearInput,
    Send,
    NewChat,
    ToggleSidebar,
    ResizeSidebar { steps: i16 },
    ToggleTheme,
    ToggleSound,
    ScrollUp { lines: u16 },
    ScrollDown { lines: u16 },
    Stream { event: StreamEvent, generation: u64 },
    Tick,
    Quit,
}

#[derive(Debug)]
pub enum AppCommand {
    SpawnStream(TurnRequest),
    PlaySound,
    PersistTheme(ThemeKind),
}

/// Transient notification shown over the bottom of the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub text: String,
    pub expires_at: Instant,
}

/// Scroll state of the chat transcript. `max_offset` is refreshed by the
/// renderer every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptScroll {
    pub offset: u16,
    pub max_offset: u16,
    pub auto_scroll: bool,
}

impl Default for TranscriptScroll {
    fn default() -> Self {
        Self {
            offset: 0,
            max_offset: 0,
            auto_scroll: true,
        }
    }
}

impl TranscriptScroll {
    /// Offset to render with, pinned to the bottom while auto-scrolling.
    pub fn effective_offset(&self) -> u16 {
        if self.auto_scroll {
            self.max_offset
        } else {
            self.offset.min(self.max_offset)
        }
    }

    fn scroll_up(&mut self, lines: u16) {
        self.offset = self.effective_offset().saturating_sub(lines);
        self.auto_scroll = false;
    }

    fn scroll_down(&mut self, lines: u16) {
        self.offset = self
            .effective_offset()
            .saturating_add(lines)
            .min(self.max_offset);
        self.auto_scroll = self.offset >= self.max_offset;
    }

    fn pin_to_bottom(&mut self) {
        self.auto_scroll = true;
        self.offset = self.max_offset;
    }
}

pub struct App {
    pub conversation: Conversation,
    events: mpsc::UnboundedReceiver<ConversationEvent>,
    pub layout: PanelLayout,
    pub theme: Theme,
    pub sound: SoundEffect,
    pub toast: Option<Toast>,
    pub transcript: TranscriptScroll,
    pub model: String,
    pub pulse_start: Instant,
    pub should_quit: bool,
    needs_redraw: bool,
    stream_cancel: Option<CancellationToken>,
}

impl App {
    pub fn new(settings: &Settings) -> Self {
        let mut conversation = Conversation::new();
        let events = conversation.subscribe();
        conversation.set_context(settings.context.clone());

        Self {
            conversation,
            events,
            layout: PanelLayout::new(settings.chat_panel_percent),
            theme: Theme::for_kind(settings.theme),
            sound: SoundEffect::new(settings.sound),
            toast: None,
            transcript: TranscriptScroll::default(),
            model: settings.transport.model.clone(),
            pulse_start: Instant::now(),
            should_quit: false,
            needs_redraw: true,
            stream_cancel: None,
        }
    }

    /// Whether the input box accepts edits.
    pub fn input_enabled(&self) -> bool {
        !self.conversation.status().is_busy()
    }

    /// Remember the abort handle of the turn in flight.
    pub fn track_stream(&mut self, token: CancellationToken) {
        if let Some(previous) = self.stream_cancel.replace(token) {
            previous.cancel();
        }
    }

    fn cancel_current_stream(&mut self) {
        if let Some(token) = self.stream_cancel.take() {
            debug!("cancelling in-flight chat stream");
            token.cancel();
        }
    }

    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Returns true once after any state change since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    pub fn apply_action(&mut self, action: AppAction, now: Instant) -> Vec<AppCommand> {
        let mut commands = Vec::new();

        match action {
            AppAction::InsertChar(ch) => {
                if self.input_enabled() {
                    let mut input = self.conversation.input().to_string();
                    input.push(ch);
                    self.conversation.update_input(input);
                }
            }
            AppAction::InsertText(text) => {
                if self.input_enabled() {
                    let input = format!("{}{}", self.conversation.input(), text);
                    self.conversation.update_input(input);
                }
            }
            AppAction::Backspace => {
                if self.input_enabled() {
                    let mut input = self.conversation.input().to_string();
                    input.pop();
                    self.conversation.update_input(input);
                }
            }
            AppAction::ClearInput => {
                if self.input_enabled() {
                    self.conversation.update_input(String::new());
                }
            }
            AppAction::Send => {
                if let Some(request) = self.conversation.send() {
                    self.pulse_start = now;
                    self.transcript.pin_to_bottom();
                    commands.push(AppCommand::SpawnStream(request));
                    commands.push(AppCommand::PlaySound);
                }
            }
            AppAction::NewChat => {
                self.cancel_current_stream();
                self.conversation.new_chat();
                self.toast = None;
                self.transcript.pin_to_bottom();
            }
            AppAction::ToggleSidebar => {
                self.layout.toggle_collapsed();
                self.needs_redraw = true;
                commands.push(AppCommand::PlaySound);
            }
            AppAction::ResizeSidebar { steps } => {
                self.layout.nudge(steps);
                self.needs_redraw = true;
            }
            AppAction::ToggleTheme => {
                let kind = self.theme.kind.toggled();
                self.theme = Theme::for_kind(kind);
                self.needs_redraw = true;
                commands.push(AppCommand::PersistTheme(kind));
            }
            AppAction::ToggleSound => {
                let enabled = !self.sound.is_enabled();
                self.sound.set_enabled(enabled);
                self.needs_redraw = true;
            }
            AppAction::ScrollUp { lines } => {
                self.transcript.scroll_up(lines);
                self.needs_redraw = true;
            }
            AppAction::ScrollDown { lines } => {
                self.transcript.scroll_down(lines);
                self.needs_redraw = true;
            }
            AppAction::Stream { event, generation } => {
                let terminal = matches!(event, StreamEvent::End | StreamEvent::Error(_));
                if self.conversation.apply_stream_event(generation, event) && terminal {
                    self.stream_cancel = None;
                }
            }
            AppAction::Tick => {
                if self.conversation.status() == ChatStatus::Streaming {
                    self.needs_redraw = true;
                }
                if self.toast.as_ref().is_some_and(|t| now >= t.expires_at) {
                    self.toast = None;
                    self.needs_redraw = true;
                }
            }
            AppAction::Quit => {
                self.cancel_current_stream();
                self.should_quit = true;
            }
        }

        self.drain_conversation_events(now);
        commands
    }

    fn drain_conversation_events(&mut self, now: Instant) {
        while let Ok(event) = self.events.try_recv() {
            self.needs_redraw = true;
            if let ConversationEvent::StatusChanged {
                to: ChatStatus::Error,
                ..
            } = event
            {
                if let Some(err) = self.conversation.pending_error() {
                    self.toast = Some(Toast {
                        text: err.name().to_string(),
                        expires_at: now + TOAST_DURATION,
                    });
                }
            }
        }
    }
}
