//! Terminal event loop for the interactive chat.
//!
//! Polls crossterm input on a background task, maps keys to
//! [`AppAction`]s, feeds stream events back into the app and executes the
//! [`AppCommand`]s the app hands back.

use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::app::{App, AppAction, AppCommand};
use crate::core::chat_stream::ChatStreamService;
use crate::core::config::{Config, Settings};
use crate::core::transport::Transport;
use crate::ui::renderer::ui;
use crate::ui::theme::ThemeKind;

type ChatTerminal = Terminal<CrosstermBackend<io::Stdout>>;

const FRAME_DURATION: Duration = Duration::from_millis(1000 / 30);
const PAGE_LINES: u16 = 10;

pub fn setup_terminal() -> Result<ChatTerminal, Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout)).inspect_err(|_| {
        let _ = disable_raw_mode();
    })?;
    Ok(terminal)
}

pub fn restore_terminal(terminal: &mut ChatTerminal) -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Translate a key press into an action. Unbound keys map to `None`.
pub fn map_key(key: KeyEvent) -> Option<AppAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Some(AppAction::Quit),
        KeyCode::Char('n') if ctrl => Some(AppAction::NewChat),
        KeyCode::Char('b') if ctrl => Some(AppAction::ToggleSidebar),
        KeyCode::Char('d') if ctrl => Some(AppAction::ToggleTheme),
        KeyCode::Char('s') if ctrl => Some(AppAction::ToggleSound),
        KeyCode::Left if ctrl => Some(AppAction::ResizeSidebar { steps: 1 }),
        KeyCode::Right if ctrl => Some(AppAction::ResizeSidebar { steps: -1 }),
        KeyCode::Char(_) if ctrl => None,
        KeyCode::Char(ch) => Some(AppAction::InsertChar(ch)),
        KeyCode::Enter => Some(AppAction::Send),
        KeyCode::Backspace => Some(AppAction::Backspace),
        KeyCode::Esc => Some(AppAction::ClearInput),
        KeyCode::Up => Some(AppAction::ScrollUp { lines: 1 }),
        KeyCode::Down => Some(AppAction::ScrollDown { lines: 1 }),
        KeyCode::PageUp => Some(AppAction::ScrollUp { lines: PAGE_LINES }),
        KeyCode::PageDown => Some(AppAction::ScrollDown { lines: PAGE_LINES }),
        _ => None,
    }
}

fn spawn_event_reader(event_tx: mpsc::UnboundedSender<Event>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Ok(true) = event::poll(Duration::from_millis(10)) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(_) => continue,
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
}

fn persist_theme(kind: ThemeKind) {
    let mut config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "not persisting theme, config unreadable");
            return;
        }
    };
    config.theme = Some(kind.as_str().to_string());
    if let Err(err) = config.save() {
        warn!(error = %err, "failed to persist theme");
    }
}

fn execute_commands(app: &mut App, stream_service: &ChatStreamService, commands: Vec<AppCommand>) {
    for command in commands {
        match command {
            AppCommand::SpawnStream(request) => {
                let token = stream_service.spawn_stream(request);
                app.track_stream(token);
            }
            AppCommand::PlaySound => {
                if let Err(err) = app.sound.play(&mut io::stdout()) {
                    warn!(error = %err, "failed to ring terminal bell");
                }
            }
            AppCommand::PersistTheme(kind) => persist_theme(kind),
        }
    }
}

pub async fn run_chat(
    settings: Settings,
    transport: Arc<dyn Transport>,
) -> Result<(), Box<dyn Error>> {
    let mut app = App::new(&settings);
    let (stream_service, mut stream_rx) = ChatStreamService::new(transport);

    info!(model = %settings.transport.model, "starting chat session");

    let mut terminal = setup_terminal()?;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let event_reader = spawn_event_reader(event_tx);

    let result: Result<(), Box<dyn Error>> = async {
        let mut last_tick = Instant::now();
        loop {
            if app.take_redraw() {
                terminal.draw(|f| ui(f, &mut app))?;
            }

            tokio::select! {
                Some(ev) = event_rx.recv() => {
                    let action = match ev {
                        Event::Key(key) if key.kind == KeyEventKind::Press => map_key(key),
                        Event::Paste(text) => Some(AppAction::InsertText(text)),
                        Event::Resize(_, _) => {
                            app.request_redraw();
                            None
                        }
                        _ => None,
                    };
                    if let Some(action) = action {
                        let commands = app.apply_action(action, Instant::now());
                        execute_commands(&mut app, &stream_service, commands);
                    }
                }
                Some((event, generation)) = stream_rx.recv() => {
                    app.apply_action(AppAction::Stream { event, generation }, Instant::now());
                }
                _ = tokio::time::sleep(FRAME_DURATION) => {}
            }

            if last_tick.elapsed() >= FRAME_DURATION {
                app.apply_action(AppAction::Tick, Instant::now());
                last_tick = Instant::now();
            }

            if app.should_quit {
                break Ok(());
            }
        }
    }
    .await;

    event_reader.abort();
    restore_terminal(&mut terminal)?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::CONTROL)
    }

    fn plain(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn control_chords_map_to_session_actions() {
        assert!(matches!(map_key(ctrl(KeyCode::Char('c'))), Some(AppAction::Quit)));
        assert!(matches!(map_key(ctrl(KeyCode::Char('n'))), Some(AppAction::NewChat)));
        assert!(matches!(map_key(ctrl(KeyCode::Char('d'))), Some(AppAction::ToggleTheme)));
        assert!(matches!(
            map_key(ctrl(KeyCode::Left)),
            Some(AppAction::ResizeSidebar { steps: 1 })
        ));
        assert!(map_key(ctrl(KeyCode::Char('x'))).is_none());
    }

    #[test]
    fn plain_keys_edit_and_send() {
        assert!(matches!(map_key(plain(KeyCode::Char('a'))), Some(AppAction::InsertChar('a'))));
        assert!(matches!(
            map_key(KeyEvent::new(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(AppAction::InsertChar('A'))
        ));
        assert!(matches!(map_key(plain(KeyCode::Enter)), Some(AppAction::Send)));
        assert!(matches!(map_key(plain(KeyCode::Esc)), Some(AppAction::ClearInput)));
        assert!(map_key(plain(KeyCode::F(5))).is_none());
    }
}
