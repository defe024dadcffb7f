//! Two-pane split between the content area and the chat sidebar.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub const DEFAULT_CHAT_PERCENT: u16 = 20;
pub const MIN_CHAT_PERCENT: u16 = 20;
pub const MAX_CHAT_PERCENT: u16 = 60;
pub const COLLAPSED_CHAT_PERCENT: u16 = 3;
pub const RESIZE_STEP: u16 = 5;

/// A collapsed sidebar never gets narrower than this, so its icon stays visible.
const COLLAPSED_MIN_COLUMNS: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelLayout {
    chat_percent: u16,
    collapsed: bool,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_PERCENT)
    }
}

impl PanelLayout {
    pub fn new(chat_percent: u16) -> Self {
        Self {
            chat_percent: chat_percent.clamp(MIN_CHAT_PERCENT, MAX_CHAT_PERCENT),
            collapsed: false,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Sidebar width currently in effect.
    pub fn chat_percent(&self) -> u16 {
        if self.collapsed {
            COLLAPSED_CHAT_PERCENT
        } else {
            self.chat_percent
        }
    }

    /// Resize the sidebar. Sizes below the minimum collapse it, sizes above
    /// the maximum are clamped.
    pub fn resize(&mut self, percent: u16) {
        if percent < MIN_CHAT_PERCENT {
            self.collapsed = true;
        } else {
            self.collapsed = false;
            self.chat_percent = percent.min(MAX_CHAT_PERCENT);
        }
    }

    /// Grow (positive) or shrink (negative) the sidebar by whole steps.
    pub fn nudge(&mut self, steps: i16) {
        let delta = RESIZE_STEP.saturating_mul(steps.unsigned_abs());
        let target = if self.collapsed {
            if steps > 0 {
                MIN_CHAT_PERCENT
            } else {
                return;
            }
        } else if steps >= 0 {
            self.chat_percent.saturating_add(delta)
        } else {
            self.chat_percent.saturating_sub(delta)
        };
        self.resize(target);
    }

    /// Collapse or expand. Expanding restores the default width.
    pub fn toggle_collapsed(&mut self) -> bool {
        if self.collapsed {
            self.resize(DEFAULT_CHAT_PERCENT);
        } else {
            self.collapsed = true;
        }
        self.collapsed
    }

    /// Split `area` into `(content, chat)` rectangles.
    pub fn split(&self, area: Rect) -> (Rect, Rect) {
        let proportional = (u32::from(area.width) * u32::from(self.chat_percent()) / 100) as u16;
        let chat_columns = proportional.max(COLLAPSED_MIN_COLUMNS).min(area.width);
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(chat_columns)])
            .split(area);
        (chunks[0], chunks[1])
    }
}
