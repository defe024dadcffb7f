//! Audible feedback through the terminal bell.

use std::io::{self, Write};
use std::time::{Duration, Instant};

const BELL: &[u8] = b"\x07";
const DEFAULT_MIN_GAP: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
pub struct SoundEffect {
    enabled: bool,
    min_gap: Duration,
    last_played: Option<Instant>,
}

impl SoundEffect {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            min_gap: DEFAULT_MIN_GAP,
            last_played: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn play<W: Write>(&mut self, out: &mut W) -> io::Result<bool> {
        self.play_at(Instant::now(), out)
    }

    /// Ring the bell unless disabled or the previous ring is too recent.
    /// Returns whether anything was written.
    pub fn play_at<W: Write>(&mut self, now: Instant, out: &mut W) -> io::Result<bool> {
        if !self.enabled {
            return Ok(false);
        }
        if let Some(last) = self.last_played {
            if now.saturating_duration_since(last) < self.min_gap {
                return Ok(false);
            }
        }
        out.write_all(BELL)?;
        out.flush()?;
        self.last_played = Some(now);
        Ok(true)
    }
}
