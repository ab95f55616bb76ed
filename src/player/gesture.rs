pub const DOUBLE_TAP_WINDOW_MS: u64 = 300;
pub const CONTROLS_HIDE_MS: u64 = 4_000;
pub const SEEK_INDICATOR_MS: u64 = 600;
pub const SEEK_STEP_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Back,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Seek(SeekDirection),
    ControlsShown,
    ControlsHidden,
    Ignored,
}

/// Tap and double-tap handling for the playback surface. A single tap toggles
/// the control overlay; a second tap within 300ms in the outer 30% zones
/// seeks 10 seconds and swallows the toggle. Lock mode drops every tap and
/// pins the controls visible.
#[derive(Debug)]
pub struct GestureCoordinator {
    locked: bool,
    controls_visible: bool,
    hide_at: Option<u64>,
    last_tap: Option<(u64, u16)>,
    indicator: Option<(SeekDirection, u64)>,
}

impl GestureCoordinator {
    pub fn new(now_ms: u64) -> Self {
        Self {
            locked: false,
            controls_visible: true,
            hide_at: Some(now_ms + CONTROLS_HIDE_MS),
            last_tap: None,
            indicator: None,
        }
    }

    pub fn tap(&mut self, x: u16, viewport_width: u16, now_ms: u64) -> TapOutcome {
        if self.locked {
            return TapOutcome::Ignored;
        }

        if let Some((at, _)) = self.last_tap {
            if now_ms.saturating_sub(at) <= DOUBLE_TAP_WINDOW_MS {
                self.last_tap = None;
                if let Some(direction) = Self::zone(x, viewport_width) {
                    self.indicator = Some((direction, now_ms + SEEK_INDICATOR_MS));
                    self.wake(now_ms);
                    return TapOutcome::Seek(direction);
                }
                // Double tap in the middle behaves like a single tap.
                return self.toggle_controls(now_ms);
            }
        }

        self.last_tap = Some((now_ms, x));
        self.toggle_controls(now_ms)
    }

    fn toggle_controls(&mut self, now_ms: u64) -> TapOutcome {
        if self.controls_visible {
            self.controls_visible = false;
            self.hide_at = None;
            TapOutcome::ControlsHidden
        } else {
            self.controls_visible = true;
            self.hide_at = Some(now_ms + CONTROLS_HIDE_MS);
            TapOutcome::ControlsShown
        }
    }

    fn zone(x: u16, viewport_width: u16) -> Option<SeekDirection> {
        if viewport_width == 0 {
            return None;
        }
        let width = f64::from(viewport_width);
        let pos = f64::from(x);
        if pos < width * 0.3 {
            Some(SeekDirection::Back)
        } else if pos > width * 0.7 {
            Some(SeekDirection::Forward)
        } else {
            None
        }
    }

    /// Expire the auto-hide deadline and the seek indicator.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some((_, until)) = self.indicator {
            if now_ms >= until {
                self.indicator = None;
            }
        }
        if let Some((at, _)) = self.last_tap {
            if now_ms.saturating_sub(at) > DOUBLE_TAP_WINDOW_MS {
                self.last_tap = None;
            }
        }
        if self.locked {
            return;
        }
        if let Some(hide_at) = self.hide_at {
            if now_ms >= hide_at {
                self.controls_visible = false;
                self.hide_at = None;
            }
        }
    }

    /// Any non-tap interaction keeps the controls up and restarts auto-hide.
    pub fn wake(&mut self, now_ms: u64) {
        self.controls_visible = true;
        if !self.locked {
            self.hide_at = Some(now_ms + CONTROLS_HIDE_MS);
        }
    }

    pub fn set_locked(&mut self, locked: bool, now_ms: u64) {
        self.locked = locked;
        if locked {
            // Controls stay pinned while locked.
            self.controls_visible = true;
            self.hide_at = None;
        } else {
            self.wake(now_ms);
        }
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    pub fn seek_indicator(&self) -> Option<SeekDirection> {
        self.indicator.map(|(direction, _)| direction)
    }
}
