use crate::provider::SkipWindows;

impl SkipWindows {
    /// The seek target when the position sits inside a configured window.
    /// A window is configured only when its end is positive; membership is
    /// half-open, so landing exactly on the end hides the prompt. Intro wins
    /// when windows overlap.
    pub fn target_at(&self, position: f64) -> Option<f64> {
        if self.intro_end > 0.0 && position >= self.intro_start && position < self.intro_end {
            return Some(self.intro_end);
        }
        if self.outro_end > 0.0 && position >= self.outro_start && position < self.outro_end {
            return Some(self.outro_end);
        }
        None
    }
}

/// Tracks whether the skip prompt is showing. Declining a skip (by letting
/// playback continue without pressing it) does not re-arm until the window is
/// left and re-entered.
#[derive(Debug, Default)]
pub struct SkipDetector {
    active_target: Option<f64>,
    suppressed: bool,
}

impl SkipDetector {
    pub fn on_position(&mut self, windows: &SkipWindows, position: f64) {
        match windows.target_at(position) {
            Some(target) => {
                if !self.suppressed {
                    self.active_target = Some(target);
                }
            }
            None => {
                self.active_target = None;
                self.suppressed = false;
            }
        }
    }

    pub fn active(&self) -> bool {
        self.active_target.is_some()
    }

    /// Accept the prompt: returns the seek target and hides the prompt for
    /// the rest of this window.
    pub fn consume(&mut self) -> Option<f64> {
        let target = self.active_target.take()?;
        self.suppressed = true;
        Some(target)
    }
}
