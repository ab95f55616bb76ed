use crate::player::timer::{Countdown, CountdownEvent};
use crate::provider::AdCreative;

pub const AUTO_PLAY_SECONDS: u32 = 5;
pub const DEFAULT_AD_SKIP_SECONDS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoPlayEvent {
    Idle,
    CountingDown(u32),
    Advance,
}

/// Five-second countdown to the next episode once the current one ends.
/// Cancelled by any explicit navigation; never armed on the last episode.
#[derive(Debug, Default)]
pub struct AutoPlaySequencer {
    countdown: Countdown,
}

impl AutoPlaySequencer {
    pub fn on_ended(&mut self, has_next: bool, now_ms: u64) {
        if has_next {
            self.countdown.start(AUTO_PLAY_SECONDS, now_ms);
        }
    }

    pub fn cancel(&mut self) {
        self.countdown.cancel();
    }

    pub fn pending(&self) -> bool {
        self.countdown.is_running()
    }

    pub fn remaining(&self) -> u32 {
        self.countdown.remaining()
    }

    pub fn poll(&mut self, now_ms: u64) -> AutoPlayEvent {
        match self.countdown.poll(now_ms) {
            CountdownEvent::Idle if self.countdown.is_running() => {
                AutoPlayEvent::CountingDown(self.countdown.remaining())
            }
            CountdownEvent::Idle => AutoPlayEvent::Idle,
            CountdownEvent::Tick(remaining) => AutoPlayEvent::CountingDown(remaining),
            CountdownEvent::Finished => AutoPlayEvent::Advance,
        }
    }
}

/// Per-creative skip rules: unskippable ads never unlock, skippable ones
/// unlock after the creative's own delay.
#[derive(Debug)]
pub struct AdSkipGate {
    skippable: bool,
    countdown: Countdown,
    unlocked: bool,
}

impl AdSkipGate {
    pub fn new(ad: &AdCreative, now_ms: u64) -> Self {
        let mut countdown = Countdown::default();
        let mut unlocked = false;
        if ad.skippable {
            if ad.skip_after_seconds == 0 {
                unlocked = true;
            } else {
                countdown.start(ad.skip_after_seconds, now_ms);
            }
        }
        Self {
            skippable: ad.skippable,
            countdown,
            unlocked,
        }
    }

    pub fn poll(&mut self, now_ms: u64) {
        if self.skippable && self.countdown.poll(now_ms) == CountdownEvent::Finished {
            self.unlocked = true;
        }
    }

    pub fn can_skip(&self) -> bool {
        self.unlocked
    }

    /// Seconds until skip unlocks, `None` for unskippable creatives.
    pub fn unlock_in(&self) -> Option<u32> {
        if !self.skippable {
            return None;
        }
        if self.unlocked {
            Some(0)
        } else {
            Some(self.countdown.remaining())
        }
    }
}
