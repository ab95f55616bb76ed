use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch, the clock unit used by every playback
/// state machine so tests can drive time explicitly.
pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Idle,
    Tick(u32),
    Finished,
}

/// Second-granularity countdown polled from the event loop. Emits one `Tick`
/// per remaining second and `Finished` exactly once, then goes idle. Late
/// polls catch up by skipping intermediate ticks.
#[derive(Debug, Default)]
pub struct Countdown {
    remaining: u32,
    next_tick_at: u64,
    running: bool,
}

impl Countdown {
    pub fn start(&mut self, seconds: u32, now_ms: u64) {
        self.remaining = seconds;
        self.next_tick_at = now_ms + 1_000;
        self.running = seconds > 0;
    }

    pub fn cancel(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining(&self) -> u32 {
        if self.running { self.remaining } else { 0 }
    }

    pub fn poll(&mut self, now_ms: u64) -> CountdownEvent {
        if !self.running {
            return CountdownEvent::Idle;
        }
        if now_ms < self.next_tick_at {
            return CountdownEvent::Idle;
        }

        let elapsed_ticks = 1 + ((now_ms - self.next_tick_at) / 1_000) as u32;
        if elapsed_ticks >= self.remaining {
            self.running = false;
            self.remaining = 0;
            return CountdownEvent::Finished;
        }

        self.remaining -= elapsed_ticks;
        self.next_tick_at += u64::from(elapsed_ticks) * 1_000;
        CountdownEvent::Tick(self.remaining)
    }
}

/// Single-shot deadline. `fire` returns true at most once per arm.
#[derive(Debug, Default)]
pub struct Deadline {
    at: Option<u64>,
}

impl Deadline {
    pub fn arm(&mut self, at_ms: u64) {
        self.at = Some(at_ms);
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.at.is_some()
    }

    pub fn fire(&mut self, now_ms: u64) -> bool {
        match self.at {
            Some(at) if now_ms >= at => {
                self.at = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_ticks_each_second_then_finishes_once() {
        let mut countdown = Countdown::default();
        countdown.start(3, 0);

        assert_eq!(countdown.poll(500), CountdownEvent::Idle);
        assert_eq!(countdown.poll(1_000), CountdownEvent::Tick(2));
        assert_eq!(countdown.poll(1_200), CountdownEvent::Idle);
        assert_eq!(countdown.poll(2_000), CountdownEvent::Tick(1));
        assert_eq!(countdown.poll(3_050), CountdownEvent::Finished);
        assert_eq!(countdown.poll(4_000), CountdownEvent::Idle);
    }

    #[test]
    fn countdown_catches_up_after_a_late_poll() {
        let mut countdown = Countdown::default();
        countdown.start(5, 0);

        // Three seconds elapsed in one poll: skip straight to 2 remaining.
        assert_eq!(countdown.poll(3_100), CountdownEvent::Tick(2));
        assert_eq!(countdown.poll(4_100), CountdownEvent::Tick(1));
        assert_eq!(countdown.poll(5_100), CountdownEvent::Finished);
    }

    #[test]
    fn countdown_cancel_suppresses_finish() {
        let mut countdown = Countdown::default();
        countdown.start(2, 0);
        countdown.cancel();
        assert_eq!(countdown.poll(10_000), CountdownEvent::Idle);
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn zero_second_countdown_never_runs() {
        let mut countdown = Countdown::default();
        countdown.start(0, 0);
        assert!(!countdown.is_running());
        assert_eq!(countdown.poll(5_000), CountdownEvent::Idle);
    }

    #[test]
    fn deadline_fires_once_and_can_be_cancelled() {
        let mut deadline = Deadline::default();
        deadline.arm(1_000);
        assert!(!deadline.fire(999));
        assert!(deadline.fire(1_000));
        assert!(!deadline.fire(2_000));

        deadline.arm(3_000);
        deadline.cancel();
        assert!(!deadline.fire(5_000));
    }
}
