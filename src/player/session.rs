/// Mutable playback state shared by the engine and the overlay renderer.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub source_url: String,
    pub title_label: String,
    pub start_offset: f64,
    pub current_time: f64,
    pub duration: f64,
    pub playing: bool,
    pub muted: bool,
}

impl PlaybackSession {
    pub fn new(source_url: String, title_label: String, start_offset: f64) -> Self {
        Self {
            source_url,
            title_label,
            start_offset,
            current_time: start_offset,
            duration: 0.0,
            playing: true,
            muted: false,
        }
    }

    pub fn progress_ratio(&self) -> f64 {
        if self.duration <= 0.0 {
            0.0
        } else {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        }
    }
}

pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_clock_handles_hours_and_negatives() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(-3.0), "0:00");
        assert_eq!(format_clock(75.4), "1:15");
        assert_eq!(format_clock(3_725.0), "1:02:05");
    }

    #[test]
    fn progress_ratio_is_clamped_and_safe_without_duration() {
        let mut session = PlaybackSession::new("u".into(), "t".into(), 0.0);
        assert_eq!(session.progress_ratio(), 0.0);

        session.duration = 100.0;
        session.current_time = 150.0;
        assert_eq!(session.progress_ratio(), 1.0);

        session.current_time = 25.0;
        assert_eq!(session.progress_ratio(), 0.25);
    }
}
