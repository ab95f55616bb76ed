use crate::db::ResumePoint;

pub const CHECKPOINT_DELTA_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub episode_index: usize,
    pub position_seconds: f64,
    pub duration_seconds: f64,
}

/// Emits a persistence checkpoint whenever playback has moved at least five
/// seconds from the last persisted position, in either direction. Embedded
/// playback cannot report positions, so it gets a single synthetic checkpoint
/// at load.
#[derive(Debug)]
pub struct ProgressReporter {
    episode_index: usize,
    last_emitted: Option<f64>,
    fallback_emitted: bool,
}

impl ProgressReporter {
    pub fn new(episode_index: usize) -> Self {
        Self {
            episode_index,
            last_emitted: None,
            fallback_emitted: false,
        }
    }

    /// Start offset for this episode: the stored position when the stored
    /// episode matches, otherwise zero.
    pub fn seed_offset(resume: Option<&ResumePoint>, episode_index: usize) -> f64 {
        match resume {
            Some(point) if point.episode_index == episode_index => point.position_seconds,
            _ => 0.0,
        }
    }

    pub fn on_position(&mut self, position: f64, duration: f64) -> Option<Checkpoint> {
        let should_emit = match self.last_emitted {
            None => true,
            Some(last) => (position - last).abs() >= CHECKPOINT_DELTA_SECONDS,
        };
        if !should_emit {
            return None;
        }
        self.last_emitted = Some(position);
        Some(Checkpoint {
            episode_index: self.episode_index,
            position_seconds: position,
            duration_seconds: duration,
        })
    }

    /// One-off checkpoint when the embedded viewer opens. Records at least
    /// one second so a resumed session is distinguishable from never-watched.
    pub fn fallback_loaded(&mut self, start_offset: f64) -> Option<Checkpoint> {
        if self.fallback_emitted {
            return None;
        }
        self.fallback_emitted = true;
        Some(Checkpoint {
            episode_index: self.episode_index,
            position_seconds: start_offset.max(1.0),
            duration_seconds: 0.0,
        })
    }
}
