use crate::player::session::PlaybackSession;
use crate::player::source::preview_embed_url;
use crate::player::timer::Deadline;

pub const LOAD_WATCHDOG_MS: u64 = 15_000;

/// Raw events surfaced by a media backend.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Loaded,
    TimeUpdate(f64),
    DurationChange(f64),
    PauseState(bool),
    Ended,
    Error(String),
}

pub trait MediaBackend {
    fn poll_events(&mut self) -> Vec<MediaEvent>;
    fn seek_to(&mut self, position: f64);
    fn seek_by(&mut self, delta: f64);
    fn toggle_pause(&mut self);
    fn set_muted(&mut self, muted: bool);
    fn toggle_pin(&mut self);
    fn shutdown(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerMode {
    Native,
    Embedded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Loaded,
    Position(f64),
    Duration(f64),
    PauseChanged(bool),
    Ended,
    /// Native playback failed; the session continues in the browser at the
    /// given preview URL. Happens at most once per session.
    SwitchedToEmbedded { preview_url: String },
    Failed(String),
}

/// Drives a media backend, folding its events into the session and demoting
/// native playback to the embedded viewer on the first unrecoverable error.
/// A load watchdog treats a source that produces nothing for fifteen seconds
/// as failed.
pub struct PlaybackEngine {
    backend: Option<Box<dyn MediaBackend>>,
    pub session: PlaybackSession,
    mode: PlayerMode,
    fallback_used: bool,
    loading: bool,
    watchdog: Deadline,
}

impl PlaybackEngine {
    pub fn new(backend: Box<dyn MediaBackend>, session: PlaybackSession, now_ms: u64) -> Self {
        let mut watchdog = Deadline::default();
        watchdog.arm(now_ms + LOAD_WATCHDOG_MS);
        Self {
            backend: Some(backend),
            session,
            mode: PlayerMode::Native,
            fallback_used: false,
            loading: true,
            watchdog,
        }
    }

    pub fn mode(&self) -> PlayerMode {
        self.mode
    }

    pub fn poll(&mut self, now_ms: u64) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        if self.mode == PlayerMode::Embedded {
            return out;
        }

        let media_events = match self.backend.as_mut() {
            Some(backend) => backend.poll_events(),
            None => Vec::new(),
        };

        for event in media_events {
            match event {
                MediaEvent::Loaded => self.mark_loaded(&mut out),
                MediaEvent::TimeUpdate(position) => {
                    // The first position report doubles as the load signal.
                    self.mark_loaded(&mut out);
                    self.session.current_time = position;
                    out.push(EngineEvent::Position(position));
                }
                MediaEvent::DurationChange(duration) => {
                    self.session.duration = duration;
                    out.push(EngineEvent::Duration(duration));
                }
                MediaEvent::PauseState(paused) => {
                    self.session.playing = !paused;
                    out.push(EngineEvent::PauseChanged(paused));
                }
                MediaEvent::Ended => out.push(EngineEvent::Ended),
                MediaEvent::Error(message) => {
                    self.fail(message, &mut out);
                    return out;
                }
            }
        }

        if self.loading && self.watchdog.fire(now_ms) {
            self.fail("media load timed out".to_string(), &mut out);
        }
        out
    }

    fn mark_loaded(&mut self, out: &mut Vec<EngineEvent>) {
        if self.loading {
            self.loading = false;
            self.watchdog.cancel();
            out.push(EngineEvent::Loaded);
        }
    }

    fn fail(&mut self, message: String, out: &mut Vec<EngineEvent>) {
        if let Some(mut backend) = self.backend.take() {
            backend.shutdown();
        }
        self.loading = false;
        self.watchdog.cancel();

        if self.fallback_used {
            out.push(EngineEvent::Failed(message));
            return;
        }
        self.fallback_used = true;
        self.mode = PlayerMode::Embedded;
        out.push(EngineEvent::SwitchedToEmbedded {
            preview_url: preview_embed_url(&self.session.source_url),
        });
    }

    pub fn seek_to(&mut self, position: f64) {
        self.session.current_time = position.max(0.0);
        if let Some(backend) = self.backend.as_mut() {
            backend.seek_to(self.session.current_time);
        }
    }

    pub fn seek_by(&mut self, delta: f64) {
        self.session.current_time = (self.session.current_time + delta).max(0.0);
        if let Some(backend) = self.backend.as_mut() {
            backend.seek_by(delta);
        }
    }

    pub fn toggle_pause(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.toggle_pause();
        }
    }

    pub fn toggle_mute(&mut self) {
        self.session.muted = !self.session.muted;
        if let Some(backend) = self.backend.as_mut() {
            backend.set_muted(self.session.muted);
        }
    }

    /// Keep the player window on top ("picture in picture").
    pub fn toggle_pin(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.toggle_pin();
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.shutdown();
        }
    }
}

#[cfg(unix)]
pub use mpv::MpvBackend;

#[cfg(unix)]
mod mpv {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;
    use std::path::PathBuf;
    use std::process::{Child, Command as ProcessCommand, Stdio};
    use std::thread;
    use std::time::Duration;

    use anyhow::{Context, Result, anyhow};
    use serde_json::Value;

    use super::{MediaBackend, MediaEvent};

    const TIME_POS_ID: u64 = 1;
    const DURATION_ID: u64 = 2;
    const PAUSE_ID: u64 = 3;

    /// External mpv process controlled over its JSON IPC socket.
    pub struct MpvBackend {
        child: Child,
        socket: UnixStream,
        socket_path: PathBuf,
        read_buffer: Vec<u8>,
        closed: bool,
    }

    impl MpvBackend {
        pub fn spawn(url: &str, start_offset: f64) -> Result<Self> {
            let socket_path = std::env::temp_dir().join(format!(
                "aniryx-mpv-{}-{}.sock",
                std::process::id(),
                crate::player::timer::unix_now_ms()
            ));

            let child = ProcessCommand::new("mpv")
                .arg(format!("--input-ipc-server={}", socket_path.display()))
                .arg("--no-terminal")
                .arg("--force-window=yes")
                .arg("--really-quiet")
                .arg(format!("--start={}", start_offset.max(0.0) as u64))
                .arg(url)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .context("failed to launch mpv (is it installed?)")?;

            let socket = Self::connect(&socket_path)?;
            socket
                .set_nonblocking(true)
                .context("failed to make mpv socket non-blocking")?;

            let mut backend = Self {
                child,
                socket,
                socket_path,
                read_buffer: Vec::new(),
                closed: false,
            };
            backend.send(&serde_json::json!({
                "command": ["observe_property", TIME_POS_ID, "time-pos"]
            }));
            backend.send(&serde_json::json!({
                "command": ["observe_property", DURATION_ID, "duration"]
            }));
            backend.send(&serde_json::json!({
                "command": ["observe_property", PAUSE_ID, "pause"]
            }));
            Ok(backend)
        }

        fn connect(socket_path: &PathBuf) -> Result<UnixStream> {
            // mpv creates the socket shortly after launch.
            for _ in 0..50 {
                if let Ok(stream) = UnixStream::connect(socket_path) {
                    return Ok(stream);
                }
                thread::sleep(Duration::from_millis(100));
            }
            Err(anyhow!(
                "mpv IPC socket never appeared at {}",
                socket_path.display()
            ))
        }

        fn send(&mut self, command: &Value) {
            // A dead pipe shows up as an end-file/EOF on the read side.
            let _ = writeln!(self.socket, "{command}");
        }

        fn read_available(&mut self) {
            let mut buf = [0_u8; 4096];
            loop {
                match self.socket.read(&mut buf) {
                    Ok(0) => {
                        self.closed = true;
                        break;
                    }
                    Ok(read) => self.read_buffer.extend_from_slice(&buf[..read]),
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(_) => {
                        self.closed = true;
                        break;
                    }
                }
            }
        }

        fn drain_lines(&mut self) -> Vec<Value> {
            let mut out = Vec::new();
            while let Some(pos) = self.read_buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.read_buffer.drain(..=pos).collect();
                if let Ok(value) = serde_json::from_slice::<Value>(&line) {
                    out.push(value);
                }
            }
            out
        }

        fn translate(value: &Value) -> Option<MediaEvent> {
            match value.get("event").and_then(Value::as_str)? {
                "file-loaded" => Some(MediaEvent::Loaded),
                "property-change" => {
                    let id = value.get("id").and_then(Value::as_u64)?;
                    let data = value.get("data")?;
                    match id {
                        TIME_POS_ID => data.as_f64().map(MediaEvent::TimeUpdate),
                        DURATION_ID => data.as_f64().map(MediaEvent::DurationChange),
                        PAUSE_ID => data.as_bool().map(MediaEvent::PauseState),
                        _ => None,
                    }
                }
                "end-file" => {
                    let reason = value.get("reason").and_then(Value::as_str).unwrap_or("");
                    if reason == "eof" {
                        Some(MediaEvent::Ended)
                    } else if reason == "error" {
                        let detail = value
                            .get("file_error")
                            .and_then(Value::as_str)
                            .unwrap_or("playback failed");
                        Some(MediaEvent::Error(detail.to_string()))
                    } else {
                        // quit/stop come from our own shutdown path.
                        None
                    }
                }
                _ => None,
            }
        }
    }

    impl MediaBackend for MpvBackend {
        fn poll_events(&mut self) -> Vec<MediaEvent> {
            if self.closed {
                return Vec::new();
            }
            self.read_available();
            let mut events: Vec<MediaEvent> = self
                .drain_lines()
                .iter()
                .filter_map(Self::translate)
                .collect();
            if self.closed && events.is_empty() {
                events.push(MediaEvent::Error("player exited unexpectedly".to_string()));
            }
            events
        }

        fn seek_to(&mut self, position: f64) {
            self.send(&serde_json::json!({ "command": ["seek", position, "absolute"] }));
        }

        fn seek_by(&mut self, delta: f64) {
            self.send(&serde_json::json!({ "command": ["seek", delta, "relative"] }));
        }

        fn toggle_pause(&mut self) {
            self.send(&serde_json::json!({ "command": ["cycle", "pause"] }));
        }

        fn set_muted(&mut self, muted: bool) {
            self.send(&serde_json::json!({ "command": ["set_property", "mute", muted] }));
        }

        fn toggle_pin(&mut self) {
            self.send(&serde_json::json!({ "command": ["cycle", "ontop"] }));
        }

        fn shutdown(&mut self) {
            self.send(&serde_json::json!({ "command": ["quit"] }));
            let _ = crate::shell::with_sigint_ignored(|| {
                let _ = self.child.wait();
                Ok(())
            });
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeBackend;
    use super::*;

    fn session() -> PlaybackSession {
        PlaybackSession::new(
            "https://drive.google.com/file/d/media1/view".to_string(),
            "Show - Episode 1".to_string(),
            0.0,
        )
    }

    #[test]
    fn load_cancels_the_watchdog() {
        let backend = FakeBackend::scripted(vec![
            vec![MediaEvent::Loaded, MediaEvent::DurationChange(1_400.0)],
            vec![MediaEvent::TimeUpdate(0.5)],
        ]);
        let mut engine = PlaybackEngine::new(Box::new(backend), session(), 0);

        let events = engine.poll(100);
        assert!(events.contains(&EngineEvent::Loaded));
        assert_eq!(engine.session.duration, 1_400.0);

        // Well past the watchdog deadline, still native.
        let events = engine.poll(LOAD_WATCHDOG_MS + 1_000);
        assert_eq!(events, vec![EngineEvent::Position(0.5)]);
        assert_eq!(engine.mode(), PlayerMode::Native);
    }

    #[test]
    fn watchdog_timeout_switches_to_embedded() {
        let backend = FakeBackend::scripted(vec![]);
        let mut engine = PlaybackEngine::new(Box::new(backend), session(), 0);

        assert!(engine.poll(LOAD_WATCHDOG_MS - 1).is_empty());
        let events = engine.poll(LOAD_WATCHDOG_MS);
        assert_eq!(
            events,
            vec![EngineEvent::SwitchedToEmbedded {
                preview_url: "https://drive.google.com/file/d/media1/preview".to_string()
            }]
        );
        assert_eq!(engine.mode(), PlayerMode::Embedded);
    }

    #[test]
    fn backend_error_switches_to_embedded_once() {
        let backend = FakeBackend::scripted(vec![vec![MediaEvent::Error("codec".to_string())]]);
        let mut engine = PlaybackEngine::new(Box::new(backend), session(), 0);

        let events = engine.poll(100);
        assert!(matches!(
            events.as_slice(),
            [EngineEvent::SwitchedToEmbedded { .. }]
        ));

        // Embedded mode polls nothing and never re-enters native.
        assert!(engine.poll(200).is_empty());
        assert_eq!(engine.mode(), PlayerMode::Embedded);
    }

    #[test]
    fn events_after_the_error_in_the_same_batch_are_dropped() {
        let backend = FakeBackend::scripted(vec![vec![
            MediaEvent::Error("broken".to_string()),
            MediaEvent::TimeUpdate(9.0),
        ]]);
        let mut engine = PlaybackEngine::new(Box::new(backend), session(), 0);
        let events = engine.poll(100);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn position_and_pause_updates_flow_into_the_session() {
        let backend = FakeBackend::scripted(vec![vec![
            MediaEvent::TimeUpdate(12.0),
            MediaEvent::PauseState(true),
        ]]);
        let mut engine = PlaybackEngine::new(Box::new(backend), session(), 0);

        let events = engine.poll(100);
        assert!(events.contains(&EngineEvent::Loaded));
        assert!(events.contains(&EngineEvent::Position(12.0)));
        assert!(events.contains(&EngineEvent::PauseChanged(true)));
        assert_eq!(engine.session.current_time, 12.0);
        assert!(!engine.session.playing);
    }

    #[test]
    fn seeks_clamp_at_zero() {
        let backend = FakeBackend::scripted(vec![]);
        let mut engine = PlaybackEngine::new(Box::new(backend), session(), 0);
        engine.session.current_time = 3.0;
        engine.seek_by(-10.0);
        assert_eq!(engine.session.current_time, 0.0);
    }
}
