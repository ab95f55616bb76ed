pub(crate) mod engine;
pub(crate) mod gate;
pub(crate) mod gesture;
pub(crate) mod progress;
pub(crate) mod sequencer;
pub(crate) mod session;
pub(crate) mod source;
pub(crate) mod skip;
pub(crate) mod timer;
mod ui;


use std::io;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::db::Database;
use crate::player::engine::{EngineEvent, MediaBackend, MediaEvent, PlaybackEngine};
use crate::player::gate::{AdGate, PlayDecision};
use crate::player::gesture::{GestureCoordinator, SEEK_STEP_SECONDS, SeekDirection, TapOutcome};
use crate::player::progress::ProgressReporter;
use crate::player::sequencer::{AdSkipGate, AutoPlayEvent, AutoPlaySequencer};
use crate::player::session::{PlaybackSession, format_clock};
use crate::player::source::{direct_stream_url, preview_embed_url};
use crate::player::skip::SkipDetector;
use crate::player::timer::{Deadline, unix_now_ms};
use crate::provider::{AdCreative, ProviderClient, Title, Viewer};
use crate::shell::open_in_browser;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

struct PlayerScreen {
    active: bool,
}

impl PlayerScreen {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)
            .context("failed to enter alternate screen")?;
        Ok(Self { active: true })
    }

    fn leave(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen)
            .context("failed to leave alternate screen")?;
        self.active = false;
        Ok(())
    }
}

impl Drop for PlayerScreen {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        }
    }
}

enum EpisodeOutcome {
    Quit,
    Advance(usize),
}

/// Full playback flow for one title: entitlement check, optional pre-roll
/// ad, then episodes until the viewer quits or the series runs out.
pub(crate) fn run_player(
    db: &Database,
    provider: &ProviderClient,
    title: &Title,
    viewer: Option<&Viewer>,
    requested_episode: Option<usize>,
) -> Result<()> {
    // Ad delivery problems never block playback.
    let candidates = provider.fetch_active_ads().unwrap_or_default();

    let mut gate = AdGate::new();
    let decision = gate.request_play(
        viewer,
        title.premium,
        requested_episode,
        &candidates,
        db,
        unix_now_ms(),
    );

    let mut screen = PlayerScreen::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let first_episode = match decision {
        PlayDecision::AccessDenied => {
            screen.leave()?;
            bail!("'{}' requires a paid subscription", title.title);
        }
        PlayDecision::AdInProgress => {
            screen.leave()?;
            bail!("another playback request is already in progress");
        }
        PlayDecision::Proceed { episode_index } => episode_index,
        PlayDecision::ShowAd { ad } => {
            run_ad_phase(&mut terminal, provider, &ad)?;
            gate.complete_ad(db, unix_now_ms())
                .ok_or_else(|| anyhow!("ad completed without a pending episode"))?
        }
    };

    let mut episode = first_episode;
    loop {
        match play_episode(&mut terminal, db, title, episode)? {
            EpisodeOutcome::Quit => break,
            EpisodeOutcome::Advance(next) => episode = next,
        }
    }

    terminal.show_cursor()?;
    screen.leave()?;
    Ok(())
}

fn spawn_backend(url: &str, start_offset: f64) -> Result<Box<dyn MediaBackend>> {
    #[cfg(unix)]
    {
        Ok(Box::new(engine::MpvBackend::spawn(url, start_offset)?))
    }
    #[cfg(not(unix))]
    {
        let _ = (url, start_offset);
        Err(anyhow!("native playback is not supported on this platform"))
    }
}

/// Pre-roll creative. Playback errors and timeouts count as completion, so a
/// broken campaign can never keep a viewer away from content.
fn run_ad_phase(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    provider: &ProviderClient,
    ad: &AdCreative,
) -> Result<()> {
    provider.track_ad_view(&ad.id);

    let Ok(mut backend) = spawn_backend(&ad.video_url, 0.0) else {
        return Ok(());
    };

    let now = unix_now_ms();
    let mut skip_gate = AdSkipGate::new(ad, now);
    let mut watchdog = Deadline::default();
    watchdog.arm(now + engine::LOAD_WATCHDOG_MS);
    let mut position = 0.0_f64;
    let mut loaded = false;

    'ad: loop {
        let now = unix_now_ms();
        skip_gate.poll(now);
        if !loaded && watchdog.fire(now) {
            break;
        }

        for media_event in backend.poll_events() {
            match media_event {
                MediaEvent::Loaded => loaded = true,
                MediaEvent::TimeUpdate(p) => {
                    loaded = true;
                    position = p;
                }
                MediaEvent::Ended | MediaEvent::Error(_) => break 'ad,
                MediaEvent::DurationChange(_) | MediaEvent::PauseState(_) => {}
            }
        }

        let elapsed_label = format_clock(position);
        let view = ui::AdView {
            elapsed_label: &elapsed_label,
            unlock_in: skip_gate.unlock_in(),
            has_link: ad.link_url.is_some(),
        };
        terminal.draw(|frame| ui::draw_ad(frame, &view))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Enter | KeyCode::Char('s') if skip_gate.can_skip() => break,
            KeyCode::Char('o') => {
                if let Some(link) = &ad.link_url {
                    provider.track_ad_click(&ad.id);
                    let _ = open_in_browser(link);
                }
            }
            KeyCode::Char('q') | KeyCode::Esc => break,
            _ => {}
        }
    }

    backend.shutdown();
    Ok(())
}

fn play_episode(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    db: &Database,
    title: &Title,
    episode: usize,
) -> Result<EpisodeOutcome> {
    let source = title
        .episode_source(episode)
        .with_context(|| format!("'{}' has no playable source", title.title))?
        .to_string();
    let has_next = !title.episodes.is_empty() && episode + 1 < title.episodes.len();

    let resume = db.resume_for(&title.id)?;
    let start_offset = ProgressReporter::seed_offset(resume.as_ref(), episode);
    let mut reporter = ProgressReporter::new(episode);

    let session = PlaybackSession::new(
        direct_stream_url(&source),
        title.episode_label(episode),
        start_offset,
    );

    let now = unix_now_ms();
    let mut gesture = GestureCoordinator::new(now);
    let mut skip = SkipDetector::default();
    let mut autoplay = AutoPlaySequencer::default();
    let mut status = String::from("Loading...");
    let mut embedded = false;

    let mut engine = match spawn_backend(&session.source_url, start_offset) {
        Ok(backend) => Some(PlaybackEngine::new(backend, session.clone(), now)),
        Err(err) => {
            // No native player at all: go straight to the embedded viewer.
            open_embedded(db, title, &source, &mut reporter, start_offset, &mut status, &err)?;
            embedded = true;
            None
        }
    };

    terminal.clear()?;

    loop {
        let now = unix_now_ms();
        gesture.tick(now);

        if let Some(engine) = engine.as_mut() {
            for event in engine.poll(now) {
                match event {
                    EngineEvent::Loaded => status = String::from("Playing."),
                    EngineEvent::Position(position) => {
                        skip.on_position(&title.skip, position);
                        if let Some(cp) = reporter.on_position(position, engine.session.duration) {
                            db.upsert_resume(
                                &title.id,
                                cp.episode_index,
                                cp.position_seconds,
                                cp.duration_seconds,
                            )?;
                        }
                    }
                    EngineEvent::Duration(_) | EngineEvent::PauseChanged(_) => {}
                    EngineEvent::Ended => {
                        if has_next {
                            autoplay.on_ended(true, now);
                        } else {
                            engine.shutdown();
                            return Ok(EpisodeOutcome::Quit);
                        }
                    }
                    EngineEvent::SwitchedToEmbedded { preview_url } => {
                        if let Err(err) = open_in_browser(&preview_url) {
                            status = format!("ERROR: {err}");
                        } else {
                            status = String::from("INFO: continuing in your browser.");
                        }
                        if let Some(cp) = reporter.fallback_loaded(start_offset) {
                            db.upsert_resume(
                                &title.id,
                                cp.episode_index,
                                cp.position_seconds,
                                cp.duration_seconds,
                            )?;
                        }
                        embedded = true;
                    }
                    EngineEvent::Failed(message) => {
                        status = format!("ERROR: {message}");
                    }
                }
            }
        }

        match autoplay.poll(now) {
            AutoPlayEvent::Advance => {
                shutdown(engine.as_mut());
                return Ok(EpisodeOutcome::Advance(episode + 1));
            }
            AutoPlayEvent::CountingDown(_) | AutoPlayEvent::Idle => {}
        }

        let fallback_session = session.clone();
        let view_session = engine
            .as_ref()
            .map(|engine| &engine.session)
            .unwrap_or(&fallback_session);
        let view = ui::ContentView {
            session: view_session,
            gesture: &gesture,
            skip_prompt: skip.active() && !embedded,
            autoplay_remaining: autoplay.pending().then(|| autoplay.remaining()),
            embedded,
            status: &status,
        };
        terminal.draw(|frame| ui::draw_content(frame, &view))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }

        match event::read()? {
            Event::Mouse(mouse) => {
                if embedded || !matches!(mouse.kind, MouseEventKind::Down(_)) {
                    continue;
                }
                let width = terminal.size()?.width;
                if let TapOutcome::Seek(direction) = gesture.tap(mouse.column, width, unix_now_ms())
                {
                    if let Some(engine) = engine.as_mut() {
                        let step = match direction {
                            SeekDirection::Back => -SEEK_STEP_SECONDS,
                            SeekDirection::Forward => SEEK_STEP_SECONDS,
                        };
                        engine.seek_by(step);
                    }
                }
            }
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                if autoplay.pending()
                    && !matches!(key.code, KeyCode::Char('n') | KeyCode::Char('q') | KeyCode::Esc)
                {
                    autoplay.cancel();
                    status = String::from("Auto-play canceled.");
                    continue;
                }

                if gesture.locked() {
                    match key.code {
                        KeyCode::Char('l') => gesture.set_locked(false, unix_now_ms()),
                        KeyCode::Char('q') | KeyCode::Esc => {
                            shutdown(engine.as_mut());
                            return Ok(EpisodeOutcome::Quit);
                        }
                        _ => {}
                    }
                    continue;
                }

                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        shutdown(engine.as_mut());
                        return Ok(EpisodeOutcome::Quit);
                    }
                    _ if embedded => {}
                    KeyCode::Char('l') => gesture.set_locked(true, unix_now_ms()),
                    KeyCode::Char(' ') => {
                        if let Some(engine) = engine.as_mut() {
                            engine.toggle_pause();
                        }
                        gesture.wake(unix_now_ms());
                    }
                    KeyCode::Char('m') => {
                        if let Some(engine) = engine.as_mut() {
                            engine.toggle_mute();
                        }
                        gesture.wake(unix_now_ms());
                    }
                    KeyCode::Char('p') => {
                        if let Some(engine) = engine.as_mut() {
                            engine.toggle_pin();
                        }
                        gesture.wake(unix_now_ms());
                    }
                    KeyCode::Left | KeyCode::Right => {
                        if let Some(engine) = engine.as_mut() {
                            let step = if key.code == KeyCode::Left {
                                -SEEK_STEP_SECONDS
                            } else {
                                SEEK_STEP_SECONDS
                            };
                            engine.seek_by(step);
                        }
                        gesture.wake(unix_now_ms());
                    }
                    KeyCode::Enter | KeyCode::Char('s') => {
                        if let Some(target) = skip.consume() {
                            if let Some(engine) = engine.as_mut() {
                                engine.seek_to(target);
                            }
                        }
                        gesture.wake(unix_now_ms());
                    }
                    KeyCode::Char('n') => {
                        if has_next {
                            autoplay.cancel();
                            shutdown(engine.as_mut());
                            return Ok(EpisodeOutcome::Advance(episode + 1));
                        }
                        status = String::from("INFO: no next episode.");
                    }
                    _ => gesture.wake(unix_now_ms()),
                }
            }
            _ => {}
        }
    }
}

fn shutdown(engine: Option<&mut PlaybackEngine>) {
    if let Some(engine) = engine {
        engine.shutdown();
    }
}

fn open_embedded(
    db: &Database,
    title: &Title,
    source: &str,
    reporter: &mut ProgressReporter,
    start_offset: f64,
    status: &mut String,
    cause: &anyhow::Error,
) -> Result<()> {
    let preview_url = preview_embed_url(source);
    match open_in_browser(&preview_url) {
        Ok(()) => *status = format!("INFO: {cause}; continuing in your browser."),
        Err(err) => *status = format!("ERROR: {err}"),
    }
    if let Some(cp) = reporter.fallback_loaded(start_offset) {
        db.upsert_resume(
            &title.id,
            cp.episode_index,
            cp.position_seconds,
            cp.duration_seconds,
        )?;
    }
    Ok(())
}
