use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Frame;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState, Wrap,
};
use ratatui::Terminal;

use crate::db::Database;
use crate::player::run_player;
use crate::provider::{ProviderClient, Title, Viewer};
use crate::shell::{copy_to_clipboard, open_in_browser, share_url};

use super::{truncate, visible_titles};

struct TuiSession {
    active: bool,
}

impl TuiSession {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(io::stdout(), EnterAlternateScreen).context("failed to enter alternate screen")?;
        Ok(Self { active: true })
    }

    fn suspend(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(io::stdout(), LeaveAlternateScreen).context("failed to leave alternate screen")?;
        self.active = false;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        execute!(io::stdout(), EnterAlternateScreen)
            .context("failed to re-enter alternate screen")?;
        enable_raw_mode().context("failed to re-enable raw mode")?;
        self.active = true;
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        self.suspend()
    }
}

impl Drop for TuiSession {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}

struct CatalogFetchResult {
    titles: Result<Vec<Title>, String>,
    viewer: Option<Viewer>,
}

fn spawn_catalog_fetch(db: &Database) -> mpsc::Receiver<CatalogFetchResult> {
    let (tx, rx) = mpsc::channel::<CatalogFetchResult>();
    let client = ProviderClient::new(db);
    thread::spawn(move || {
        let viewer = client.fetch_viewer().ok().flatten();
        let titles = client.fetch_catalog().map_err(|err| err.to_string());
        let _ = tx.send(CatalogFetchResult { titles, viewer });
    });
    rx
}

pub(crate) fn run_tui(db: &Database) -> Result<()> {
    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let provider = ProviderClient::new(db);
    let mut fetch_rx = spawn_catalog_fetch(db);
    let mut titles: Vec<Title> = Vec::new();
    let mut viewer: Option<Viewer> = None;
    let mut loading = true;
    let mut table_state = TableState::default();
    let mut status = status_info("Loading catalog...");

    loop {
        if loading {
            if let Ok(result) = fetch_rx.try_recv() {
                loading = false;
                viewer = result.viewer;
                match result.titles {
                    Ok(catalog) => {
                        titles = visible_titles(catalog, viewer.as_ref());
                        table_state.select((!titles.is_empty()).then_some(0));
                        status = if titles.is_empty() {
                            status_info("The catalog is empty.")
                        } else {
                            status_info("Ready.")
                        };
                    }
                    Err(err) => status = status_error(&format!("Catalog fetch failed: {err}")),
                }
            }
        }

        let favorites: Vec<bool> = titles
            .iter()
            .map(|title| db.is_favorite(&title.id).unwrap_or(false))
            .collect();
        terminal.draw(|frame| {
            draw_library(
                frame,
                &titles,
                &favorites,
                &mut table_state,
                viewer.as_ref(),
                loading,
                &status,
                db,
            )
        })?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Up => {
                if let Some(selected) = table_state.selected() {
                    table_state.select(Some(selected.saturating_sub(1)));
                }
            }
            KeyCode::Down => {
                if let Some(selected) = table_state.selected()
                    && !titles.is_empty()
                {
                    let next = (selected + 1).min(titles.len().saturating_sub(1));
                    table_state.select(Some(next));
                }
            }
            KeyCode::Char('r') => {
                fetch_rx = spawn_catalog_fetch(db);
                loading = true;
                status = status_info("Refreshing catalog...");
            }
            KeyCode::Char('f') => {
                let Some(title) = selected_title(&titles, &table_state) else {
                    continue;
                };
                let now_favorite = !db.is_favorite(&title.id).unwrap_or(false);
                match db.set_favorite(&title.id, now_favorite) {
                    Ok(()) if now_favorite => {
                        status = status_info(&format!("Added to favorites: {}", title.title));
                    }
                    Ok(()) => {
                        status = status_info(&format!("Removed from favorites: {}", title.title));
                    }
                    Err(err) => status = status_error(&format!("Favorite update failed: {err}")),
                }
            }
            KeyCode::Char('y') => {
                let Some(title) = selected_title(&titles, &table_state) else {
                    continue;
                };
                let url = share_url(&title.id);
                if copy_to_clipboard(&url) {
                    status = status_info("Share link copied to clipboard.");
                } else {
                    status = status_info(&format!("Share link: {url}"));
                }
            }
            KeyCode::Char('d') => {
                let Some(title) = selected_title(&titles, &table_state) else {
                    continue;
                };
                match &title.download_url {
                    Some(url) => match open_in_browser(url) {
                        Ok(()) => status = status_info("Download opened in your browser."),
                        Err(err) => status = status_error(&format!("Download failed: {err}")),
                    },
                    None => status = status_info("No download available for this title."),
                }
            }
            KeyCode::Enter => {
                let Some(title) = selected_title(&titles, &table_state).cloned() else {
                    continue;
                };

                session.suspend()?;
                let result = run_player(db, &provider, &title, viewer.as_ref(), None);
                session.resume()?;
                terminal.clear()?;

                match result {
                    Ok(()) => status = status_info(&format!("Finished playing {}.", title.title)),
                    Err(err) => {
                        status = status_error(&format!("Playback failed for {}: {err}", title.title));
                    }
                }
            }
            _ => {}
        }
    }

    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}

fn selected_title<'a>(titles: &'a [Title], table_state: &TableState) -> Option<&'a Title> {
    table_state.selected().and_then(|idx| titles.get(idx))
}

#[allow(clippy::too_many_arguments)]
fn draw_library(
    frame: &mut Frame,
    titles: &[Title],
    favorites: &[bool],
    table_state: &mut TableState,
    viewer: Option<&Viewer>,
    loading: bool,
    status: &str,
    db: &Database,
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let account_text = match viewer {
        Some(viewer) if viewer.paid => format!("{} (premium)", viewer.email),
        Some(viewer) => viewer.email.clone(),
        None => "guest".to_string(),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "ANIRYX",
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} titles", titles.len()),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(account_text, Style::default().fg(Color::Rgb(185, 195, 210))),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Library"));
    frame.render_widget(header, chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(chunks[1]);

    let rows: Vec<Row> = titles
        .iter()
        .enumerate()
        .map(|(idx, title)| {
            let eps = if title.episodes.is_empty() {
                "-".to_string()
            } else {
                title.episodes.len().to_string()
            };
            Row::new(vec![
                Cell::from(truncate(&title.title, 40)),
                Cell::from(eps),
                Cell::from(if title.premium { "premium" } else { "free" }),
                Cell::from(if favorites.get(idx).copied().unwrap_or(false) {
                    "★"
                } else {
                    ""
                }),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(56),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(4),
        ],
    )
    .header(
        Row::new(vec!["Title", "Eps", "Access", "Fav"]).style(
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(panel_block(if loading { "Catalog (loading...)" } else { "Catalog" }))
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(110, 170, 255))
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, body_chunks[0], table_state);

    let selection_text = match selected_title(titles, table_state) {
        Some(title) => {
            let progress = match db.resume_for(&title.id) {
                Ok(Some(point)) => {
                    format!("episode {} at {:.0}s", point.episode_index + 1, point.position_seconds)
                }
                _ => "not started".to_string(),
            };
            let tags = if title.tags.is_empty() {
                "-".to_string()
            } else {
                title.tags.join(", ")
            };
            format!(
                "Title\n{}\n\nProgress\n{}\n\nTags\n{}\n\n{}",
                truncate(&title.title, 40),
                progress,
                truncate(&tags, 40),
                truncate(&title.description, 200),
            )
        }
        None => "No titles yet.\n\nPress r to refresh the catalog.".to_string(),
    };
    let selection = Paragraph::new(selection_text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .block(panel_block("Selected"))
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Left);
    frame.render_widget(selection, body_chunks[1]);

    let controls = Paragraph::new(
        "↑/↓ move  Enter play  f favorite  y share  d download  r refresh  q quit",
    )
    .style(Style::default().fg(Color::Rgb(185, 195, 210)))
    .alignment(Alignment::Center)
    .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn status_info(message: &str) -> String {
    format!("INFO: {message}")
}

fn status_error(message: &str) -> String {
    format!("ERROR: {message}")
}
