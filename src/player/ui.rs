use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Gauge, Padding, Paragraph, Wrap};

use crate::player::gesture::{GestureCoordinator, SeekDirection};
use crate::player::session::{PlaybackSession, format_clock};

pub(super) struct ContentView<'a> {
    pub(super) session: &'a PlaybackSession,
    pub(super) gesture: &'a GestureCoordinator,
    pub(super) skip_prompt: bool,
    pub(super) autoplay_remaining: Option<u32>,
    pub(super) embedded: bool,
    pub(super) status: &'a str,
}

pub(super) fn draw_content(frame: &mut Frame, view: &ContentView) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let mut header_spans = vec![Span::styled(
        "ANIRYX",
        Style::default()
            .fg(Color::Rgb(110, 170, 255))
            .add_modifier(Modifier::BOLD),
    )];
    header_spans.push(Span::styled("   ", Style::default()));
    header_spans.push(Span::styled(
        view.session.title_label.clone(),
        Style::default().fg(Color::Rgb(185, 195, 210)),
    ));
    if view.gesture.locked() {
        header_spans.push(Span::styled("   ", Style::default()));
        header_spans.push(Span::styled(
            "LOCKED",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }
    let header = Paragraph::new(Line::from(header_spans))
        .alignment(Alignment::Center)
        .block(panel_block("Now Playing"));
    frame.render_widget(header, chunks[0]);

    let stage_text = if view.embedded {
        "Playing in your browser.\n\nProgress cannot be tracked in this mode.\n\nPress q to close."
            .to_string()
    } else if view.session.playing {
        "▶".to_string()
    } else {
        "⏸ Paused".to_string()
    };
    let stage = Paragraph::new(stage_text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .alignment(Alignment::Center)
        .block(panel_block("Video"))
        .wrap(Wrap { trim: true });
    frame.render_widget(stage, chunks[1]);

    if let Some(direction) = view.gesture.seek_indicator() {
        draw_seek_indicator(frame, chunks[1], direction);
    }

    if view.gesture.controls_visible() && !view.embedded {
        let label = format!(
            "{} / {}{}",
            format_clock(view.session.current_time),
            format_clock(view.session.duration),
            if view.session.muted { "  [muted]" } else { "" }
        );
        let progress = Gauge::default()
            .block(panel_block("Progress"))
            .gauge_style(
                Style::default()
                    .fg(Color::Rgb(130, 190, 255))
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .label(label)
            .ratio(view.session.progress_ratio());
        frame.render_widget(progress, chunks[2]);

        let hint = if view.gesture.locked() {
            "l unlock"
        } else {
            "space pause  ←/→ seek 10s  m mute  p pin  l lock  n next  q quit"
        };
        let controls = Paragraph::new(hint)
            .style(Style::default().fg(Color::Rgb(185, 195, 210)))
            .alignment(Alignment::Center)
            .block(panel_block("Controls"));
        frame.render_widget(controls, chunks[3]);
    } else {
        let status = Paragraph::new(view.status.to_string())
            .style(Style::default().fg(Color::Rgb(185, 195, 210)))
            .block(panel_block("Status"));
        frame.render_widget(status, chunks[3]);
    }

    if view.skip_prompt {
        let area = anchored_rect(frame.area(), 24, 3);
        frame.render_widget(Clear, area);
        let prompt = Paragraph::new("Skip  [Enter]")
            .alignment(Alignment::Center)
            .block(modal_block("Skip"));
        frame.render_widget(prompt, area);
    }

    if let Some(remaining) = view.autoplay_remaining {
        let text = format!("Next episode in {remaining}s\n\nn play now   any key cancels");
        let area = centered_fixed_rect(44, 8, frame.area());
        frame.render_widget(Clear, area);
        let popup = Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(modal_block("Up Next"));
        frame.render_widget(popup, area);
    }
}

pub(super) struct AdView<'a> {
    pub(super) elapsed_label: &'a str,
    pub(super) unlock_in: Option<u32>,
    pub(super) has_link: bool,
}

pub(super) fn draw_ad(frame: &mut Frame, view: &AdView) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(Line::from(vec![Span::styled(
        "Advertisement",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )]))
    .alignment(Alignment::Center)
    .block(panel_block("Ad"));
    frame.render_widget(header, chunks[0]);

    let stage = Paragraph::new(view.elapsed_label.to_string())
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .alignment(Alignment::Center)
        .block(panel_block("Video"));
    frame.render_widget(stage, chunks[1]);

    let skip_text = match view.unlock_in {
        None => "This ad cannot be skipped".to_string(),
        Some(0) => "Enter skip ad".to_string(),
        Some(seconds) => format!("Skip in {seconds}s"),
    };
    let mut hint = skip_text;
    if view.has_link {
        hint.push_str("   o visit advertiser");
    }
    let controls = Paragraph::new(hint)
        .style(Style::default().fg(Color::Rgb(185, 195, 210)))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);
}

fn draw_seek_indicator(frame: &mut Frame, stage: Rect, direction: SeekDirection) {
    let (label, x) = match direction {
        SeekDirection::Back => ("« 10s", stage.x + 2),
        SeekDirection::Forward => ("10s »", stage.x + stage.width.saturating_sub(11)),
    };
    let y = stage.y + stage.height / 2;
    let area = Rect::new(x, y, 9.min(stage.width), 1);
    if area.width == 0 {
        return;
    }
    frame.render_widget(Clear, area);
    let indicator = Paragraph::new(label)
        .style(
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    frame.render_widget(indicator, area);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 0, 0))
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

/// Bottom-right anchor for the skip prompt.
fn anchored_rect(area: Rect, width: u16, height: u16) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width + 2);
    let y = area.y + area.height.saturating_sub(clamped_height + 7);
    Rect::new(x, y, clamped_width, clamped_height)
}
