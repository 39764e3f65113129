use std::collections::HashMap;
use std::net::SocketAddr;

use glam::Vec2;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Points};
use ratatui::widgets::{Block, Borders, Paragraph};

use skirmish::{ConnectionState, EntityKind, EntitySnapshot};

pub struct ViewModel<'a> {
    pub server: SocketAddr,
    pub name: &'a str,
    pub state: ConnectionState,
    pub own_id: Option<u32>,
    pub entities: &'a HashMap<u32, EntitySnapshot>,
    pub arena: Vec2,
    pub notice: Option<&'a str>,
}

impl ViewModel<'_> {
    fn own_health(&self) -> Option<u32> {
        self.entities.get(&self.own_id?)?.health()
    }

    fn counts(&self) -> (usize, usize) {
        let players = self.entities.values().filter(|e| e.is_player()).count();
        (players, self.entities.len() - players)
    }
}

pub fn render(frame: &mut Frame, model: &ViewModel) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_arena(frame, chunks[0], model);
    render_hud(frame, chunks[1], model);
    render_help(frame, chunks[2]);
}

fn render_arena(frame: &mut Frame, area: Rect, model: &ViewModel) {
    let width = f64::from(model.arena.x);
    let height = f64::from(model.arena.y);
    // Arena y grows downwards, canvas y grows upwards.
    let to_canvas = |entity: &EntitySnapshot| (f64::from(entity.x), height - f64::from(entity.y));

    let mut entities: Vec<&EntitySnapshot> = model.entities.values().collect();
    entities.sort_by_key(|e| e.id);

    let bullets: Vec<(f64, f64)> = entities
        .iter()
        .filter(|e| !e.is_player())
        .map(|e| to_canvas(e))
        .collect();

    let canvas = Canvas::default()
        .block(
            Block::default()
                .title(format!(" Skirmish - {} ", model.server))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(move |ctx| {
            ctx.draw(&Points {
                coords: &bullets,
                color: Color::White,
            });
            ctx.layer();

            for entity in &entities {
                let EntityKind::Player { health, name } = &entity.kind else {
                    continue;
                };
                let (x, y) = to_canvas(entity);
                let own = model.own_id == Some(entity.id);
                let (glyph, color) = match (*health, own) {
                    (0, _) => ("x", Color::Red),
                    (_, true) => ("@", Color::Green),
                    (_, false) => ("@", Color::Yellow),
                };

                ctx.print(
                    x,
                    y,
                    Span::styled(glyph, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                );
                ctx.print(
                    x,
                    (y + height * 0.04).min(height),
                    Span::styled(
                        format!("{} {}", name, health),
                        Style::default().fg(Color::Gray),
                    ),
                );
            }
        });

    frame.render_widget(canvas, area);
}

fn render_hud(frame: &mut Frame, area: Rect, model: &ViewModel) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let state_color = match model.state {
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Connected => Color::Green,
        ConnectionState::Disconnected => Color::Red,
    };
    let (players, bullets) = model.counts();

    let mut spans = vec![
        Span::styled(model.state.as_str(), Style::default().fg(state_color)),
        Span::raw("  |  "),
        Span::raw(match model.own_id {
            Some(id) => format!("{} (#{})", model.name, id),
            None => model.name.to_owned(),
        }),
    ];

    match model.own_health() {
        Some(0) => spans.push(Span::styled(
            "  |  ELIMINATED - press r to rejoin",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Some(hp) => spans.push(Span::raw(format!("  |  HP {}", hp))),
        None => {}
    }

    spans.push(Span::styled(
        format!("  |  players {}  bullets {}", players, bullets),
        Style::default().fg(Color::Gray),
    ));

    if let Some(notice) = model.notice {
        spans.push(Span::styled(
            format!("  |  {}", notice),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new("←↑↓→ Move  Space Fire  R Reconnect  Q Quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(help, area);
}
