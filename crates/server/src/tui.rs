use std::collections::VecDeque;
use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use skirmish::{DisconnectReason, GameEvent, PlayerInfo, ServerEvent, ServerStats};

const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub elapsed_secs: u64,
    pub level: LogLevel,
    pub message: String,
}

pub struct TuiState {
    started: Instant,
    log: VecDeque<LogLine>,
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            log: VecDeque::with_capacity(MAX_LOG_LINES),
        }
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    pub fn record(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::PlayerConnected { player_id, addr } => {
                self.log_info(format!("Player {} connected from {}", player_id, addr));
            }
            ServerEvent::PlayerDisconnected { player_id, reason } => {
                let message = format!("Player {} {}", player_id, reason.as_str());
                match reason {
                    DisconnectReason::ShortWrite | DisconnectReason::WriteError => {
                        self.log_warn(message)
                    }
                    _ => self.log_info(message),
                }
            }
            ServerEvent::PlayerRenamed { player_id, name } => {
                self.log_info(format!("Player {} is now known as {}", player_id, name));
            }
            ServerEvent::Game(GameEvent::DamageDealt {
                attacker_id,
                target_id,
                remaining_health,
                ..
            }) => {
                self.log_info(format!(
                    "{} hit {} ({} hp left)",
                    attacker_id, target_id, remaining_health
                ));
            }
            ServerEvent::Game(GameEvent::PlayerDeath {
                player_id,
                killer_id,
            }) => {
                self.log_warn(format!("{} was eliminated by {}", player_id, killer_id));
            }
            ServerEvent::Game(GameEvent::ProjectileFired { .. }) => {}
            ServerEvent::Error { message } => self.log_error(message),
        }
    }

    fn push(&mut self, level: LogLevel, message: String) {
        if self.log.len() >= MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(LogLine {
            elapsed_secs: self.started.elapsed().as_secs(),
            level,
            message,
        });
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, stats: &ServerStats, players: &[PlayerInfo]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(6),
            Constraint::Length(10),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats);
    render_counters(frame, chunks[1], stats);
    render_players(frame, chunks[2], players);
    render_log(frame, chunks[3], state);
    render_help(frame, chunks[4]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let title = format!(" Skirmish Server - Uptime: {} ", format_duration(stats.uptime_secs));

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let text = format!(
        "Players: {}  |  Projectiles: {}  |  Ticks: {}",
        stats.player_count, stats.projectile_count, stats.world.ticks
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_counters(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Counters ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let label = Style::default().fg(Color::Gray);
    let value = Style::default().fg(Color::White);
    let lines = vec![
        Line::from(vec![
            Span::styled("Combat: ", label),
            Span::styled(
                format!(
                    "{} shots / {} hits / {} eliminations",
                    stats.world.projectiles_fired, stats.world.hits, stats.world.deaths
                ),
                value,
            ),
        ]),
        Line::from(vec![
            Span::styled("Keyframes: ", label),
            Span::styled(format!("{} sent", stats.keyframes_sent), value),
        ]),
        Line::from(vec![
            Span::styled("Bytes: ", label),
            Span::styled(
                format!(
                    "{} sent / {} recv",
                    format_bytes(stats.bytes_sent),
                    format_bytes(stats.bytes_received)
                ),
                value,
            ),
        ]),
        Line::from(vec![
            Span::styled("Dropped lines: ", label),
            Span::styled(
                stats.lines_dropped.to_string(),
                Style::default().fg(if stats.lines_dropped > 0 {
                    Color::Red
                } else {
                    Color::White
                }),
            ),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_players(frame: &mut Frame, area: Rect, players: &[PlayerInfo]) {
    let block = Block::default()
        .title(format!(" Players ({}) ", players.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let header = Row::new(["ID", "Name", "HP", "Position", "Address", "Online"]).style(
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::BOLD),
    );

    let rows = players.iter().map(|player| {
        let hp_color = match player.health {
            0 => Color::Red,
            1..=30 => Color::Yellow,
            _ => Color::Green,
        };
        Row::new(vec![
            Cell::from(player.id.to_string()),
            Cell::from(player.name.clone()),
            Cell::from(player.health.to_string()).style(Style::default().fg(hp_color)),
            Cell::from(format!(
                "{:>5.0},{:>5.0}",
                player.position.x, player.position.y
            )),
            Cell::from(player.addr.to_string()),
            Cell::from(format_duration(player.connected_secs)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Min(12),
            Constraint::Length(5),
            Constraint::Length(13),
            Constraint::Length(22),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(block);

    frame.render_widget(table, area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Events ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .log
        .iter()
        .skip(state.log.len().saturating_sub(visible))
        .map(|line| {
            let color = match line.level {
                LogLevel::Info => Color::White,
                LogLevel::Warn => Color::Yellow,
                LogLevel::Error => Color::Red,
            };
            Line::from(vec![
                Span::styled(
                    format!("[{}] ", format_duration(line.elapsed_secs)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(line.message.clone(), Style::default().fg(color)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("Press 'q' or ESC to quit")
        .block(block)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );

    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1}GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_is_bounded() {
        let mut state = TuiState::new();
        for i in 0..(MAX_LOG_LINES + 10) {
            state.log_info(format!("line {}", i));
        }

        assert_eq!(state.log.len(), MAX_LOG_LINES);
        assert_eq!(state.log.front().unwrap().message, "line 10");
    }

    #[test]
    fn disconnect_write_errors_are_warnings() {
        let mut state = TuiState::new();
        state.record(ServerEvent::PlayerDisconnected {
            player_id: 3,
            reason: DisconnectReason::ShortWrite,
        });
        state.record(ServerEvent::Game(GameEvent::ProjectileFired {
            owner_id: 1,
            projectile_id: 1_000_000,
        }));

        assert_eq!(state.log.len(), 1);
        assert_eq!(state.log[0].level, LogLevel::Warn);
        assert!(state.log[0].message.starts_with("Player 3"));
    }

    #[test]
    fn formats_durations_and_sizes() {
        assert_eq!(format_duration(3725), "01:02:05");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
    }
}
