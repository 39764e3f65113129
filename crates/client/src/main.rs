mod input;
mod session;
mod view;

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use skirmish::net::resolve_name;
use skirmish::{ClientConfig, ConnectionState, WorldConfig};

use input::{Heading, InputState};
use session::Session;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Parser)]
#[command(name = "skirmish-client")]
#[command(about = "Skirmish arena client")]
struct Args {
    #[arg(default_value = skirmish::DEFAULT_HOST, help = "Server host name or address")]
    host: String,

    #[arg(short, long, default_value_t = skirmish::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, help = "Display name (defaults to $NETWORK_USERNAME)")]
    name: Option<String>,

    #[arg(long, help = "Connect and log replication stats without a display")]
    headless: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = ClientConfig {
        server_addr: resolve_addr(&args.host, args.port)?,
        name: resolve_name(args.name.as_deref()),
        ..Default::default()
    };

    if args.headless {
        run_headless(config)
    } else {
        run_with_tui(config)
    }
}

fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {}", host))?
        .next()
        .ok_or_else(|| anyhow!("no address found for {}", host))
}

fn run_headless(config: ClientConfig) -> Result<()> {
    let session = Session::start(config).context("failed to connect")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut ticker = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    log::info!("Interrupt received");
                    break;
                }
                _ = ticker.tick() => {
                    let handle = session.handle();
                    if handle.state() == ConnectionState::Disconnected {
                        log::info!("Connection closed");
                        break;
                    }
                    let entities = session.sample();
                    log::info!(
                        "{} | id {:?} | hp {:?} | {} entities",
                        handle.state().as_str(),
                        handle.own_id(),
                        session.own_health(),
                        entities.len()
                    );
                }
            }
        }
    });

    drop(session);
    Ok(())
}

fn run_with_tui(config: ClientConfig) -> Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = game_loop(config, &mut terminal);

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    result
}

fn game_loop(
    config: ClientConfig,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<()> {
    let arena = WorldConfig::default().bounds();
    let mut session = Session::start(config.clone()).context("failed to connect")?;
    let mut input = InputState::default();
    let mut notice: Option<String> = None;

    loop {
        let frame_start = Instant::now();

        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind == KeyEventKind::Release {
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(());
                }
                KeyCode::Left => input.press(Heading::Left, frame_start),
                KeyCode::Right => input.press(Heading::Right, frame_start),
                KeyCode::Up => input.press(Heading::Up, frame_start),
                KeyCode::Down => input.press(Heading::Down, frame_start),
                KeyCode::Char(' ') => input.fire(),
                KeyCode::Char('r') => {
                    let eliminated = session.own_health() == Some(0);
                    if eliminated || !session.handle().is_connected() {
                        session.stop();
                        match Session::start(config.clone()) {
                            Ok(fresh) => {
                                session = fresh;
                                notice = None;
                            }
                            Err(e) => notice = Some(format!("reconnect failed: {}", e)),
                        }
                        input.reset();
                    }
                }
                _ => {}
            }
        }

        let intent = input.to_intent(frame_start);
        if session.handle().is_connected() {
            session.send_input(intent);
        }

        let entities = session.sample();
        let handle = session.handle();
        let model = view::ViewModel {
            server: config.server_addr,
            name: &config.name,
            state: handle.state(),
            own_id: handle.own_id(),
            entities: &entities,
            arena,
            notice: notice.as_deref(),
        };
        terminal.draw(|frame| view::render(frame, &model))?;

        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_INTERVAL {
            std::thread::sleep(FRAME_INTERVAL - elapsed);
        }
    }
}
