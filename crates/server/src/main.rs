mod tui;

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use skirmish::{GameServer, ServerConfig, ServerHandle};
use tui::TuiState;

#[derive(Parser)]
#[command(name = "skirmish-server")]
#[command(about = "Skirmish authoritative arena server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = skirmish::DEFAULT_PORT)]
    port: u16,

    #[arg(long, help = "Log to stderr instead of showing the status screen")]
    headless: bool,

    #[arg(long, default_value_t = 50, help = "Keyframe broadcast interval in ms")]
    broadcast_ms: u64,

    #[arg(long, default_value_t = 25, help = "Reactor wait timeout in ms")]
    poll_ms: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let ip: IpAddr = args
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {:?}", args.bind))?;

    let config = ServerConfig {
        bind_addr: SocketAddr::new(ip, args.port),
        poll_timeout: Duration::from_millis(args.poll_ms.max(1)),
        broadcast_interval: Duration::from_millis(args.broadcast_ms.max(1)),
        ..Default::default()
    };

    let mut server = GameServer::bind(config.clone())
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::info!("Server started on {}", server.local_addr()?);
        stop_on_ctrl_c(server.handle())?;
        server.run()?;
        log::info!("Server shutting down");
    } else {
        run_with_tui(&mut server)?;
    }

    Ok(())
}

fn stop_on_ctrl_c(handle: ServerHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("signal".into())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        log::info!("Interrupt received");
                        handle.stop();
                    }
                    Err(e) => log::warn!("Unable to listen for Ctrl+C: {}", e),
                }
            });
        })?;

    Ok(())
}

fn run_with_tui(server: &mut GameServer) -> Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = tui_loop(server, &mut terminal);

    server.shutdown_connections();
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    result
}

fn tui_loop(
    server: &mut GameServer,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<()> {
    let handle = server.handle();
    let mut tui_state = TuiState::new();

    tui_state.log_info(format!("Server started on {}", server.local_addr()?));

    while handle.is_running() {
        if let Err(e) = server.poll_once() {
            tui_state.log_error(format!("Reactor error: {}", e));
            return Err(e.into());
        }

        for event in server.drain_events() {
            tui_state.record(event);
        }

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let ctrl_c = key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c');
                if ctrl_c || matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    handle.stop();
                }
            }
        }

        let stats = server.stats();
        let players = server.player_infos();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &players);
        })?;
    }

    Ok(())
}
