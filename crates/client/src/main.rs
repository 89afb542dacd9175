mod hud;
mod net;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use net::{ClientConfig, ClientPhase, NetClient};

#[derive(Parser)]
#[command(name = "starlance-client")]
#[command(about = "Headless starlance session client")]
struct Args {
    /// Server host name or address.
    host: String,

    #[arg(long, default_value_t = starlance::DEFAULT_UDP_PORT)]
    port: u16,

    #[arg(long, default_value = "Pilot")]
    name: String,

    /// Also start once two players are visible in snapshots, without
    /// waiting for the lobby started flag.
    #[arg(long)]
    presence_fallback: bool,

    /// As host, request this base-lives lobby setting (1..6).
    #[arg(long)]
    base_lives: Option<u8>,

    /// As host, request this difficulty lobby setting (0..2).
    #[arg(long)]
    difficulty: Option<u8>,

    /// As host, start the match once this many players are in the lobby.
    #[arg(long)]
    start_players: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ClientConfig {
        presence_fallback: args.presence_fallback,
        ..Default::default()
    };

    let mut client = NetClient::connect(&args.host, args.port, &args.name, config)
        .context("TCP connection failed.")?;
    log::info!("connected as '{}', waiting for match start", args.name);

    let mut last_phase = client.phase();
    let mut iterations: u64 = 0;
    let mut config_requested = false;
    loop {
        client.pump()?;
        client.send_input(0)?;

        // Host duties: push the requested lobby config once, then start
        // the match when enough players are aboard.
        if client.phase() == ClientPhase::Waiting && client.hud.is_host() {
            if !config_requested && (args.base_lives.is_some() || args.difficulty.is_some()) {
                let base_lives = args.base_lives.unwrap_or(client.hud.base_lives);
                let difficulty = args.difficulty.unwrap_or(client.hud.difficulty);
                client.send_lobby_config(base_lives, difficulty)?;
                config_requested = true;
            }
            if let Some(wanted) = args.start_players {
                let aboard = 1 + client.hud.teammates.len();
                if aboard >= wanted && !client.hud.started && iterations % 60 == 0 {
                    log::info!("{} players aboard, requesting match start", aboard);
                    client.send_start_match()?;
                }
            }
        }

        let phase = client.phase();
        if phase != last_phase {
            log::info!("phase: {:?} -> {:?}", last_phase, phase);
            if phase == ClientPhase::InGame {
                log::info!("roster: {}", client.hud.roster_line());
            }
            last_phase = phase;
        }
        iterations += 1;
        if phase == ClientPhase::InGame && iterations % 300 == 0 {
            let now = std::time::Instant::now();
            let self_pos = client
                .reconciler
                .get(client.hud.self_id)
                .map(|t| t.position(now));
            let enemies = client
                .reconciler
                .render_entities()
                .filter(|t| t.state.kind == starlance::EntityKind::Enemy)
                .count();
            log::info!(
                "score {} | {} tracked ({} enemies) | self at {:?}",
                client.hud.team_score,
                client.reconciler.len(),
                enemies,
                self_pos
            );
        }
        match phase {
            ClientPhase::GameOver => {
                log::info!("match over, final team score {}", client.hud.team_score);
                client.disconnect();
                break;
            }
            ClientPhase::Menu => {
                log::info!("server sent us back to the menu");
                break;
            }
            _ => {}
        }

        std::thread::sleep(Duration::from_millis(16));
    }

    Ok(())
}
