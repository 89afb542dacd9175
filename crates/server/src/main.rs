use std::net::{TcpListener, UdpSocket};
use std::sync::atomic::AtomicUsize;
use std::sync::{mpsc, Arc};

use anyhow::Result;
use clap::Parser;

use starlance_server::{net, GameServer, ServerConfig};

#[derive(Parser)]
#[command(name = "starlance-server")]
#[command(about = "Authoritative starlance session server")]
struct Args {
    /// Datagram port; the stream listener binds the next port up.
    #[arg(long, default_value_t = starlance::DEFAULT_UDP_PORT)]
    udp_port: u16,

    #[arg(long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(long, default_value_t = 5)]
    max_players: usize,

    /// Fixed RNG seed for replayable matches.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        udp_port: args.udp_port,
        tick_rate: args.tick_rate,
        max_players: args.max_players,
        rng_seed: args.seed,
        ..Default::default()
    };

    let udp = UdpSocket::bind(("0.0.0.0", config.udp_port))?;
    let udp_sender = udp.try_clone()?;
    let listener = TcpListener::bind(("0.0.0.0", config.tcp_port()))?;
    log::info!(
        "listening: udp {}, tcp {}",
        config.udp_port,
        config.tcp_port()
    );

    let (event_tx, event_rx) = mpsc::channel();
    let (out_tx, out_rx) = mpsc::channel();
    let player_count = Arc::new(AtomicUsize::new(0));

    net::spawn_udp_receiver(udp, event_tx.clone());
    net::spawn_udp_sender(udp_sender, out_rx);
    let tcp = net::spawn_tcp_server(
        listener,
        event_tx,
        player_count.clone(),
        config.udp_port,
        config.max_players,
    );

    GameServer::new(config, event_rx, out_tx, tcp, player_count).run();
    Ok(())
}
