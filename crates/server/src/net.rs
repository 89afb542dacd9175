//! Transport threads: a blocking datagram receiver, a datagram sender, and
//! the stream listener with its per-connection handshake.
//!
//! All inbound traffic funnels into one MPSC queue the game thread drains
//! at the top of each tick; outbound datagrams go through the reverse
//! queue. No lock is ever held across an I/O call — the only shared lock
//! guards the tracked stream set (insert on accept, erase on close,
//! iterate on broadcast).

use std::io::{Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use starlance::net::protocol::{self, Header, HelloAckPayload, MsgType, WireDecode, HEADER_LEN};

/// Userspace receive buffer for the datagram socket.
const RECV_BUFFER_BYTES: usize = 1024 * 1024;

/// Cap on the Hello username payload; only the first 15 bytes are kept.
const MAX_HELLO_PAYLOAD: usize = 64;

const HANDSHAKE_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Inbound traffic as seen by the game thread.
#[derive(Debug)]
pub enum NetEvent {
    /// Raw datagram, undecoded; the session layer owns the parse.
    Datagram { from: SocketAddr, data: Vec<u8> },
    /// A stream handshake completed: username, source IP, issued token.
    TcpHello {
        name: String,
        ip: IpAddr,
        token: u32,
    },
}

/// Outbound datagram posted by the game thread.
pub type Outgoing = (SocketAddr, Vec<u8>);

/// Receives datagrams forever and posts them onto the event queue.
pub fn spawn_udp_receiver(socket: UdpSocket, events: Sender<NetEvent>) {
    thread::Builder::new()
        .name("udp-recv".into())
        .spawn(move || {
            let mut buf = vec![0u8; RECV_BUFFER_BYTES];
            loop {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => {
                        let event = NetEvent::Datagram {
                            from,
                            data: buf[..len].to_vec(),
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        log::warn!("udp receive failed: {}", err);
                        break;
                    }
                }
            }
        })
        .expect("spawn udp receiver thread");
}

/// Flushes the outgoing queue onto the socket. Send failures are logged
/// and forgotten; the session layer removes dead peers on timeout.
pub fn spawn_udp_sender(socket: UdpSocket, outgoing: Receiver<Outgoing>) {
    thread::Builder::new()
        .name("udp-send".into())
        .spawn(move || {
            for (addr, data) in outgoing {
                if let Err(err) = socket.send_to(&data, addr) {
                    log::debug!("udp send to {} failed: {}", addr, err);
                }
            }
        })
        .expect("spawn udp sender thread");
}

/// Handle to the tracked stream set, shared with handshake threads.
#[derive(Clone, Default)]
pub struct TcpControl {
    clients: Arc<Mutex<Vec<TcpStream>>>,
}

impl TcpControl {
    /// Sends the StartGame header to every live stream, dropping the ones
    /// whose write fails.
    pub fn broadcast_start_game(&self) {
        let frame = protocol::header_only(MsgType::StartGame);
        let mut clients = self.clients.lock().unwrap();
        clients.retain_mut(|stream| stream.write_all(&frame).is_ok());
    }

    pub fn shutdown(&self) {
        let mut clients = self.clients.lock().unwrap();
        for stream in clients.iter() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        clients.clear();
    }

    fn insert(&self, stream: TcpStream) {
        self.clients.lock().unwrap().push(stream);
    }

    fn remove(&self, peer: SocketAddr) {
        self.clients
            .lock()
            .unwrap()
            .retain(|s| s.peer_addr().map(|a| a != peer).unwrap_or(false));
    }
}

/// Accepts stream connections and runs the handshake on a thread per
/// connection: TcpWelcome out, Hello(username) in, HelloAck out. A full
/// session never acks, so the sixth client times out on its own.
pub fn spawn_tcp_server(
    listener: TcpListener,
    events: Sender<NetEvent>,
    player_count: Arc<AtomicUsize>,
    udp_port: u16,
    max_players: usize,
) -> TcpControl {
    let control = TcpControl::default();
    let accept_control = control.clone();

    thread::Builder::new()
        .name("tcp-accept".into())
        .spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(s) => s,
                    Err(err) => {
                        log::warn!("tcp accept failed: {}", err);
                        break;
                    }
                };
                let Ok(clone) = stream.try_clone() else {
                    continue;
                };
                accept_control.insert(clone);

                let events = events.clone();
                let control = accept_control.clone();
                let player_count = player_count.clone();
                thread::Builder::new()
                    .name("tcp-handshake".into())
                    .spawn(move || {
                        if let Err(err) = run_handshake(
                            stream,
                            &events,
                            &player_count,
                            &control,
                            udp_port,
                            max_players,
                        ) {
                            log::debug!("tcp handshake ended: {}", err);
                        }
                    })
                    .expect("spawn handshake thread");
            }
        })
        .expect("spawn tcp accept thread");

    control
}

fn run_handshake(
    mut stream: TcpStream,
    events: &Sender<NetEvent>,
    player_count: &AtomicUsize,
    control: &TcpControl,
    udp_port: u16,
    max_players: usize,
) -> std::io::Result<()> {
    let peer = stream.peer_addr()?;
    stream.set_read_timeout(Some(HANDSHAKE_READ_TIMEOUT))?;

    stream.write_all(&protocol::header_only(MsgType::TcpWelcome))?;

    let mut header_buf = [0u8; HEADER_LEN];
    if let Err(err) = stream.read_exact(&mut header_buf) {
        control.remove(peer);
        return Err(err);
    }
    let mut cursor = &header_buf[..];
    let Ok(header) = Header::decode(&mut cursor) else {
        return Ok(());
    };
    if header.version != protocol::PROTOCOL_VERSION || header.msg != MsgType::Hello {
        return Ok(());
    }

    let payload_len = (header.size as usize).min(MAX_HELLO_PAYLOAD);
    let mut payload = vec![0u8; payload_len];
    if let Err(err) = stream.read_exact(&mut payload) {
        control.remove(peer);
        return Err(err);
    }
    let name = decode_username(&payload);

    if player_count.load(Ordering::SeqCst) >= max_players {
        // Ignore post-welcome: no ack, the client gives up on its own.
        log::info!("rejecting {}: session full ({} players)", peer, max_players);
        return Ok(());
    }

    let token = issue_token();
    let _ = events.send(NetEvent::TcpHello {
        name,
        ip: peer.ip(),
        token,
    });

    let ack = protocol::frame(MsgType::HelloAck, &HelloAckPayload { udp_port, token });
    stream.write_all(&ack)?;

    log::info!("tcp handshake complete for {}", peer);
    Ok(())
}

fn decode_username(payload: &[u8]) -> String {
    let kept = &payload[..payload.len().min(15)];
    String::from_utf8_lossy(kept)
        .trim_end_matches(&['\0', ' '][..])
        .to_string()
}

fn issue_token() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    hasher.finish() as u32
}
