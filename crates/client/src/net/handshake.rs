//! Reliable-stream handshake: learn the datagram port and session token.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use starlance::net::protocol::{
    self, Header, HelloAckPayload, MsgType, WireDecode, WireEncode, HEADER_LEN, PROTOCOL_VERSION,
};

/// Result of a completed stream handshake. The stream is kept open for
/// the session's lifetime; the server pushes `StartGame` over it.
#[derive(Debug)]
pub struct HandshakeOutcome {
    pub stream: TcpStream,
    pub udp_port: u16,
    pub token: u32,
}

fn bad_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "host did not resolve"))
}

/// Connects to `host:udp_port + 1`, waits for `TcpWelcome`, sends
/// `Hello` with the username bytes, and reads the `HelloAck`.
pub fn connect(
    host: &str,
    udp_port: u16,
    username: &str,
    timeout: Duration,
) -> io::Result<HandshakeOutcome> {
    let addr = resolve(host, udp_port + 1)?;
    let mut stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;

    let welcome = read_header(&mut stream)?;
    if welcome.msg != MsgType::TcpWelcome {
        return Err(bad_data("expected TcpWelcome"));
    }

    let mut hello = Vec::with_capacity(HEADER_LEN + username.len());
    Header::new(MsgType::Hello, username.len() as u16).encode(&mut hello);
    hello.extend_from_slice(username.as_bytes());
    stream.write_all(&hello)?;

    let ack_header = read_header(&mut stream)?;
    if ack_header.msg != MsgType::HelloAck {
        return Err(bad_data("expected HelloAck"));
    }
    let mut payload = vec![0u8; ack_header.size as usize];
    stream.read_exact(&mut payload)?;
    let mut cursor = payload.as_slice();
    let ack = HelloAckPayload::decode(&mut cursor).map_err(|e| bad_data(&e.to_string()))?;

    log::info!(
        "tcp handshake complete, udp port {} token {:#x}",
        ack.udp_port,
        ack.token
    );

    Ok(HandshakeOutcome {
        stream,
        udp_port: ack.udp_port,
        token: ack.token,
    })
}

fn read_header(stream: &mut TcpStream) -> io::Result<Header> {
    let mut buf = [0u8; HEADER_LEN];
    stream.read_exact(&mut buf)?;
    let mut cursor = &buf[..];
    let header = Header::decode(&mut cursor).map_err(|e| bad_data(&e.to_string()))?;
    if header.version != PROTOCOL_VERSION {
        return Err(bad_data("protocol version mismatch"));
    }
    Ok(header)
}
