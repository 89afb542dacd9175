pub mod config;
pub mod net;
pub mod server;
pub mod session;

pub use config::ServerConfig;
pub use net::{NetEvent, Outgoing, TcpControl};
pub use server::GameServer;
pub use session::SessionState;
