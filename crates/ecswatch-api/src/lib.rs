// ecswatch-api: Socket.IO channel client and typed wire protocol for the ECS console backend

pub mod channel;
pub mod engineio;
pub mod error;
pub mod listeners;
pub mod models;
pub mod polling;
pub mod protocol;
pub mod socketio;
pub mod transport;
mod websocket;

pub use channel::{Channel, ChannelConfig, ConnectionState, ReconnectConfig};
pub use error::Error;
pub use listeners::{ListenerRegistry, Listeners};
pub use protocol::{EventKind, InboundEvent, OutboundCommand};
pub use transport::{Credentials, TlsMode, TransportConfig, TransportKind};
