//! Byte transports carrying the bind line protocol
//!
//! The protocol only needs a duplex byte stream. Serial links are the usual
//! field setup; TCP and stdio cover bench testing and tunnelling over ssh.

pub mod serial;
pub mod stdio;
pub mod tcp;
pub mod traits;

pub use serial::{SerialConfig, SerialConnector, SerialTransportStream, DEFAULT_BAUD_RATE};
pub use stdio::{StdioConnector, StdioTransportStream};
pub use tcp::{TcpAcceptor, TcpConnector, TcpTransportStream};
pub use traits::{TransportConnector, TransportStream};
