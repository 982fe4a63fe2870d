//! Link handling on the operator side

pub mod connection;

pub use connection::DeviceLink;
