//! Client library for connecting to a tidepool server

pub mod tcp_client;

pub use tcp_client::TcpClient;
