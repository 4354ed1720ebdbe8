//! TCP server module

pub mod connection;
pub mod dispatcher;
pub mod tcp_server;

pub use connection::Connection;
pub use dispatcher::Dispatcher;
pub use tcp_server::TcpServer;
