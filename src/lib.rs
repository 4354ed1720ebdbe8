//! Tidepool - an in-memory data structure server
//!
//! This crate provides a small networked store in the Redis family:
//! - Typed entries per key: strings (and decimal counters), lists, hashes, sets
//! - A TCP server handling many concurrent client connections
//! - Publish/subscribe channels with fire-and-forget delivery
//! - Commands: GET, SET, DEL, INCR, INCRBY, LPUSH, LPOP, LLEN, HSET, HGETALL,
//!   SADD, SMEMBERS, SUBSCRIBE, UNSUBSCRIBE, PUBLISH

pub mod client;
pub mod protocol;
pub mod pubsub;
pub mod server;
pub mod storage;

pub use client::TcpClient;
pub use protocol::{Command, Parser, Response};
pub use pubsub::{Broker, Event, Session};
pub use server::TcpServer;
pub use storage::{Entry, SharedStore, Store};

/// Result type for tidepool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tidepool
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request: unknown command, wrong argument count, bad framing.
    #[error("ERR {0}")]
    Protocol(String),

    /// The addressed key exists with a variant the command cannot operate on.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// Counter arithmetic against a value that is not a decimal integer.
    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("Connection error: {0}")]
    Connection(String),
}
