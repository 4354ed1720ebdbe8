//! Publish/subscribe module for channel fan-out

pub mod broker;

pub use broker::{Broker, Event, Session, SessionId};
