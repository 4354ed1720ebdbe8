//! Command definitions and implementations

use serde::{Deserialize, Serialize};

/// Supported commands, one variant per wire operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Set { key: String, value: String },
    Get { key: String },
    Del { keys: Vec<String> },
    Incr { key: String },
    IncrBy { key: String, delta: i64 },
    LPush { key: String, value: String },
    LPop { key: String },
    LLen { key: String },
    HSet { key: String, field: String, value: String },
    HGetAll { key: String },
    SAdd { key: String, member: String },
    SMembers { key: String },
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
    Publish { channel: String, payload: String },
    Ping,
    Info,
}

/// Response from command execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Value(String),
    Nil,
    Integer(i64),
    /// Flat list of bulk strings (SMEMBERS, drained lists).
    Array(Vec<String>),
    /// Field/value pairs, encoded as a flat array of 2n bulk strings.
    Map(Vec<(String, String)>),
    /// A pub/sub delivery pushed to a subscribed connection.
    Event { channel: String, payload: String },
    Error(String),
    Pong,
    Info(String),
}

impl Response {
    /// Convert response to Redis protocol format
    pub fn to_resp(&self) -> String {
        match self {
            Response::Ok => "+OK\r\n".to_string(),
            Response::Value(val) => bulk(val),
            Response::Nil => "$-1\r\n".to_string(),
            Response::Integer(num) => format!(":{}\r\n", num),
            Response::Array(items) => {
                let mut out = format!("*{}\r\n", items.len());
                for item in items {
                    out.push_str(&bulk(item));
                }
                out
            }
            Response::Map(pairs) => {
                let mut out = format!("*{}\r\n", pairs.len() * 2);
                for (field, value) in pairs {
                    out.push_str(&bulk(field));
                    out.push_str(&bulk(value));
                }
                out
            }
            Response::Event { channel, payload } => {
                format!("*3\r\n{}{}{}", bulk("message"), bulk(channel), bulk(payload))
            }
            Response::Error(err) => format!("-{}\r\n", err),
            Response::Pong => "+PONG\r\n".to_string(),
            Response::Info(info) => bulk(info),
        }
    }
}

fn bulk(val: &str) -> String {
    format!("${}\r\n{}\r\n", val.len(), val)
}

impl Command {
    /// Get command name as string
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
            Command::Del { .. } => "DEL",
            Command::Incr { .. } => "INCR",
            Command::IncrBy { .. } => "INCRBY",
            Command::LPush { .. } => "LPUSH",
            Command::LPop { .. } => "LPOP",
            Command::LLen { .. } => "LLEN",
            Command::HSet { .. } => "HSET",
            Command::HGetAll { .. } => "HGETALL",
            Command::SAdd { .. } => "SADD",
            Command::SMembers { .. } => "SMEMBERS",
            Command::Subscribe { .. } => "SUBSCRIBE",
            Command::Unsubscribe { .. } => "UNSUBSCRIBE",
            Command::Publish { .. } => "PUBLISH",
            Command::Ping => "PING",
            Command::Info => "INFO",
        }
    }

    /// Flatten into wire arguments, the inverse of `Parser::from_args`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.name().to_string()];
        match self {
            Command::Set { key, value } => {
                args.push(key.clone());
                args.push(value.clone());
            }
            Command::Get { key }
            | Command::Incr { key }
            | Command::LPop { key }
            | Command::LLen { key }
            | Command::HGetAll { key }
            | Command::SMembers { key } => args.push(key.clone()),
            Command::Del { keys } => args.extend(keys.iter().cloned()),
            Command::IncrBy { key, delta } => {
                args.push(key.clone());
                args.push(delta.to_string());
            }
            Command::LPush { key, value } => {
                args.push(key.clone());
                args.push(value.clone());
            }
            Command::HSet { key, field, value } => {
                args.push(key.clone());
                args.push(field.clone());
                args.push(value.clone());
            }
            Command::SAdd { key, member } => {
                args.push(key.clone());
                args.push(member.clone());
            }
            Command::Subscribe { channels } | Command::Unsubscribe { channels } => {
                args.extend(channels.iter().cloned());
            }
            Command::Publish { channel, payload } => {
                args.push(channel.clone());
                args.push(payload.clone());
            }
            Command::Ping | Command::Info => {}
        }
        args
    }
}
