//! Parser for wire protocol commands

use crate::protocol::Command;
use crate::{Error, Result};

pub struct Parser;

impl Parser {
    /// Parse a command from RESP (Redis Serialization Protocol) format
    pub fn parse_command(input: &str) -> Result<Command> {
        let input = input.trim();

        if input.is_empty() {
            return Err(Error::Protocol("empty command".to_string()));
        }

        // Handle array format (*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n)
        if input.starts_with('*') {
            return Self::parse_array_command(input);
        }

        // Handle simple string format (SET key value)
        Self::parse_simple_command(input)
    }

    fn parse_array_command(input: &str) -> Result<Command> {
        let lines: Vec<&str> = input.split("\r\n").collect();

        if lines.is_empty() {
            return Err(Error::Protocol("invalid array format".to_string()));
        }

        // Parse array length
        let array_len = lines[0][1..]
            .parse::<usize>()
            .map_err(|_| Error::Protocol("invalid array length".to_string()))?;

        let mut args = Vec::new();
        let mut i = 1;

        for _ in 0..array_len {
            if i >= lines.len() || !lines[i].starts_with('$') {
                return Err(Error::Protocol("invalid bulk string format".to_string()));
            }

            let str_len = lines[i][1..]
                .parse::<usize>()
                .map_err(|_| Error::Protocol("invalid string length".to_string()))?;

            i += 1;
            if i >= lines.len() {
                return Err(Error::Protocol("missing string data".to_string()));
            }

            let arg = lines[i];
            if arg.len() != str_len {
                return Err(Error::Protocol("string length mismatch".to_string()));
            }

            args.push(arg.to_string());
            i += 1;
        }

        Self::from_args(args)
    }

    fn parse_simple_command(input: &str) -> Result<Command> {
        let args: Vec<String> = input.split_whitespace().map(|s| s.to_string()).collect();

        if args.is_empty() {
            return Err(Error::Protocol("no command provided".to_string()));
        }

        Self::from_args(args)
    }

    /// Build a command from its argument list. Public so clients can reuse
    /// the same arity checks the server applies.
    pub fn from_args(args: Vec<String>) -> Result<Command> {
        if args.is_empty() {
            return Err(Error::Protocol("no command provided".to_string()));
        }

        let cmd = args[0].to_uppercase();

        match cmd.as_str() {
            "SET" => {
                require_arity(&cmd, &args, 3)?;
                Ok(Command::Set {
                    key: args[1].clone(),
                    value: args[2].clone(),
                })
            }
            "GET" => {
                require_arity(&cmd, &args, 2)?;
                Ok(Command::Get {
                    key: args[1].clone(),
                })
            }
            "DEL" => {
                if args.len() < 2 {
                    return Err(wrong_arity(&cmd));
                }
                Ok(Command::Del {
                    keys: args[1..].to_vec(),
                })
            }
            "INCR" => {
                require_arity(&cmd, &args, 2)?;
                Ok(Command::Incr {
                    key: args[1].clone(),
                })
            }
            "INCRBY" => {
                require_arity(&cmd, &args, 3)?;
                let delta = args[2].parse::<i64>().map_err(|_| Error::NotInteger)?;
                Ok(Command::IncrBy {
                    key: args[1].clone(),
                    delta,
                })
            }
            "LPUSH" => {
                require_arity(&cmd, &args, 3)?;
                Ok(Command::LPush {
                    key: args[1].clone(),
                    value: args[2].clone(),
                })
            }
            "LPOP" => {
                require_arity(&cmd, &args, 2)?;
                Ok(Command::LPop {
                    key: args[1].clone(),
                })
            }
            "LLEN" => {
                require_arity(&cmd, &args, 2)?;
                Ok(Command::LLen {
                    key: args[1].clone(),
                })
            }
            "HSET" => {
                require_arity(&cmd, &args, 4)?;
                Ok(Command::HSet {
                    key: args[1].clone(),
                    field: args[2].clone(),
                    value: args[3].clone(),
                })
            }
            "HGETALL" => {
                require_arity(&cmd, &args, 2)?;
                Ok(Command::HGetAll {
                    key: args[1].clone(),
                })
            }
            "SADD" => {
                require_arity(&cmd, &args, 3)?;
                Ok(Command::SAdd {
                    key: args[1].clone(),
                    member: args[2].clone(),
                })
            }
            "SMEMBERS" => {
                require_arity(&cmd, &args, 2)?;
                Ok(Command::SMembers {
                    key: args[1].clone(),
                })
            }
            "SUBSCRIBE" => {
                if args.len() < 2 {
                    return Err(wrong_arity(&cmd));
                }
                Ok(Command::Subscribe {
                    channels: args[1..].to_vec(),
                })
            }
            // UNSUBSCRIBE with no channels drops every subscription
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe {
                channels: args[1..].to_vec(),
            }),
            "PUBLISH" => {
                require_arity(&cmd, &args, 3)?;
                Ok(Command::Publish {
                    channel: args[1].clone(),
                    payload: args[2].clone(),
                })
            }
            "PING" => Ok(Command::Ping),
            "INFO" => Ok(Command::Info),
            _ => Err(Error::Protocol(format!("unknown command '{}'", cmd))),
        }
    }
}

fn require_arity(cmd: &str, args: &[String], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(wrong_arity(cmd));
    }
    Ok(())
}

fn wrong_arity(cmd: &str) -> Error {
    Error::Protocol(format!(
        "wrong number of arguments for '{}' command",
        cmd.to_lowercase()
    ))
}
