//! TCP client for connecting to a tidepool server

use crate::protocol::{Command, Response};
use crate::pubsub::Event;
use crate::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tracing::debug;

/// TCP client using split read/write halves.
pub struct TcpClient {
    reader: BufReader<tokio::io::ReadHalf<TcpStream>>,
    writer: BufWriter<tokio::io::WriteHalf<TcpStream>>,
}

impl TcpClient {
    /// Connect to a tidepool server.
    pub async fn connect(addr: &str) -> Result<Self> {
        let socket = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(socket);

        Ok(TcpClient {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
        })
    }

    /// Execute a command and get response.
    pub async fn execute(&mut self, command: Command) -> Result<Response> {
        let cmd_str = encode_resp(&command);
        debug!("Sending: {:?}", cmd_str.trim());
        self.writer.write_all(cmd_str.as_bytes()).await?;
        self.writer.flush().await?;

        self.read_response().await
    }

    /// Block until the next pub/sub delivery pushed to this connection.
    ///
    /// Intended for connections that have issued SUBSCRIBE and then only
    /// listen. Returns `Ok(None)` when the server closes the connection,
    /// which terminates the delivery stream.
    pub async fn next_event(&mut self) -> Result<Option<Event>> {
        match self.read_response().await {
            // Deliveries arrive as ["message", channel, payload] frames.
            Ok(Response::Array(items)) if items.len() == 3 && items[0] == "message" => {
                let mut items = items.into_iter();
                items.next();
                let channel = items.next().unwrap_or_default();
                let payload = items.next().unwrap_or_default();
                Ok(Some(Event { channel, payload }))
            }
            Ok(other) => Err(Error::Protocol(format!(
                "unexpected frame while listening: {:?}",
                other
            ))),
            Err(Error::Connection(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reads and parses a full response from the server.
    async fn read_response(&mut self) -> Result<Response> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(Error::Connection("Connection closed by server".into()));
        }

        let trimmed_line = line.trim();
        match trimmed_line.chars().next() {
            Some('+') => self.parse_simple_string(trimmed_line),
            Some('-') => Ok(Response::Error(trimmed_line[1..].to_string())),
            Some(':') => self.parse_integer(trimmed_line),
            Some('$') => self.parse_bulk_string(trimmed_line).await,
            Some('*') => self.parse_array(trimmed_line).await,
            _ => Err(Error::Protocol("invalid response format".to_string())),
        }
    }

    fn parse_simple_string(&self, line: &str) -> Result<Response> {
        let content = &line[1..];
        match content {
            "OK" => Ok(Response::Ok),
            "PONG" => Ok(Response::Pong),
            _ => Ok(Response::Value(content.to_string())),
        }
    }

    fn parse_integer(&self, line: &str) -> Result<Response> {
        line[1..]
            .parse::<i64>()
            .map(Response::Integer)
            .map_err(|_| Error::Protocol("invalid integer response".to_string()))
    }

    async fn parse_bulk_string(&mut self, line: &str) -> Result<Response> {
        let len: i64 = line[1..]
            .parse()
            .map_err(|_| Error::Protocol("invalid bulk string length".to_string()))?;

        if len == -1 {
            return Ok(Response::Nil);
        }

        let value = self.read_bulk_payload(len as usize).await?;
        if value.starts_with("# Server") {
            Ok(Response::Info(value))
        } else {
            Ok(Response::Value(value))
        }
    }

    async fn parse_array(&mut self, line: &str) -> Result<Response> {
        let count: i64 = line[1..]
            .parse()
            .map_err(|_| Error::Protocol("invalid array length".to_string()))?;

        if count == -1 {
            return Ok(Response::Nil);
        }

        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut header = String::new();
            if self.reader.read_line(&mut header).await? == 0 {
                return Err(Error::Connection("Connection closed mid-frame".into()));
            }

            let header = header.trim();
            if !header.starts_with('$') {
                return Err(Error::Protocol("expected bulk string in array".to_string()));
            }
            let len: usize = header[1..]
                .parse()
                .map_err(|_| Error::Protocol("invalid bulk string length".to_string()))?;

            items.push(self.read_bulk_payload(len).await?);
        }

        Ok(Response::Array(items))
    }

    async fn read_bulk_payload(&mut self, len: usize) -> Result<String> {
        let mut buffer = vec![0; len + 2]; // +2 for trailing \r\n
        self.reader.read_exact(&mut buffer).await?;

        String::from_utf8(buffer[..len].to_vec())
            .map_err(|_| Error::Protocol("invalid UTF-8 in bulk string".to_string()))
    }
}

/// Encode a command as a RESP array of bulk strings.
fn encode_resp(command: &Command) -> String {
    let args = command.to_args();
    let mut out = format!("*{}\r\n", args.len());
    for arg in &args {
        out.push_str(&format!("${}\r\n{}\r\n", arg.len(), arg));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_encode_as_resp_arrays() {
        let encoded = encode_resp(&Command::Set {
            key: "key".into(),
            value: "value".into(),
        });
        assert_eq!(encoded, "*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n");
    }

    #[test]
    fn unicode_arguments_use_byte_lengths() {
        let encoded = encode_resp(&Command::Set {
            key: "mystr".into(),
            value: "Hello world! 🙂".into(),
        });
        assert!(encoded.contains("$17\r\nHello world! 🙂\r\n"));
    }
}
