//! Connection handling for TCP clients

use crate::protocol::{Command, Parser, Response};
use crate::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tracing::debug;

// Upper bound on `*N` array headers; anything larger is malformed.
const MAX_ARGS: usize = 128;

/// Represents a client connection using split read/write halves.
///
/// Inbound bytes accumulate in a persistent buffer so a read that loses a
/// `select!` race against an outbound broadcast never drops part of a frame.
pub struct Connection {
    reader: BufReader<tokio::io::ReadHalf<TcpStream>>,
    writer: BufWriter<tokio::io::WriteHalf<TcpStream>>,
    inbound: Vec<u8>,
}

impl Connection {
    /// Create new connection wrapper by splitting the socket.
    pub fn new(socket: TcpStream) -> Self {
        let (reader, writer) = tokio::io::split(socket);
        Connection {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            inbound: Vec::new(),
        }
    }

    /// Read the next command from the connection. Returns `Ok(None)` when
    /// the client closes the connection. A malformed command is answered
    /// with an error response here and surfaces as `Error::Protocol`; the
    /// connection remains usable.
    pub async fn read_command(&mut self) -> Result<Option<Command>> {
        loop {
            match self.take_frame() {
                Ok(Some(frame)) => {
                    if frame.trim().is_empty() {
                        continue;
                    }

                    debug!("Received: {:?}", frame.trim());

                    return match Parser::parse_command(&frame) {
                        Ok(command) => Ok(Some(command)),
                        Err(e) => {
                            self.write_response(Response::Error(e.to_string())).await?;
                            Err(e)
                        }
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    self.write_response(Response::Error(e.to_string())).await?;
                    return Err(e);
                }
            }

            let bytes_read = self.reader.read_until(b'\n', &mut self.inbound).await?;
            if bytes_read == 0 {
                return Ok(None); // Connection closed
            }
        }
    }

    /// Write a response to the connection.
    pub async fn write_response(&mut self, response: Response) -> Result<()> {
        let resp_string = response.to_resp();
        debug!("Sending: {:?}", resp_string.trim());

        self.writer.write_all(resp_string.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Split one complete frame off the front of the inbound buffer.
    fn take_frame(&mut self) -> Result<Option<String>> {
        let end = match frame_end(&self.inbound) {
            Some(end) => end,
            None => return Ok(None),
        };

        let bytes: Vec<u8> = self.inbound.drain(..end).collect();
        match String::from_utf8(bytes) {
            Ok(frame) => Ok(Some(frame)),
            Err(_) => Err(Error::Protocol("invalid UTF-8 in request".to_string())),
        }
    }
}

/// Byte length of the first complete frame in the buffer, if one is there.
///
/// An array frame (`*N`) spans N*2 lines for the elements plus 1 for the
/// header; anything else is a single line. A header that does not parse, or
/// that claims an absurd element count, is handed over as a one-line frame
/// so the parser can reject it.
fn frame_end(buffer: &[u8]) -> Option<usize> {
    let first_line_end = buffer.iter().position(|&b| b == b'\n').map(|idx| idx + 1);
    if buffer.first() != Some(&b'*') {
        return first_line_end;
    }

    let header_end = first_line_end?;
    let num_elements = std::str::from_utf8(&buffer[1..header_end])
        .ok()
        .and_then(|header| header.trim().parse::<usize>().ok())
        .filter(|&n| n <= MAX_ARGS);
    let num_elements = match num_elements {
        Some(n) => n,
        None => return first_line_end,
    };

    let expected_terminators = 1 + num_elements * 2;
    let mut seen = 0;
    for idx in 0..buffer.len().saturating_sub(1) {
        if buffer[idx] == b'\r' && buffer[idx + 1] == b'\n' {
            seen += 1;
            if seen == expected_terminators {
                return Some(idx + 2);
            }
        }
    }
    None
}
