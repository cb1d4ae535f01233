use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::command::{DELIMITER, SEEK_PREFIX};
use crate::Result;

/// `AesdClient` contains the functionality for communication with an [`AesdServer`].
///
/// Each request uses a fresh connection: the command is sent, then everything the server replies
/// with is read until it closes the connection.
///
/// [`AesdServer`]: ./struct.AesdServer.html
#[derive(Debug)]
pub struct AesdClient<A: ToSocketAddrs> {
    addr: A,
}

impl<A: ToSocketAddrs> AesdClient<A> {
    /// creates a client for the server at the given `addr`
    pub fn new(addr: A) -> Self {
        AesdClient { addr }
    }

    /// Appends `text` to the server's log. A newline is added unless `text` already ends in
    /// one.
    /// ## Returns
    /// the contents of the whole log, including `text`
    pub fn send(&self, text: &str) -> Result<Vec<u8>> {
        let mut command = text.as_bytes().to_vec();
        if command.last() != Some(&DELIMITER) {
            command.push(DELIMITER);
        }
        self.request(&command)
    }

    /// asks the server for its log starting at byte `write_cmd_offset` of command `write_cmd`
    /// ## Returns
    /// the log from that position on. An empty reply means the server rejected the position.
    pub fn seek_to(&self, write_cmd: u32, write_cmd_offset: u32) -> Result<Vec<u8>> {
        let mut command = SEEK_PREFIX.to_vec();
        command.extend_from_slice(format!("{},{}", write_cmd, write_cmd_offset).as_bytes());
        command.push(DELIMITER);
        self.request(&command)
    }

    /// sends the raw `command` bytes and collects the reply
    pub fn request(&self, command: &[u8]) -> Result<Vec<u8>> {
        let mut tcp = TcpStream::connect(&self.addr)?;
        tcp.write_all(command)?;
        tcp.flush()?;

        let mut reply = Vec::new();
        tcp.read_to_end(&mut reply)?;
        debug!(sent = command.len(), received = reply.len(), "request complete");
        Ok(reply)
    }
}
