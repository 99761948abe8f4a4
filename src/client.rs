//! Client library for connecting to a BeamStore server
//!
//! Replies carry no request id, so the client reads them in order. A wildcard
//! `get`/`con` produces an unknown number of replies; `get_all` and
//! `consume_all` collect until the server has been quiet for a while.

use crate::config::Delimiters;
use crate::error::{BeamStoreError, Result};
use crate::protocol::{encode_request, Action, WILDCARD};
use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// How long `get_all`/`consume_all` wait for another reply before giving up
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Client for connecting to a BeamStore server
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
    delimiters: Delimiters,
}

impl Client {
    /// Connect using the default delimiters
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with(addr, Delimiters::default()).await
    }

    /// Connect to a server configured with non-default delimiters
    pub async fn connect_with(addr: &str, delimiters: Delimiters) -> Result<Self> {
        delimiters.validate()?;
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
            delimiters,
        })
    }

    /// Send one command without waiting for any reply
    pub async fn send(&mut self, action: Action, key: &[u8], payload: &[u8]) -> Result<()> {
        if action.requires_key() && key.is_empty() {
            return Err(BeamStoreError::Client(format!("{} requires a key", action)));
        }
        if action.requires_key() && key.contains(&self.delimiters.field) {
            return Err(BeamStoreError::Client(
                "key contains the field delimiter".to_string(),
            ));
        }
        if key.contains(&self.delimiters.message) || payload.contains(&self.delimiters.message) {
            return Err(BeamStoreError::Client(
                "key or payload contains the message delimiter".to_string(),
            ));
        }

        let frame = encode_request(action, key, payload, &self.delimiters);
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Write raw bytes to the server, bypassing framing checks
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read the next reply, waiting as long as it takes
    pub async fn recv(&mut self) -> Result<Bytes> {
        let mut frame = Vec::new();
        let read = self
            .reader
            .read_until(self.delimiters.message, &mut frame)
            .await?;

        if read == 0 || frame.pop() != Some(self.delimiters.message) {
            return Err(BeamStoreError::Protocol(
                "connection closed while waiting for a reply".to_string(),
            ));
        }
        Ok(Bytes::from(frame))
    }

    /// Read the next reply, or `None` if nothing arrives within `wait`
    pub async fn recv_timeout(&mut self, wait: Duration) -> Result<Option<Bytes>> {
        match tokio::time::timeout(wait, self.recv()).await {
            Ok(reply) => reply.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn collect(&mut self, quiet: Duration) -> Result<Vec<Bytes>> {
        let mut replies = Vec::new();
        while let Some(reply) = self.recv_timeout(quiet).await? {
            replies.push(reply);
        }
        Ok(replies)
    }

    /// Store `value` at `key`
    pub async fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.send(Action::Put, key, value).await
    }

    /// Fetch the value at `key`; a missing key reads back as an empty value.
    ///
    /// The wildcard key is rejected, use [`Client::get_all`] instead.
    pub async fn get(&mut self, key: &[u8]) -> Result<Bytes> {
        reject_wildcard(key, "get_all")?;
        self.send(Action::Get, key, b"").await?;
        self.recv().await
    }

    /// Fetch every stored value
    pub async fn get_all(&mut self, quiet: Duration) -> Result<Vec<Bytes>> {
        self.send(Action::Get, WILDCARD, b"").await?;
        self.collect(quiet).await
    }

    /// Remove `key`; `*` removes everything
    pub async fn del(&mut self, key: &[u8]) -> Result<()> {
        self.send(Action::Del, key, b"").await
    }

    /// Fetch and remove the value at `key`.
    ///
    /// The wildcard key is rejected, use [`Client::consume_all`] instead.
    pub async fn consume(&mut self, key: &[u8]) -> Result<Bytes> {
        reject_wildcard(key, "consume_all")?;
        self.send(Action::Con, key, b"").await?;
        self.recv().await
    }

    /// Fetch and remove every stored value
    pub async fn consume_all(&mut self, quiet: Duration) -> Result<Vec<Bytes>> {
        self.send(Action::Con, WILDCARD, b"").await?;
        self.collect(quiet).await
    }

    /// Ask the server to log its key count
    pub async fn count(&mut self) -> Result<()> {
        self.send(Action::Cnt, b"", b"").await
    }

    /// Ask the server to log every entry
    pub async fn detail(&mut self) -> Result<()> {
        self.send(Action::Det, b"", b"").await
    }

    /// Toggle the server's per-command diagnostic logging
    pub async fn toggle_log(&mut self) -> Result<()> {
        self.send(Action::Log, b"", b"").await
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// A wildcard lookup can produce any number of replies, so the single-reply
/// calls refuse it
fn reject_wildcard(key: &[u8], instead: &str) -> Result<()> {
    if key == WILDCARD {
        return Err(BeamStoreError::Client(format!(
            "wildcard key needs {} to collect its replies",
            instead
        )));
    }
    Ok(())
}
