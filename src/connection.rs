//! Per-connection read and write loops
//!
//! Each connection owns a bounded reply channel. The read loop turns frames
//! into commands carrying a sender for that channel and submits them to the
//! shared inbound queue; the write loop drains the channel back onto the
//! socket. Either loop ending brings the other one down:
//!
//! - the read loop drops its sender when it stops, so the write loop ends once
//!   the store actor has answered everything still queued;
//! - the write loop drops the receiver when a write fails, which the read loop
//!   observes through `Sender::closed`.

use crate::config::{Delimiters, ServerConfig};
use crate::protocol::{parse_frame, Command, ReplySender};
use bytes::Bytes;
use std::io;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

/// Lifecycle of a client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    /// Read and write loops running
    Active,
    /// One of the loops has exited
    Closing,
    /// Socket released
    Closed,
}

/// Why the read loop stopped
#[derive(Debug)]
enum CloseReason {
    Eof,
    Read,
    FrameTooLong,
    WriterClosed,
    ActorStopped,
    Shutdown,
}

/// A client session over any byte stream
pub struct Connection<S> {
    stream: S,
    peer: String,
    inbound: mpsc::Sender<Command>,
    delimiters: Delimiters,
    reply_capacity: usize,
    max_frame_len: usize,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(
        stream: S,
        peer: impl Into<String>,
        inbound: mpsc::Sender<Command>,
        config: &ServerConfig,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            stream,
            peer: peer.into(),
            inbound,
            delimiters: config.delimiters,
            reply_capacity: config.reply_capacity,
            max_frame_len: config.max_frame_len,
            shutdown_rx,
        }
    }

    /// Run the connection until both loops have finished
    pub async fn serve(self) -> ConnectionState {
        let Connection {
            stream,
            peer,
            inbound,
            delimiters,
            reply_capacity,
            max_frame_len,
            mut shutdown_rx,
        } = self;
        let mut state = ConnectionState::Accepted;

        let (reader, writer) = tokio::io::split(stream);
        let (reply_tx, reply_rx) = mpsc::channel(reply_capacity);

        let writer_task = tokio::spawn(write_loop(
            writer,
            reply_rx,
            delimiters.message,
            peer.clone(),
        ));
        advance(&peer, &mut state, ConnectionState::Active);

        let reason = read_loop(
            BufReader::new(reader),
            &reply_tx,
            &inbound,
            &delimiters,
            max_frame_len,
            &mut shutdown_rx,
            &peer,
        )
        .await;
        debug!(peer = %peer, reason = ?reason, "read loop finished");
        advance(&peer, &mut state, ConnectionState::Closing);

        drop(reply_tx);
        if let Err(e) = writer_task.await {
            debug!(peer = %peer, error = %e, "write loop task failed");
        }
        advance(&peer, &mut state, ConnectionState::Closed);
        state
    }
}

fn advance(peer: &str, state: &mut ConnectionState, next: ConnectionState) {
    debug!(peer, from = ?*state, to = ?next, "connection state");
    *state = next;
}

async fn read_loop<R>(
    mut reader: BufReader<R>,
    reply_tx: &ReplySender,
    inbound: &mpsc::Sender<Command>,
    delimiters: &Delimiters,
    max_frame_len: usize,
    shutdown_rx: &mut broadcast::Receiver<()>,
    peer: &str,
) -> CloseReason
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut frame = Vec::new();

        let read = tokio::select! {
            result = read_frame(&mut reader, delimiters.message, max_frame_len, &mut frame) => result,
            _ = reply_tx.closed() => return CloseReason::WriterClosed,
            _ = shutdown_rx.recv() => return CloseReason::Shutdown,
        };

        match read {
            Ok(0) => return CloseReason::Eof,
            Ok(_) => {}
            Err(e) => {
                debug!(peer, error = %e, "read failed");
                return CloseReason::Read;
            }
        }

        if frame.last() != Some(&delimiters.message) {
            if frame.len() > max_frame_len {
                debug!(peer, max_frame_len, "frame exceeds maximum length");
                return CloseReason::FrameTooLong;
            }
            // A frame cut off by EOF is never submitted
            return CloseReason::Eof;
        }
        frame.pop();

        let request = match parse_frame(Bytes::from(frame), delimiters) {
            Ok(request) => request,
            Err(e) => {
                trace!(peer, error = %e, "dropping frame");
                continue;
            }
        };

        let command = request.into_command(reply_tx.clone());
        tokio::select! {
            sent = inbound.send(command) => {
                if sent.is_err() {
                    return CloseReason::ActorStopped;
                }
            }
            _ = shutdown_rx.recv() => return CloseReason::Shutdown,
        }
    }
}

/// Read up to and including the next message delimiter, giving up after
/// `max_frame_len + 1` bytes
async fn read_frame<R>(
    reader: &mut R,
    delim: u8,
    max_frame_len: usize,
    frame: &mut Vec<u8>,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let limit = (max_frame_len as u64).saturating_add(1);
    let mut limited = reader.take(limit);
    limited.read_until(delim, frame).await
}

async fn write_loop<W>(
    mut writer: W,
    mut replies: mpsc::Receiver<Bytes>,
    message_delim: u8,
    peer: String,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = replies.recv().await {
        let mut frame = Vec::with_capacity(reply.len() + 1);
        frame.extend_from_slice(&reply);
        frame.push(message_delim);

        if let Err(e) = writer.write_all(&frame).await {
            debug!(peer = %peer, error = %e, "write failed");
            break;
        }
    }
    trace!(peer = %peer, "write loop finished");
}
