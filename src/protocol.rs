//! Wire protocol: actions, frame parsing and command definitions
//!
//! A frame is the bytes between two message delimiters. Inside a frame the
//! field delimiter separates the action token, the key and the payload:
//!
//! ```text
//! put<FD><key><FD><payload><MD>
//! get<FD><key><FD><MD>
//! cnt<FD><MD>
//! ```
//!
//! The payload is everything after the second field delimiter, so payloads may
//! contain the field delimiter themselves. Parsing uses nom. The payload is a
//! zero-copy slice of the frame buffer; the key is copied out because the
//! store keeps the first key it sees for an entry.

use crate::config::Delimiters;
use crate::error::FrameError;
use bytes::Bytes;
use nom::{
    bytes::complete::{tag, take_till},
    combinator::{opt, rest},
    sequence::{preceded, tuple},
    IResult,
};
use std::fmt;
use tokio::sync::mpsc;

/// Key addressing every entry in the store
pub const WILDCARD: &[u8] = b"*";

/// Channel a connection hands to the store actor for its replies
pub type ReplySender = mpsc::Sender<Bytes>;

/// Actions understood by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Store a payload at a key
    Put,
    /// Fetch the payload at a key, or every payload for `*`
    Get,
    /// Remove a key, or everything for `*`
    Del,
    /// Fetch then remove in one step
    Con,
    /// Log the number of stored keys
    Cnt,
    /// Log every stored entry
    Det,
    /// Toggle per-command diagnostic logging
    Log,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Put,
        Action::Get,
        Action::Del,
        Action::Con,
        Action::Cnt,
        Action::Det,
        Action::Log,
    ];

    pub fn from_token(token: &[u8]) -> Option<Self> {
        match token {
            b"put" => Some(Action::Put),
            b"get" => Some(Action::Get),
            b"del" => Some(Action::Del),
            b"con" => Some(Action::Con),
            b"cnt" => Some(Action::Cnt),
            b"det" => Some(Action::Det),
            b"log" => Some(Action::Log),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Put => "put",
            Action::Get => "get",
            Action::Del => "del",
            Action::Con => "con",
            Action::Cnt => "cnt",
            Action::Det => "det",
            Action::Log => "log",
        }
    }

    /// Whether a frame for this action is malformed without a non-empty key
    pub fn requires_key(&self) -> bool {
        matches!(self, Action::Put | Action::Get | Action::Del | Action::Con)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully parsed frame, not yet bound to a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub action: Action,
    pub key: Bytes,
    pub payload: Bytes,
}

impl Request {
    pub fn is_wildcard(&self) -> bool {
        self.key.as_ref() == WILDCARD
    }

    /// Bind the request to the reply channel of the connection that sent it
    pub fn into_command(self, reply: ReplySender) -> Command {
        Command {
            action: self.action,
            key: self.key,
            payload: self.payload,
            reply,
        }
    }
}

/// One client request on its way to the store actor
#[derive(Debug)]
pub struct Command {
    pub action: Action,
    pub key: Bytes,
    pub payload: Bytes,
    /// Owned by the issuing connection; the actor only sends on it
    pub reply: ReplySender,
}

impl Command {
    pub fn is_wildcard(&self) -> bool {
        self.key.as_ref() == WILDCARD
    }
}

type Fields<'a> = (&'a [u8], Option<&'a [u8]>, Option<&'a [u8]>);

/// Split a frame into action, key and the untouched remainder
fn split_fields(input: &[u8], delim: u8) -> IResult<&[u8], Fields<'_>> {
    let sep = [delim];
    let parsed = tuple((
        take_till(move |b: u8| b == delim),
        opt(preceded(tag(&sep[..]), take_till(move |b: u8| b == delim))),
        opt(preceded(tag(&sep[..]), rest)),
    ))(input);
    parsed
}

/// Parse one frame (message delimiter already stripped) into a request
pub fn parse_frame(frame: Bytes, delimiters: &Delimiters) -> Result<Request, FrameError> {
    if frame.is_empty() {
        return Err(FrameError::Empty);
    }

    let (_, (action, key, payload)) =
        split_fields(&frame, delimiters.field).map_err(|_| FrameError::Empty)?;

    let action = Action::from_token(action).ok_or_else(|| {
        FrameError::UnknownAction(String::from_utf8_lossy(action).into_owned())
    })?;

    let key = key.unwrap_or_default();
    if action.requires_key() && key.is_empty() {
        return Err(FrameError::MissingKey(action.as_str()));
    }

    Ok(Request {
        action,
        key: Bytes::copy_from_slice(key),
        payload: payload.map(|p| frame.slice_ref(p)).unwrap_or_default(),
    })
}

/// Build an outbound frame, including the trailing message delimiter
pub fn encode_request(action: Action, key: &[u8], payload: &[u8], delimiters: &Delimiters) -> Vec<u8> {
    let mut frame = Vec::with_capacity(action.as_str().len() + key.len() + payload.len() + 4);
    frame.extend_from_slice(action.as_str().as_bytes());
    frame.push(delimiters.field);
    if action.requires_key() {
        frame.extend_from_slice(key);
        frame.push(delimiters.field);
    }
    if action == Action::Put {
        frame.extend_from_slice(payload);
    }
    frame.push(delimiters.message);
    frame
}
