//! Server configuration
//!
//! Everything here is plain data: the listen address, queue capacities, the
//! wire delimiters and the starting state of diagnostic logging. Values come
//! from defaults, a JSON file, or the command line.

use crate::error::{BeamStoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Byte delimiters used by the wire protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    /// Separates action, key and payload inside a frame
    #[serde(with = "delimiter_repr")]
    pub field: u8,
    /// Terminates a frame, both inbound and outbound
    #[serde(with = "delimiter_repr")]
    pub message: u8,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: b'\t',
            message: b'\n',
        }
    }
}

impl Delimiters {
    pub fn new(field: u8, message: u8) -> Self {
        Self { field, message }
    }

    pub fn validate(&self) -> Result<()> {
        if self.field == self.message {
            return Err(BeamStoreError::Config(format!(
                "field and message delimiters must differ (both are {})",
                escape_delimiter(self.field)
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Delimiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field={} message={}",
            escape_delimiter(self.field),
            escape_delimiter(self.message)
        )
    }
}

/// Parse a delimiter from its command-line or config-file form.
///
/// Accepts a single ASCII character or one of the escapes `\t`, `\n`, `\r`,
/// `\0`, `\\` and `\xHH`.
pub fn parse_delimiter(raw: &str) -> Result<u8> {
    let invalid = || BeamStoreError::Config(format!("invalid delimiter: {:?}", raw));

    let byte = match raw {
        "\\t" => b'\t',
        "\\n" => b'\n',
        "\\r" => b'\r',
        "\\0" => 0,
        "\\\\" => b'\\',
        _ if raw.len() == 4 && raw.starts_with("\\x") => {
            u8::from_str_radix(&raw[2..], 16).map_err(|_| invalid())?
        }
        _ => match raw.as_bytes() {
            [b] if b.is_ascii() => *b,
            _ => return Err(invalid()),
        },
    };
    Ok(byte)
}

/// Render a delimiter byte in the form accepted by [`parse_delimiter`]
pub fn escape_delimiter(byte: u8) -> String {
    match byte {
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        b'\r' => "\\r".to_string(),
        0 => "\\0".to_string(),
        b'\\' => "\\\\".to_string(),
        b' '..=b'~' => (byte as char).to_string(),
        _ => format!("\\x{:02x}", byte),
    }
}

mod delimiter_repr {
    use super::{escape_delimiter, parse_delimiter};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(byte: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&escape_delimiter(*byte))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_delimiter(&raw).map_err(de::Error::custom)
    }
}

/// BeamStore server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Capacity of the queue shared by all connections in front of the store actor
    pub inbound_capacity: usize,
    /// Capacity of each connection's reply channel
    pub reply_capacity: usize,
    /// Longest frame a connection accepts, message delimiter excluded
    pub max_frame_len: usize,
    pub delimiters: Delimiters,
    /// Start with per-command diagnostic logging enabled
    pub diagnostics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:12345".to_string(),
            inbound_capacity: 1024,
            reply_capacity: 1024,
            max_frame_len: 64 * 1024 * 1024,
            delimiters: Delimiters::default(),
            diagnostics: false,
        }
    }
}

impl ServerConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    pub fn reply_capacity(mut self, capacity: usize) -> Self {
        self.reply_capacity = capacity;
        self
    }

    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }

    pub fn delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(BeamStoreError::Config("bind address is empty".to_string()));
        }
        // tokio's bounded channels panic on a zero capacity
        if self.inbound_capacity == 0 {
            return Err(BeamStoreError::Config(
                "inbound queue capacity must be at least 1".to_string(),
            ));
        }
        if self.reply_capacity == 0 {
            return Err(BeamStoreError::Config(
                "reply channel capacity must be at least 1".to_string(),
            ));
        }
        if self.max_frame_len == 0 {
            return Err(BeamStoreError::Config(
                "maximum frame length must be at least 1".to_string(),
            ));
        }
        self.delimiters.validate()
    }
}
