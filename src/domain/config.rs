use serde::{Deserialize, Serialize};

/// Per-port configuration. Mutable at any time through the owning
/// [`PortSession`](crate::core::session::PortSession), even while stopped;
/// changes write through to a live handle where the hardware supports it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortConfig {
    /// Serial baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Parity-checking protocol
    #[serde(default)]
    pub parity: Parity,
    /// Data bits per byte
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Data Terminal Ready line state
    #[serde(default)]
    pub dtr: bool,
    /// Request To Send line state
    #[serde(default)]
    pub rts: bool,
    /// Whether the consumer intends this port to be opened
    #[serde(default)]
    pub listen: bool,
    /// How incoming bytes are decoded into log entries
    #[serde(default)]
    pub response_mode: ResponseMode,
}

/// Parity-checking protocol.
///
/// `Mark` and `Space` are part of the domain model but not every backend
/// supports them; an unsupported parity is rejected at open time as a
/// configuration error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
    Mark,
    Space,
}

/// How a session turns received bytes into a log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Decode the buffered bytes as text
    Text,
    /// Render the buffered bytes as a hyphen-separated hex dump
    Bytes,
}

// Default value functions
fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            parity: Parity::default(),
            data_bits: default_data_bits(),
            dtr: false,
            rts: false,
            listen: false,
            response_mode: ResponseMode::default(),
        }
    }
}

impl Default for Parity {
    fn default() -> Self {
        Parity::None
    }
}

impl Default for ResponseMode {
    fn default() -> Self {
        ResponseMode::Text
    }
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parity::None => write!(f, "None"),
            Parity::Even => write!(f, "Even"),
            Parity::Odd => write!(f, "Odd"),
            Parity::Mark => write!(f, "Mark"),
            Parity::Space => write!(f, "Space"),
        }
    }
}
