use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Port session status.
///
/// `Running` means the underlying OS handle is open. Any failed OS operation
/// moves the session to `Error`; only a subsequent successful open or close
/// leaves that state again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PortStatus {
    /// Port is closed
    Stopped,
    /// Port is open and working
    Running,
    /// The last operation against the port failed
    Error,
}

/// Direction of a logged payload relative to the local machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// A decoded payload ready to be logged, published on the received/sent
/// event streams of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Name of the port the payload crossed
    pub source: String,
    /// When the payload was observed
    pub timestamp: DateTime<Local>,
    pub direction: Direction,
    /// Human-readable rendering of the payload
    pub entry: String,
}

impl LogEvent {
    pub fn new(source: impl Into<String>, direction: Direction, entry: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timestamp: Local::now(),
            direction,
            entry: entry.into(),
        }
    }

    /// Renders the event in the block format log-file consumers write:
    ///
    /// ```text
    /// [<timestamp>] <source>:<IN|OUT>
    /// -----------------
    /// <entry>
    /// ```
    /// followed by a blank line.
    pub fn format_block(&self) -> String {
        format!(
            "[{}] {}:{}\n-----------------\n{}\n\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.source,
            self.direction,
            self.entry
        )
    }
}

/// Published on a session's status stream every time its status is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeEvent {
    pub status: PortStatus,
}

/// Phase of a configuration mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPhase {
    /// Published before the property is written
    Changing,
    /// Published after the property is written
    Changed,
}

/// Pre/post hook pair around every configuration setter. Informational only;
/// publication does not gate the mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEvent {
    pub property: &'static str,
    pub phase: ConfigPhase,
}

impl std::fmt::Display for PortStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortStatus::Stopped => write!(f, "Stopped"),
            PortStatus::Running => write!(f, "Running"),
            PortStatus::Error => write!(f, "Error"),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Inbound => write!(f, "IN"),
            Direction::Outbound => write!(f, "OUT"),
        }
    }
}
