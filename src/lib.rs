//! Portlab Library
//!
//! Serial port session management: port discovery, a registry of per-port
//! sessions reconciled against the OS port list, and event-driven send and
//! receive over each open port.

pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::event::{
    ConfigEvent, ConfigPhase, Direction, LogEvent, PortStatus, StatusChangeEvent,
};
pub use crate::core::parser::{parse_byte_sequence, NumericStyle};
pub use crate::core::session::{PortSession, SessionRegistry};
pub use crate::domain::config::{Parity, PortConfig, ResponseMode};
pub use crate::domain::error::{PortLabError, PortLabResult};
pub use crate::infrastructure::config::LabConfig;
pub use crate::infrastructure::serial::{SerialBackend, SerialHandle, SystemBackend, VirtualBackend};
