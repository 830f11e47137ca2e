use thiserror::Error;

/// Portlab unified error type
#[derive(Error, Debug)]
pub enum PortLabError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid operation for current state: {message}")]
    State { message: String },

    #[error("Access denied: {message}")]
    Access { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl PortLabError {
    /// Whether this error is a read/write timeout. The receive loop treats
    /// timeouts as "no data yet" rather than a transport failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            PortLabError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            PortLabError::Serial(e) => {
                matches!(e.kind(), serialport::ErrorKind::Io(std::io::ErrorKind::TimedOut))
            }
            _ => false,
        }
    }
}

pub type PortLabResult<T> = Result<T, PortLabError>;
