use crate::domain::{config::{Parity, PortConfig}, error::PortLabResult};

/// Access point to the OS serial subsystem: port enumeration and opening.
///
/// A session holds a shared backend and asks it for a handle when opened;
/// everything else in the crate is written against these traits so tests can
/// substitute [`VirtualBackend`](crate::infrastructure::serial::VirtualBackend)
/// for real hardware.
pub trait SerialBackend: Send + Sync {
    /// Names of the ports the OS currently reports.
    fn port_names(&self) -> PortLabResult<Vec<String>>;

    /// Opens `name` with `config`. The returned handle exclusively owns the
    /// underlying port until dropped or shut down.
    fn open(&self, name: &str, config: &PortConfig) -> PortLabResult<Box<dyn SerialHandle>>;
}

/// One open serial port. All calls are blocking OS calls; the receive task
/// and the consumer serialize access through a mutex around the handle.
pub trait SerialHandle: Send {
    /// Writes the whole buffer.
    fn write_bytes(&mut self, data: &[u8]) -> PortLabResult<()>;

    /// Number of bytes currently buffered by the driver.
    fn bytes_to_read(&mut self) -> PortLabResult<usize>;

    /// Reads into `buf`, returning the number of bytes read.
    fn read_buffered(&mut self, buf: &mut [u8]) -> PortLabResult<usize>;

    fn set_baud_rate(&mut self, baud_rate: u32) -> PortLabResult<()>;

    fn set_parity(&mut self, parity: Parity) -> PortLabResult<()>;

    fn set_data_bits(&mut self, data_bits: u8) -> PortLabResult<()>;

    fn set_dtr(&mut self, enabled: bool) -> PortLabResult<()>;

    fn set_rts(&mut self, enabled: bool) -> PortLabResult<()>;

    /// Releases the port. Dropping the handle releases it too; this exists so
    /// a close failure can be observed and absorbed into the session status.
    fn shutdown(&mut self) -> PortLabResult<()>;
}
