use crate::domain::{
    config::{Parity, PortConfig},
    error::{PortLabError, PortLabResult},
};
use crate::infrastructure::serial::backend::{SerialBackend, SerialHandle};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory serial backend.
///
/// Behaves like the OS subsystem without hardware: a scriptable port list,
/// exclusive opens, injectable inbound bytes, recorded outbound bytes and
/// per-port failure switches. This is what the test suite runs sessions
/// against; it also works for demos on machines without serial ports.
#[derive(Clone, Default)]
pub struct VirtualBackend {
    state: Arc<Mutex<VirtualState>>,
}

#[derive(Default)]
struct VirtualState {
    ports: Vec<String>,
    open: HashSet<String>,
    fail_open: HashSet<String>,
    fail_write: HashSet<String>,
    fail_read: HashSet<String>,
    fail_shutdown: HashSet<String>,
    written: HashMap<String, Vec<u8>>,
    inbound: HashMap<String, VecDeque<u8>>,
    applied: HashMap<String, PortConfig>,
}

impl VirtualBackend {
    pub fn new<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::default();
        backend.set_ports(ports);
        backend
    }

    /// Replaces the OS-visible port list. Already-open handles keep working;
    /// only enumeration changes.
    pub fn set_ports<I, S>(&self, ports: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock();
        state.ports = ports.into_iter().map(Into::into).collect();
    }

    /// Makes the next open of `name` fail with an access error.
    pub fn fail_open(&self, name: &str) {
        self.lock().fail_open.insert(name.to_string());
    }

    /// Makes every write on `name` fail.
    pub fn fail_write(&self, name: &str) {
        self.lock().fail_write.insert(name.to_string());
    }

    /// Makes the receive path on `name` fail, as a driver-reported
    /// transport error would.
    pub fn fail_read(&self, name: &str) {
        self.lock().fail_read.insert(name.to_string());
    }

    /// Makes closing `name` fail.
    pub fn fail_shutdown(&self, name: &str) {
        self.lock().fail_shutdown.insert(name.to_string());
    }

    /// Queues bytes for the receive path of `name`.
    pub fn inject(&self, name: &str, data: &[u8]) {
        let mut state = self.lock();
        state
            .inbound
            .entry(name.to_string())
            .or_default()
            .extend(data.iter().copied());
    }

    /// Everything written to `name` so far.
    pub fn written(&self, name: &str) -> Vec<u8> {
        self.lock().written.get(name).cloned().unwrap_or_default()
    }

    /// Whether `name` is currently held open by a handle.
    pub fn is_open(&self, name: &str) -> bool {
        self.lock().open.contains(name)
    }

    /// The configuration last applied to `name`, including write-throughs
    /// performed after open.
    pub fn applied_config(&self, name: &str) -> Option<PortConfig> {
        self.lock().applied.get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VirtualState> {
        // A panic while holding this mutex is a test bug; propagate it.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SerialBackend for VirtualBackend {
    fn port_names(&self) -> PortLabResult<Vec<String>> {
        Ok(self.lock().ports.clone())
    }

    fn open(&self, name: &str, config: &PortConfig) -> PortLabResult<Box<dyn SerialHandle>> {
        let mut state = self.lock();

        if !state.ports.iter().any(|p| p == name) {
            return Err(PortLabError::Config {
                message: format!("No such port: {}", name),
            });
        }
        if state.fail_open.remove(name) {
            return Err(PortLabError::Access {
                message: format!("Port {} is in use by another process", name),
            });
        }
        if !state.open.insert(name.to_string()) {
            return Err(PortLabError::State {
                message: format!("Port {} is already open", name),
            });
        }

        state.applied.insert(name.to_string(), config.clone());
        debug!("Virtual port {} opened", name);
        Ok(Box::new(VirtualHandle {
            name: name.to_string(),
            state: Arc::clone(&self.state),
            released: false,
        }))
    }
}

struct VirtualHandle {
    name: String,
    state: Arc<Mutex<VirtualState>>,
    released: bool,
}

impl VirtualHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.lock().open.remove(&self.name);
        }
    }

    fn transport_error(&self, what: &str) -> PortLabError {
        PortLabError::Io(io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("{} failed on virtual port {}", what, self.name),
        ))
    }
}

impl SerialHandle for VirtualHandle {
    fn write_bytes(&mut self, data: &[u8]) -> PortLabResult<()> {
        let mut state = self.lock();
        if state.fail_write.contains(&self.name) {
            drop(state);
            return Err(self.transport_error("write"));
        }
        state
            .written
            .entry(self.name.clone())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn bytes_to_read(&mut self) -> PortLabResult<usize> {
        let state = self.lock();
        if state.fail_read.contains(&self.name) {
            drop(state);
            return Err(self.transport_error("read"));
        }
        Ok(state.inbound.get(&self.name).map_or(0, VecDeque::len))
    }

    fn read_buffered(&mut self, buf: &mut [u8]) -> PortLabResult<usize> {
        let mut state = self.lock();
        if state.fail_read.contains(&self.name) {
            drop(state);
            return Err(self.transport_error("read"));
        }
        let queue = match state.inbound.get_mut(&self.name) {
            Some(queue) => queue,
            None => return Ok(0),
        };
        let mut count = 0;
        while count < buf.len() {
            match queue.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> PortLabResult<()> {
        if let Some(applied) = self.lock().applied.get_mut(&self.name) {
            applied.baud_rate = baud_rate;
        }
        Ok(())
    }

    fn set_parity(&mut self, parity: Parity) -> PortLabResult<()> {
        if let Some(applied) = self.lock().applied.get_mut(&self.name) {
            applied.parity = parity;
        }
        Ok(())
    }

    fn set_data_bits(&mut self, data_bits: u8) -> PortLabResult<()> {
        if let Some(applied) = self.lock().applied.get_mut(&self.name) {
            applied.data_bits = data_bits;
        }
        Ok(())
    }

    fn set_dtr(&mut self, enabled: bool) -> PortLabResult<()> {
        if let Some(applied) = self.lock().applied.get_mut(&self.name) {
            applied.dtr = enabled;
        }
        Ok(())
    }

    fn set_rts(&mut self, enabled: bool) -> PortLabResult<()> {
        if let Some(applied) = self.lock().applied.get_mut(&self.name) {
            applied.rts = enabled;
        }
        Ok(())
    }

    fn shutdown(&mut self) -> PortLabResult<()> {
        let failing = self.lock().fail_shutdown.remove(&self.name);
        self.release();
        if failing {
            return Err(self.transport_error("close"));
        }
        Ok(())
    }
}

impl Drop for VirtualHandle {
    fn drop(&mut self) {
        self.release();
    }
}
