use crate::core::event::{
    ConfigEvent, ConfigPhase, Direction, LogEvent, PortStatus, StatusChangeEvent,
};
use crate::domain::{
    config::{Parity, PortConfig, ResponseMode},
    error::{PortLabError, PortLabResult},
};
use crate::infrastructure::serial::{SerialBackend, SerialHandle};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Default receive poll interval
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

type Subscribers<T> = RwLock<Vec<mpsc::UnboundedSender<T>>>;
type SharedHandle = Arc<Mutex<Box<dyn SerialHandle>>>;

/// One managed serial port connection.
///
/// A session wraps a single named port: its configuration, its
/// Stopped/Running/Error status machine and four event streams (data
/// received, data sent, status changed, configuration hooks). The port name
/// is the session's identity and is fixed at construction.
///
/// No recognized I/O failure escapes a session as an error value; every one
/// is absorbed into a transition to [`PortStatus::Error`], observable through
/// the status stream and [`status`](Self::status).
pub struct PortSession {
    inner: Arc<SessionInner>,
    backend: Arc<dyn SerialBackend>,
    handle: Option<SharedHandle>,
    rx_task: Option<tokio::task::JoinHandle<()>>,
    poll_interval: Duration,
}

/// State shared between the consumer-facing session and its receive task.
struct SessionInner {
    name: String,
    config: RwLock<PortConfig>,
    status: RwLock<PortStatus>,
    events: EventChannels,
}

#[derive(Default)]
struct EventChannels {
    received: Subscribers<LogEvent>,
    sent: Subscribers<LogEvent>,
    status: Subscribers<StatusChangeEvent>,
    config: Subscribers<ConfigEvent>,
}

impl PortSession {
    /// Creates a stopped session with default configuration.
    ///
    /// An empty name is a hard error; it is the session's registry key.
    pub fn new(name: impl Into<String>, backend: Arc<dyn SerialBackend>) -> PortLabResult<Self> {
        Self::with_config(name, PortConfig::default(), backend)
    }

    /// Creates a stopped session with the given configuration.
    pub fn with_config(
        name: impl Into<String>,
        config: PortConfig,
        backend: Arc<dyn SerialBackend>,
    ) -> PortLabResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(PortLabError::Config {
                message: "The port name is empty".to_string(),
            });
        }

        Ok(Self {
            inner: Arc::new(SessionInner {
                name,
                config: RwLock::new(config),
                status: RwLock::new(PortStatus::Stopped),
                events: EventChannels::default(),
            }),
            backend,
            handle: None,
            rx_task: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether an OS handle is currently attached.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub async fn status(&self) -> PortStatus {
        *self.inner.status.read().await
    }

    /// Snapshot of the current configuration.
    pub async fn config(&self) -> PortConfig {
        self.inner.config.read().await.clone()
    }

    /// How often the receive task polls the driver for buffered bytes.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    /// Opens the port with the current configuration.
    ///
    /// Returns false without touching the OS when the listen flag is unset.
    /// Any recognized open failure, including opening an already-open
    /// session, moves the status to Error and returns false. On success the
    /// status is Running before the first received byte can be published.
    pub async fn open(&mut self) -> bool {
        let config = self.inner.config.read().await.clone();
        if !config.listen {
            return false;
        }

        if self.handle.is_some() {
            warn!("Port {} is already open", self.inner.name);
            self.inner.transition(PortStatus::Error).await;
            return false;
        }

        match self.backend.open(&self.inner.name, &config) {
            Ok(handle) => {
                let handle: SharedHandle = Arc::new(Mutex::new(handle));
                self.handle = Some(Arc::clone(&handle));
                self.inner.transition(PortStatus::Running).await;
                // The receive task only holds a weak reference so that
                // dropping the session releases the port immediately.
                self.rx_task = Some(spawn_receiver(
                    Arc::clone(&self.inner),
                    Arc::downgrade(&handle),
                    self.poll_interval,
                ));
                info!("Port {} opened", self.inner.name);
                true
            }
            Err(e) => {
                warn!("Failed to open port {}: {}", self.inner.name, e);
                self.inner.transition(PortStatus::Error).await;
                false
            }
        }
    }

    /// Closes the port, moving the status to Stopped on success and Error on
    /// failure. Closing a session that is not open succeeds.
    ///
    /// The received and sent subscriber sets are cleared afterwards in every
    /// case; consumers must re-subscribe after a successful re-open. Status
    /// and configuration subscribers survive.
    pub async fn close(&mut self) {
        if let Some(task) = self.rx_task.take() {
            task.abort();
        }

        let result = match self.handle.take() {
            Some(handle) => handle.lock().await.shutdown(),
            None => Ok(()),
        };

        match result {
            Ok(()) => {
                info!("Port {} closed", self.inner.name);
                self.inner.transition(PortStatus::Stopped).await;
            }
            Err(e) => {
                warn!("Failed to close port {}: {}", self.inner.name, e);
                self.inner.transition(PortStatus::Error).await;
            }
        }

        self.inner.events.received.write().await.clear();
        self.inner.events.sent.write().await.clear();
    }

    /// Sends a single byte, logged as `Byte: <decimal>`.
    pub async fn send_byte(&self, value: u8) {
        self.write_and_log(&[value], || format!("Byte: {}", value))
            .await;
    }

    /// Sends UTF-8 text, logged verbatim. Empty input is a no-op.
    pub async fn send_text(&self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.write_and_log(value.as_bytes(), || value.to_string())
            .await;
    }

    /// Sends raw bytes, logged as `Bytes: XX XX XX`. Empty input is a no-op.
    pub async fn send_bytes(&self, value: &[u8]) {
        if value.is_empty() {
            return;
        }
        self.write_and_log(value, || format!("Bytes: {}", hex_spaced(value)))
            .await;
    }

    async fn write_and_log(&self, data: &[u8], entry: impl FnOnce() -> String) {
        // Not open: silent no-op, status untouched
        let Some(handle) = self.handle.as_ref().map(Arc::clone) else {
            return;
        };

        let result = handle.lock().await.write_bytes(data);
        match result {
            Ok(()) => {
                debug!("Sent {} bytes on {}", data.len(), self.inner.name);
                self.inner.publish_log(Direction::Outbound, entry()).await;
            }
            Err(e) => {
                warn!("Send failed on {}: {}", self.inner.name, e);
                self.inner.transition(PortStatus::Error).await;
            }
        }
    }

    /// Sets the listen flag; takes effect at the next open.
    pub async fn set_listen(&self, value: bool) {
        self.inner.notify(ConfigPhase::Changing, "listen").await;
        self.inner.config.write().await.listen = value;
        self.inner.notify(ConfigPhase::Changed, "listen").await;
    }

    /// Sets the baud rate, coercing negative input to its absolute value.
    /// Writes through to a live handle.
    pub async fn set_baud_rate(&self, value: i32) {
        let rate = value.unsigned_abs();
        self.inner.notify(ConfigPhase::Changing, "baud_rate").await;
        self.inner.config.write().await.baud_rate = rate;
        self.apply_live(|h| h.set_baud_rate(rate)).await;
        self.inner.notify(ConfigPhase::Changed, "baud_rate").await;
    }

    /// Sets the parity. Writes through to a live handle.
    pub async fn set_parity(&self, value: Parity) {
        self.inner.notify(ConfigPhase::Changing, "parity").await;
        self.inner.config.write().await.parity = value;
        self.apply_live(|h| h.set_parity(value)).await;
        self.inner.notify(ConfigPhase::Changed, "parity").await;
    }

    /// Sets the data bits. Writes through to a live handle.
    pub async fn set_data_bits(&self, value: u8) {
        self.inner.notify(ConfigPhase::Changing, "data_bits").await;
        self.inner.config.write().await.data_bits = value;
        self.apply_live(|h| h.set_data_bits(value)).await;
        self.inner.notify(ConfigPhase::Changed, "data_bits").await;
    }

    /// Sets the DTR line. Writes through to a live handle.
    pub async fn set_dtr(&self, value: bool) {
        self.inner.notify(ConfigPhase::Changing, "dtr").await;
        self.inner.config.write().await.dtr = value;
        self.apply_live(|h| h.set_dtr(value)).await;
        self.inner.notify(ConfigPhase::Changed, "dtr").await;
    }

    /// Sets the RTS line. Writes through to a live handle.
    pub async fn set_rts(&self, value: bool) {
        self.inner.notify(ConfigPhase::Changing, "rts").await;
        self.inner.config.write().await.rts = value;
        self.apply_live(|h| h.set_rts(value)).await;
        self.inner.notify(ConfigPhase::Changed, "rts").await;
    }

    /// Sets how received bytes are decoded. Effective from the next receive;
    /// carries no hook pair.
    pub async fn set_response_mode(&self, value: ResponseMode) {
        self.inner.config.write().await.response_mode = value;
    }

    /// Subscribes to inbound data events. Cleared on every close.
    pub async fn subscribe_received(&self) -> mpsc::UnboundedReceiver<LogEvent> {
        subscribe(&self.inner.events.received).await
    }

    /// Subscribes to outbound data events. Cleared on every close.
    pub async fn subscribe_sent(&self) -> mpsc::UnboundedReceiver<LogEvent> {
        subscribe(&self.inner.events.sent).await
    }

    /// Subscribes to status transitions. Survives close.
    pub async fn subscribe_status(&self) -> mpsc::UnboundedReceiver<StatusChangeEvent> {
        subscribe(&self.inner.events.status).await
    }

    /// Subscribes to the pre/post configuration hook pair. Survives close.
    pub async fn subscribe_config(&self) -> mpsc::UnboundedReceiver<ConfigEvent> {
        subscribe(&self.inner.events.config).await
    }

    /// Applies a mutation to the live handle, absorbing a failure into the
    /// Error status. No-op while closed.
    async fn apply_live<F>(&self, f: F)
    where
        F: FnOnce(&mut dyn SerialHandle) -> PortLabResult<()>,
    {
        let Some(handle) = self.handle.as_ref().map(Arc::clone) else {
            return;
        };

        let result = {
            let mut guard = handle.lock().await;
            f(guard.as_mut())
        };
        if let Err(e) = result {
            warn!("Failed to reconfigure port {}: {}", self.inner.name, e);
            self.inner.transition(PortStatus::Error).await;
        }
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        // The handle itself is released when its Arc unwinds.
        if let Some(task) = self.rx_task.take() {
            task.abort();
        }
    }
}

impl SessionInner {
    /// Assigns the status and publishes, in order: the hook pair around the
    /// mutation, then the status event. Observers therefore see the new
    /// status before any event that presumes it.
    async fn transition(&self, status: PortStatus) {
        self.notify(ConfigPhase::Changing, "status").await;
        *self.status.write().await = status;
        self.notify(ConfigPhase::Changed, "status").await;
        publish(&self.events.status, StatusChangeEvent { status }).await;
        debug!("Port {} status -> {}", self.name, status);
    }

    async fn notify(&self, phase: ConfigPhase, property: &'static str) {
        publish(&self.events.config, ConfigEvent { property, phase }).await;
    }

    async fn publish_log(&self, direction: Direction, entry: String) {
        let event = LogEvent::new(self.name.clone(), direction, entry);
        match direction {
            Direction::Inbound => publish(&self.events.received, event).await,
            Direction::Outbound => publish(&self.events.sent, event).await,
        }
    }
}

/// Fans an event out to every live subscriber, pruning closed ones.
async fn publish<T: Clone>(subscribers: &Subscribers<T>, event: T) {
    let mut subscribers = subscribers.write().await;
    subscribers.retain(|tx| tx.send(event.clone()).is_ok());
}

async fn subscribe<T>(subscribers: &Subscribers<T>) -> mpsc::UnboundedReceiver<T> {
    let (tx, rx) = mpsc::unbounded_channel();
    subscribers.write().await.push(tx);
    rx
}

/// Receive task: polls the driver for buffered bytes, decodes them under the
/// current response mode and publishes Inbound log events. A non-timeout
/// handle error is the driver reporting a transport fault; it moves the
/// session to Error and ends the task.
fn spawn_receiver(
    inner: Arc<SessionInner>,
    handle: Weak<Mutex<Box<dyn SerialHandle>>>,
    poll_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(poll_interval).await;

            // The session closed or was dropped
            let Some(handle) = handle.upgrade() else {
                break;
            };
            let mut port = handle.lock().await;
            let pending = match port.bytes_to_read() {
                Ok(0) => continue,
                Ok(n) => n,
                Err(e) if e.is_timeout() => continue,
                Err(e) => {
                    error!("Receive failed on {}: {}", inner.name, e);
                    drop(port);
                    inner.transition(PortStatus::Error).await;
                    break;
                }
            };

            let mut buffer = vec![0u8; pending];
            let read = match port.read_buffered(&mut buffer) {
                Ok(n) => n,
                Err(e) if e.is_timeout() => continue,
                Err(e) => {
                    error!("Receive failed on {}: {}", inner.name, e);
                    drop(port);
                    inner.transition(PortStatus::Error).await;
                    break;
                }
            };
            drop(port);

            if read == 0 {
                continue;
            }
            buffer.truncate(read);

            let entry = match inner.config.read().await.response_mode {
                ResponseMode::Text => String::from_utf8_lossy(&buffer).into_owned(),
                ResponseMode::Bytes => hex_hyphenated(&buffer),
            };
            debug!("Received {} bytes on {}", read, inner.name);
            inner.publish_log(Direction::Inbound, entry).await;
        }
    })
}

fn hex_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn hex_hyphenated(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join("-")
}
