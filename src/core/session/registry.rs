use crate::core::parser::{parse_byte_sequence, NumericStyle};
use crate::core::session::session::PortSession;
use crate::domain::{
    config::PortConfig,
    error::{PortLabError, PortLabResult},
};
use crate::infrastructure::serial::SerialBackend;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The owning collection of port sessions, kept in sync with the OS-visible
/// port list.
///
/// Sessions are keyed by their immutable port name and held in insertion
/// order, which is the order consumers display them in. The registry is the
/// only actor that adds or removes sessions; removal releases the session's
/// handle.
pub struct SessionRegistry {
    sessions: Vec<PortSession>,
    backend: Arc<dyn SerialBackend>,
    defaults: PortConfig,
    poll_interval: Option<Duration>,
}

impl SessionRegistry {
    /// Creates an empty registry discovering ports through `backend`.
    pub fn new(backend: Arc<dyn SerialBackend>) -> Self {
        Self::with_defaults(backend, PortConfig::default())
    }

    /// Creates an empty registry whose newly discovered sessions start from
    /// `defaults` instead of [`PortConfig::default`].
    pub fn with_defaults(backend: Arc<dyn SerialBackend>, defaults: PortConfig) -> Self {
        Self {
            sessions: Vec::new(),
            backend,
            defaults,
            poll_interval: None,
        }
    }

    /// Receive poll interval handed to sessions created by reconciliation.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = Some(interval);
    }

    /// Diffs the tracked sessions against the OS port list: sessions whose
    /// port disappeared are removed and released, unseen ports get a new
    /// stopped session with the default configuration, and surviving
    /// sessions keep their configuration and status untouched. Calling this
    /// twice with no OS-side change is a no-op the second time.
    pub async fn reconcile(&mut self) -> PortLabResult<()> {
        let ports = self.backend.port_names()?;

        let before = self.sessions.len();
        self.sessions
            .retain(|session| ports.iter().any(|port| port == session.name()));
        let removed = before - self.sessions.len();

        let mut added = 0;
        for port in &ports {
            if self.try_get(port).is_none() {
                let mut session =
                    PortSession::with_config(port, self.defaults.clone(), Arc::clone(&self.backend))?;
                if let Some(interval) = self.poll_interval {
                    session.set_poll_interval(interval);
                }
                self.insert(session)?;
                added += 1;
            }
        }

        if removed > 0 || added > 0 {
            info!(
                "Reconciled port registry: {} added, {} removed, {} tracked",
                added,
                removed,
                self.sessions.len()
            );
        } else {
            debug!("Reconciled port registry: no change, {} tracked", self.sessions.len());
        }
        Ok(())
    }

    /// Adds a session to the registry. An empty name or a name already
    /// tracked is a hard error, unlike the absorbed failures elsewhere.
    pub fn insert(&mut self, session: PortSession) -> PortLabResult<()> {
        if session.name().is_empty() {
            return Err(PortLabError::Config {
                message: "Cannot register a session with an empty port name".to_string(),
            });
        }
        if self.try_get(session.name()).is_some() {
            return Err(PortLabError::State {
                message: format!("Port {} is already registered", session.name()),
            });
        }
        self.sessions.push(session);
        Ok(())
    }

    /// Removes and releases the named session. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|session| session.name() != name);
        before != self.sessions.len()
    }

    /// Exact-name lookup; empty keys are simply not found.
    pub fn try_get(&self, name: &str) -> Option<&PortSession> {
        if name.is_empty() {
            return None;
        }
        self.sessions.iter().find(|session| session.name() == name)
    }

    /// Mutable exact-name lookup; empty keys are simply not found.
    pub fn try_get_mut(&mut self, name: &str) -> Option<&mut PortSession> {
        if name.is_empty() {
            return None;
        }
        self.sessions
            .iter_mut()
            .find(|session| session.name() == name)
    }

    /// Opens every tracked session; each one no-ops unless its listen flag
    /// is set. Returns how many opened successfully.
    pub async fn open_all(&mut self) -> usize {
        let mut opened = 0;
        for session in &mut self.sessions {
            if session.open().await {
                opened += 1;
            }
        }
        opened
    }

    /// Closes every tracked session. Individual failures stay in that
    /// session's status; none is Running afterwards.
    pub async fn close_all(&mut self) {
        for session in &mut self.sessions {
            session.close().await;
        }
    }

    /// Sends one byte to every tracked session.
    pub async fn send_all_byte(&self, value: u8) {
        for session in &self.sessions {
            session.send_byte(value).await;
        }
    }

    /// Sends text to every tracked session.
    pub async fn send_all_text(&self, value: &str) {
        for session in &self.sessions {
            session.send_text(value).await;
        }
    }

    /// Sends raw bytes to every tracked session.
    pub async fn send_all_bytes(&self, value: &[u8]) {
        for session in &self.sessions {
            session.send_bytes(value).await;
        }
    }

    /// Parses `text` as a byte sequence under `style` and fans the result
    /// out to every tracked session. Empty text is a no-op.
    pub async fn parse_and_send(&self, text: &str, style: NumericStyle) {
        if text.is_empty() {
            return;
        }
        let bytes = parse_byte_sequence(text, style);
        self.send_all_bytes(&bytes).await;
    }

    /// Closes and releases every session, then empties the collection.
    pub async fn shutdown(&mut self) {
        self.close_all().await;
        self.sessions.clear();
        info!("Port registry shut down");
    }

    /// Tracked sessions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PortSession> {
        self.sessions.iter()
    }

    /// Tracked port names in insertion order.
    pub fn port_names(&self) -> Vec<String> {
        self.sessions
            .iter()
            .map(|session| session.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        // Dropping sessions releases their handles; a graceful close wants
        // an explicit shutdown() first.
        if !self.sessions.is_empty() {
            warn!(
                "Registry dropped with {} sessions still tracked",
                self.sessions.len()
            );
        }
    }
}
