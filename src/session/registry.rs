//! Session registry
//!
//! Tracks live sessions and publishes read-only snapshots for status
//! display. Sessions own their pipelines; the registry only ever holds
//! copies of presentation state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::{Button, EnabledSources};

/// Capacity of the change notification channel
const EVENT_CAPACITY: usize = 256;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Transport open, no `hello` yet
    Connected,
    /// `hello` received
    Identified,
    /// `config` accepted, sensor data flowing
    Configured,
}

/// Read-only view of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Session identifier
    pub id: SessionId,
    /// Remote address
    pub peer: String,
    /// Transport still open
    pub connected: bool,
    /// Lifecycle phase
    pub phase: SessionPhase,
    /// Client build reported in `hello`
    pub client_version: Option<String>,
    /// Device description reported in `hello`
    pub device: Option<String>,
    /// Negotiated sources
    pub enabled: Option<EnabledSources>,
    /// Accumulated horizontal motion sent to the pointer
    pub moved_x: i64,
    /// Accumulated vertical motion sent to the pointer
    pub moved_y: i64,
    /// Most recent button named by a click
    pub last_button: Option<Button>,
    /// Buttons currently held
    pub held_buttons: Vec<Button>,
    /// Registration time
    pub connected_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn new(id: SessionId, peer: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            peer,
            connected: true,
            phase: SessionPhase::Connected,
            client_version: None,
            device: None,
            enabled: None,
            moved_x: 0,
            moved_y: 0,
            last_button: None,
            held_buttons: Vec::new(),
            connected_at: now,
            updated_at: now,
        }
    }
}

/// Change notification
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "session", rename_all = "lowercase")]
pub enum RegistryEvent {
    /// Session registered
    Added(SessionSnapshot),
    /// Session state changed
    Updated(SessionSnapshot),
    /// Session gone; final state
    Removed(SessionSnapshot),
}

impl RegistryEvent {
    /// Snapshot carried by the event
    pub fn snapshot(&self) -> &SessionSnapshot {
        match self {
            RegistryEvent::Added(s) | RegistryEvent::Updated(s) | RegistryEvent::Removed(s) => s,
        }
    }
}

/// Registry of live sessions
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionSnapshot>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sessions: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Register a new connection
    pub async fn register(&self, peer: impl Into<String>) -> SessionId {
        let id = SessionId::new();
        let snapshot = SessionSnapshot::new(id, peer.into());
        info!("Session {} registered from {}", id, snapshot.peer);

        self.sessions.write().await.insert(id, snapshot.clone());
        self.publish(RegistryEvent::Added(snapshot));
        id
    }

    /// Apply a change to a session's snapshot
    ///
    /// Notifies subscribers only if something other than the timestamp
    /// changed. Returns `false` for unknown sessions.
    pub async fn update<F>(&self, id: &SessionId, f: F) -> bool
    where
        F: FnOnce(&mut SessionSnapshot),
    {
        let changed = {
            let mut sessions = self.sessions.write().await;
            let Some(snapshot) = sessions.get_mut(id) else {
                return false;
            };
            let before = snapshot.clone();
            f(snapshot);
            snapshot.updated_at = before.updated_at;
            if *snapshot == before {
                None
            } else {
                snapshot.updated_at = Utc::now();
                Some(snapshot.clone())
            }
        };

        if let Some(snapshot) = changed {
            self.publish(RegistryEvent::Updated(snapshot));
        }
        true
    }

    /// Remove a session, returning its final snapshot
    pub async fn unregister(&self, id: &SessionId) -> Option<SessionSnapshot> {
        let mut snapshot = self.sessions.write().await.remove(id)?;
        snapshot.connected = false;
        snapshot.updated_at = Utc::now();
        info!("Session {} unregistered", id);
        self.publish(RegistryEvent::Removed(snapshot.clone()));
        Some(snapshot)
    }

    /// Current snapshot of one session
    pub async fn snapshot(&self, id: &SessionId) -> Option<SessionSnapshot> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Current snapshots of all sessions, oldest first
    pub async fn snapshots(&self) -> Vec<SessionSnapshot> {
        let mut all: Vec<_> = self.sessions.read().await.values().cloned().collect();
        all.sort_by_key(|s| s.connected_at);
        all
    }

    /// Number of live sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: RegistryEvent) {
        // No subscribers is fine
        if self.events.send(event).is_err() {
            debug!("No registry subscribers");
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
