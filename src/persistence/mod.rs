//! # Persistence
//!
//! Session, subscription, queued-message and retained-message state for a
//! broker, behind one contract with two backends.
//!
//! ## Components
//! - **Store**: Cloneable handle selecting a backend at construction
//! - **Backend**: Capability trait implemented by the memory and durable stores
//! - **Gate**: Shutdown gate draining in-flight operations before release
//! - **Record**: Field projection of PUBLISH and PUBREL packets
//!
//! ## Layout
//! ```text
//! sessions/<id>/subscriptions/<seq>  -> topic, qos
//! sessions/<id>/messages/in/<seq>    -> type, id, qos, topic, payload
//! sessions/<id>/messages/out/<seq>   -> type, id, qos, topic, payload
//! retained/<seq>                     -> type, id, qos, topic, payload
//! ```
//! Sequence numbers grow monotonically per bucket, so loads return
//! messages in insertion order.
//!
//! ## Shutdown
//! Every operation on every handle fails with `NotOpen` once
//! [`Store::shutdown`] has been called. Shutdown waits for operations
//! already running to finish before the backend releases its resources.
//!
//! ## Example
//! ```rust
//! use mqtt_wire::core::qos::QoS;
//! use mqtt_wire::persistence::{Direction, Store};
//! use mqtt_wire::protocol::{packet::Packet, publish::Publish};
//!
//! let store = Store::memory();
//! let session = store.sessions()?.new_session("client-1")?;
//! session.messages()?.store(
//!     Direction::Out,
//!     &[Packet::from(Publish::new("a/b", QoS::AtLeastOnce, "hi").with_packet_id(1))],
//! )?;
//! assert_eq!(session.messages()?.load()?.outgoing.len(), 1);
//! store.shutdown()?;
//! # Ok::<(), mqtt_wire::error::ProtocolError>(())
//! ```

pub mod durable;
mod gate;
pub mod memory;
pub mod record;

use crate::config::{BackendKind, PersistenceConfig};
use crate::core::qos::QoS;
use crate::error::{ProtocolError, Result};
use crate::protocol::packet::Packet;
use gate::Gate;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub use durable::DurableBackend;
pub use memory::MemoryBackend;
pub use record::StoredMessage;

/// Subscriptions of one session: topic filter to granted QoS.
pub type TopicsQos = BTreeMap<String, QoS>;

/// Longest accepted session id, in bytes. Every key the durable backend
/// derives from an id must stay within the 65535-byte key limit.
pub const MAX_SESSION_ID_LEN: usize = 65_516;

/// Fails with `InvalidLPStringSize` when `id` is longer than
/// [`MAX_SESSION_ID_LEN`]. The empty id is valid.
pub fn check_session_id(id: &str) -> Result<()> {
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(ProtocolError::InvalidLPStringSize(id.len()));
    }
    Ok(())
}

/// Direction of a queued message relative to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queued messages of one session, each list in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMessages {
    pub incoming: Vec<Packet>,
    pub outgoing: Vec<Packet>,
}

/// Both queues of one session as stored records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredQueues {
    pub incoming: Vec<StoredMessage>,
    pub outgoing: Vec<StoredMessage>,
}

/// Storage capability implemented by each backend.
///
/// Session-scoped calls fail with `NotFound` when the session does not
/// exist. Empty collections load as empty and delete without error.
/// `create_session` rejects ids that fail [`check_session_id`]. Each write
/// call is applied completely or not at all.
/// Shutdown gating is handled by [`Store`], not by implementors.
pub trait Backend: Send + Sync {
    fn create_session(&self, id: &str) -> Result<()>;
    fn has_session(&self, id: &str) -> Result<bool>;
    fn session_ids(&self) -> Result<Vec<String>>;
    fn delete_session(&self, id: &str) -> Result<()>;

    fn add_subscriptions(&self, id: &str, subs: &TopicsQos) -> Result<()>;
    fn subscriptions(&self, id: &str) -> Result<TopicsQos>;
    fn delete_subscriptions(&self, id: &str) -> Result<()>;

    fn store_messages(&self, id: &str, dir: Direction, msgs: &[StoredMessage]) -> Result<()>;
    /// Both queues, read as one snapshot.
    fn load_messages(&self, id: &str) -> Result<StoredQueues>;
    fn delete_messages(&self, id: &str) -> Result<()>;

    fn store_retained(&self, msgs: &[StoredMessage]) -> Result<()>;
    fn load_retained(&self) -> Result<Vec<StoredMessage>>;
    fn delete_retained(&self) -> Result<()>;

    /// Release underlying resources. Called once, after all operations have
    /// drained.
    fn close(&self) -> Result<()>;
}

struct StoreInner {
    gate: Gate,
    backend: Box<dyn Backend>,
    kind: &'static str,
}

/// Handle to an open store. Clones share the same backend and shutdown state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.inner.kind)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Store {
    /// Open the backend selected by `config`.
    pub fn open(config: &PersistenceConfig) -> Result<Self> {
        match &config.backend {
            BackendKind::Memory => Ok(Self::memory()),
            BackendKind::Durable { path } => Self::durable(path),
        }
    }

    pub fn memory() -> Self {
        Self::with_backend("memory", MemoryBackend::new())
    }

    pub fn durable(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_backend("durable", DurableBackend::open(path)?))
    }

    pub fn with_backend(kind: &'static str, backend: impl Backend + 'static) -> Self {
        debug!(backend = kind, "store opened");
        Self {
            inner: Arc::new(StoreInner {
                gate: Gate::new(),
                backend: Box::new(backend),
                kind,
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        !self.inner.gate.is_closed()
    }

    /// Run `op` against the backend inside the shutdown gate.
    fn call<T>(&self, op: impl FnOnce(&dyn Backend) -> Result<T>) -> Result<T> {
        let _guard = self.inner.gate.enter()?;
        op(self.inner.backend.as_ref())
    }

    fn check_open(&self) -> Result<()> {
        self.inner.gate.enter().map(drop)
    }

    pub fn sessions(&self) -> Result<Sessions> {
        self.check_open()?;
        Ok(Sessions {
            store: self.clone(),
        })
    }

    pub fn retained(&self) -> Result<Retained> {
        self.check_open()?;
        Ok(Retained {
            store: self.clone(),
        })
    }

    /// Close the store. Blocks until in-flight operations finish, then
    /// releases the backend. A second call fails with `NotOpen`.
    pub fn shutdown(&self) -> Result<()> {
        let drained = self.inner.gate.close()?;
        debug!(backend = self.inner.kind, drained, "store closing");
        self.inner.backend.close()?;
        debug!(backend = self.inner.kind, "store closed");
        Ok(())
    }
}

/// Collection of all sessions.
#[derive(Debug, Clone)]
pub struct Sessions {
    store: Store,
}

impl Sessions {
    /// Create a session. Fails with `AlreadyExists` if `id` is taken and
    /// with `InvalidLPStringSize` if it is longer than [`MAX_SESSION_ID_LEN`].
    pub fn new_session(&self, id: &str) -> Result<Session> {
        check_session_id(id)?;
        self.store.call(|b| b.create_session(id))?;
        Ok(self.session(id))
    }

    /// Fails with `NotFound` if no session `id` exists.
    pub fn get(&self, id: &str) -> Result<Session> {
        check_session_id(id)?;
        if self.store.call(|b| b.has_session(id))? {
            Ok(self.session(id))
        } else {
            Err(ProtocolError::NotFound)
        }
    }

    /// Every stored session, ordered by id.
    pub fn get_all(&self) -> Result<Vec<Session>> {
        let ids = self.store.call(|b| b.session_ids())?;
        Ok(ids.iter().map(|id| self.session(id)).collect())
    }

    /// Delete a session with all of its subscriptions and messages.
    pub fn delete(&self, id: &str) -> Result<()> {
        check_session_id(id)?;
        self.store.call(|b| b.delete_session(id))
    }

    fn session(&self, id: &str) -> Session {
        Session {
            store: self.store.clone(),
            id: id.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    store: Store,
    id: String,
}

impl Session {
    pub fn id(&self) -> Result<&str> {
        self.store.check_open()?;
        Ok(&self.id)
    }

    pub fn subscriptions(&self) -> Result<Subscriptions> {
        self.store.check_open()?;
        Ok(Subscriptions {
            store: self.store.clone(),
            id: self.id.clone(),
        })
    }

    pub fn messages(&self) -> Result<Messages> {
        self.store.check_open()?;
        Ok(Messages {
            store: self.store.clone(),
            id: self.id.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Subscriptions {
    store: Store,
    id: String,
}

impl Subscriptions {
    /// Record subscriptions. A filter already present takes the new QoS.
    pub fn add(&self, subs: &TopicsQos) -> Result<()> {
        self.store.call(|b| b.add_subscriptions(&self.id, subs))
    }

    pub fn get(&self) -> Result<TopicsQos> {
        self.store.call(|b| b.subscriptions(&self.id))
    }

    pub fn delete(&self) -> Result<()> {
        self.store.call(|b| b.delete_subscriptions(&self.id))
    }
}

#[derive(Debug, Clone)]
pub struct Messages {
    store: Store,
    id: String,
}

impl Messages {
    /// Append packets to the queue for `dir`.
    ///
    /// Only PUBLISH and PUBREL can be stored; any other packet fails the
    /// whole call with `InvalidMessageType` before anything is written.
    pub fn store(&self, dir: Direction, packets: &[Packet]) -> Result<()> {
        let records = project(packets)?;
        self.store.call(|b| b.store_messages(&self.id, dir, &records))
    }

    pub fn load(&self) -> Result<SessionMessages> {
        let queues = self.store.call(|b| b.load_messages(&self.id))?;
        Ok(SessionMessages {
            incoming: rebuild(queues.incoming),
            outgoing: rebuild(queues.outgoing),
        })
    }

    pub fn delete(&self) -> Result<()> {
        self.store.call(|b| b.delete_messages(&self.id))
    }
}

/// Retained messages, shared by all sessions.
#[derive(Debug, Clone)]
pub struct Retained {
    store: Store,
}

impl Retained {
    pub fn load(&self) -> Result<Vec<Packet>> {
        self.store.call(|b| Ok(rebuild(b.load_retained()?)))
    }

    pub fn store(&self, packets: &[Packet]) -> Result<()> {
        let records = project(packets)?;
        self.store.call(|b| b.store_retained(&records))
    }

    pub fn delete(&self) -> Result<()> {
        self.store.call(|b| b.delete_retained())
    }
}

fn project(packets: &[Packet]) -> Result<Vec<StoredMessage>> {
    packets.iter().map(StoredMessage::from_packet).collect()
}

// Records that no longer form a packet are skipped rather than failing the
// whole load.
fn rebuild(records: Vec<StoredMessage>) -> Vec<Packet> {
    records
        .into_iter()
        .filter_map(|record| match record.to_packet() {
            Ok(packet) => Some(packet),
            Err(e) => {
                warn!(error = %e, packet_type = %record.packet_type, "skipping stored record");
                None
            }
        })
        .collect()
}
