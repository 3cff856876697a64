//! # Durable Backend
//!
//! Disk-backed store on fjall, an LSM-tree embedded key-value database.
//!
//! ## Keyspaces
//! ```text
//! sessions      [len(id) u16][id]                             -> ()
//! session_data  [len(id) u16][id][0x01][seq u64][field]       -> subscription field
//!               [len(id) u16][id][0x02][dir u8][seq u64][field] -> message field
//! retained      [seq u64][field]                              -> message field
//! meta          [0x00]                                        -> retained sequence
//!               [0x01][bucket prefix]                         -> session bucket sequence
//! ```
//!
//! Nested buckets are flattened into key prefixes. The session id is length
//! prefixed so no id is a prefix of another's keys, and sequence numbers are
//! big-endian so key order is insertion order.
//!
//! ## Concurrency
//! Reads share the database; writes are exclusive. A write stages its
//! sequence counter update and every field in one write batch and commits it
//! before the next write starts, so a call lands whole or not at all and
//! concurrent writers never interleave within a bucket.
//!
//! Session ids are capped at [`MAX_SESSION_ID_LEN`] so the longest derived
//! key stays within fjall's 65535-byte key limit.

use crate::core::qos::QoS;
use crate::error::{ProtocolError, Result};
use crate::persistence::record::{RecordBuilder, FIELD_PAYLOAD};
use crate::persistence::{
    check_session_id, Backend, Direction, StoredMessage, StoredQueues, TopicsQos,
    MAX_SESSION_ID_LEN,
};
use fjall::{Database, Keyspace, KeyspaceCreateOptions, OwnedWriteBatch, PersistMode};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

const TAG_SUBSCRIPTIONS: u8 = 0x01;
const TAG_MESSAGES: u8 = 0x02;

const META_RETAINED: u8 = 0x00;
const META_SESSION: u8 = 0x01;

const SEQ_LEN: usize = 8;

const FIELD_SUB_TOPIC: &[u8] = b"topic";
const FIELD_SUB_QOS: &[u8] = b"qos";

// longest derived key: [len][id][tag][dir][seq][payload]
const MAX_KEY_OVERHEAD: usize = 2 + 1 + 1 + SEQ_LEN + FIELD_PAYLOAD.len();
const _: () = assert!(MAX_SESSION_ID_LEN + MAX_KEY_OVERHEAD <= u16::MAX as usize);

fn storage_err(e: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::Storage(e.to_string())
}

struct Handles {
    db: Database,
    sessions: Keyspace,
    data: Keyspace,
    retained: Keyspace,
    meta: Keyspace,
}

impl Handles {
    fn open(path: &Path) -> Result<Self> {
        let db = Database::builder(path).open().map_err(storage_err)?;
        let keyspace = |name: &str| {
            db.keyspace(name, KeyspaceCreateOptions::default)
                .map_err(storage_err)
        };

        Ok(Self {
            sessions: keyspace("sessions")?,
            data: keyspace("session_data")?,
            retained: keyspace("retained")?,
            meta: keyspace("meta")?,
            db,
        })
    }

    /// All keys under `prefix`, in key order.
    fn keys(ks: &Keyspace, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        ks.prefix(prefix)
            .map(|guard| guard.key().map(|k| k.to_vec()).map_err(storage_err))
            .collect()
    }

    fn remove_prefix(batch: &mut OwnedWriteBatch, ks: &Keyspace, prefix: &[u8]) -> Result<usize> {
        let keys = Self::keys(ks, prefix)?;
        let removed = keys.len();
        for key in keys {
            batch.remove(ks, key);
        }
        Ok(removed)
    }

    fn commit(batch: OwnedWriteBatch) -> Result<()> {
        batch.commit().map_err(storage_err)
    }

    /// Last sequence number handed out behind `counter`, 0 if none.
    fn sequence(&self, counter: &[u8]) -> Result<u64> {
        match self.meta.get(counter).map_err(storage_err)? {
            Some(value) => {
                let bytes: [u8; SEQ_LEN] = value[..]
                    .try_into()
                    .map_err(|_| storage_err("corrupt sequence counter"))?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    /// Reserve `count` sequence numbers for the bucket behind `counter`,
    /// returning the first. Sequences start at 1. The counter only moves
    /// when `batch` commits. Caller holds the write lock.
    fn reserve_sequences(
        &self,
        batch: &mut OwnedWriteBatch,
        counter: &[u8],
        count: usize,
    ) -> Result<u64> {
        let current = self.sequence(counter)?;
        let last = current + count as u64;
        batch.insert(&self.meta, counter.to_vec(), last.to_be_bytes().to_vec());
        Ok(current + 1)
    }

    fn has_session(&self, prefix: &[u8]) -> Result<bool> {
        Ok(self.sessions.get(prefix).map_err(storage_err)?.is_some())
    }

    fn require_session(&self, prefix: &[u8]) -> Result<()> {
        if self.has_session(prefix)? {
            Ok(())
        } else {
            Err(ProtocolError::NotFound)
        }
    }

    /// Stage records under `bucket`, one sequence number each.
    fn put_records(
        &self,
        batch: &mut OwnedWriteBatch,
        ks: &Keyspace,
        bucket: &[u8],
        counter: &[u8],
        msgs: &[StoredMessage],
    ) -> Result<()> {
        if msgs.is_empty() {
            return Ok(());
        }
        let first = self.reserve_sequences(batch, counter, msgs.len())?;
        for (seq, msg) in (first..).zip(msgs) {
            for (name, value) in msg.fields() {
                batch.insert(ks, field_key(bucket, seq, name), value);
            }
        }
        Ok(())
    }

    /// Rebuild records stored under `bucket`, in sequence order. Records
    /// whose fields do not parse are skipped.
    fn get_records(ks: &Keyspace, bucket: &[u8]) -> Result<Vec<StoredMessage>> {
        let mut records = Vec::new();
        let mut current: Option<(Vec<u8>, Result<RecordBuilder>)> = None;

        for key in Self::keys(ks, bucket)? {
            let Some((seq, name)) = split_field_key(&key, bucket.len()) else {
                warn!(key_len = key.len(), "skipping malformed record key");
                continue;
            };
            let Some(value) = ks.get(&key).map_err(storage_err)? else {
                continue;
            };

            let same_record = matches!(&current, Some((s, _)) if s.as_slice() == seq);
            if !same_record {
                if let Some((_, state)) = current.take() {
                    push_record(&mut records, state);
                }
                current = Some((seq.to_vec(), Ok(RecordBuilder::default())));
            }
            if let Some((_, state)) = current.as_mut() {
                let failed = match state {
                    Ok(builder) => builder.field(name, &value).err(),
                    Err(_) => None,
                };
                if let Some(e) = failed {
                    *state = Err(e);
                }
            }
        }

        if let Some((_, state)) = current {
            push_record(&mut records, state);
        }
        Ok(records)
    }
}

fn push_record(records: &mut Vec<StoredMessage>, state: Result<RecordBuilder>) {
    match state.and_then(RecordBuilder::finish) {
        Ok(record) => records.push(record),
        Err(e) => warn!(error = %e, "skipping corrupt stored record"),
    }
}

/// `[len(id) u16][id]`. Also the key of the session marker, so it is never
/// empty, even for the empty id.
fn session_prefix(id: &str) -> Result<Vec<u8>> {
    check_session_id(id)?;
    let mut key = Vec::with_capacity(2 + id.len() + 2);
    key.extend_from_slice(&(id.len() as u16).to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    Ok(key)
}

fn session_id_from_key(key: &[u8]) -> Option<String> {
    let (len, id) = key.split_first_chunk::<2>()?;
    if usize::from(u16::from_be_bytes(*len)) != id.len() {
        return None;
    }
    String::from_utf8(id.to_vec()).ok()
}

fn subscriptions_bucket(prefix: &[u8]) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.push(TAG_SUBSCRIPTIONS);
    key
}

fn messages_bucket(prefix: &[u8]) -> Vec<u8> {
    let mut key = prefix.to_vec();
    key.push(TAG_MESSAGES);
    key
}

fn direction_bucket(prefix: &[u8], dir: Direction) -> Vec<u8> {
    let mut key = messages_bucket(prefix);
    key.push(match dir {
        Direction::In => 0x00,
        Direction::Out => 0x01,
    });
    key
}

fn session_counter(bucket: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + bucket.len());
    key.push(META_SESSION);
    key.extend_from_slice(bucket);
    key
}

fn field_key(bucket: &[u8], seq: u64, name: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(bucket.len() + SEQ_LEN + name.len());
    key.extend_from_slice(bucket);
    key.extend_from_slice(&seq.to_be_bytes());
    key.extend_from_slice(name);
    key
}

fn split_field_key(key: &[u8], bucket_len: usize) -> Option<(&[u8], &[u8])> {
    let rest = key.get(bucket_len..)?;
    if rest.len() <= SEQ_LEN {
        return None;
    }
    Some(rest.split_at(SEQ_LEN))
}

/// fjall-backed [`Backend`].
pub struct DurableBackend {
    handles: RwLock<Option<Handles>>,
}

impl std::fmt::Debug for DurableBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableBackend").finish_non_exhaustive()
    }
}

impl DurableBackend {
    /// Open or create the database directory at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let handles = Handles::open(path)?;
        debug!(path = %path.display(), "durable store opened");
        Ok(Self {
            handles: RwLock::new(Some(handles)),
        })
    }

    fn read<T>(&self, op: impl FnOnce(&Handles) -> Result<T>) -> Result<T> {
        let guard: RwLockReadGuard<'_, Option<Handles>> =
            self.handles.read().map_err(|_| ProtocolError::LockPoisoned)?;
        op(guard.as_ref().ok_or(ProtocolError::NotOpen)?)
    }

    /// Run `op` under the write lock and commit what it staged as one batch.
    fn write<T>(
        &self,
        op: impl FnOnce(&Handles, &mut OwnedWriteBatch) -> Result<T>,
    ) -> Result<T> {
        let guard: RwLockWriteGuard<'_, Option<Handles>> =
            self.handles.write().map_err(|_| ProtocolError::LockPoisoned)?;
        let handles = guard.as_ref().ok_or(ProtocolError::NotOpen)?;
        let mut batch = handles.db.batch();
        let value = op(handles, &mut batch)?;
        Handles::commit(batch)?;
        Ok(value)
    }
}

impl Backend for DurableBackend {
    fn create_session(&self, id: &str) -> Result<()> {
        let prefix = session_prefix(id)?;
        self.write(|h, batch| {
            if h.has_session(&prefix)? {
                return Err(ProtocolError::AlreadyExists);
            }
            batch.insert(&h.sessions, prefix.clone(), Vec::new());
            Ok(())
        })
    }

    fn has_session(&self, id: &str) -> Result<bool> {
        let prefix = session_prefix(id)?;
        self.read(|h| h.has_session(&prefix))
    }

    fn session_ids(&self) -> Result<Vec<String>> {
        self.read(|h| {
            let mut ids = Vec::new();
            for key in Handles::keys(&h.sessions, &[])? {
                match session_id_from_key(&key) {
                    Some(id) => ids.push(id),
                    None => warn!(key_len = key.len(), "skipping unreadable session key"),
                }
            }
            // keys order by length first
            ids.sort_unstable();
            Ok(ids)
        })
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        let prefix = session_prefix(id)?;
        self.write(|h, batch| {
            h.require_session(&prefix)?;
            let removed = Handles::remove_prefix(batch, &h.data, &prefix)?;
            Handles::remove_prefix(batch, &h.meta, &session_counter(&prefix))?;
            batch.remove(&h.sessions, prefix.clone());
            debug!(session = id, removed, "session deleted");
            Ok(())
        })
    }

    fn add_subscriptions(&self, id: &str, subs: &TopicsQos) -> Result<()> {
        let prefix = session_prefix(id)?;
        let bucket = subscriptions_bucket(&prefix);
        self.write(|h, batch| {
            h.require_session(&prefix)?;
            if subs.is_empty() {
                return Ok(());
            }
            let first = h.reserve_sequences(batch, &session_counter(&bucket), subs.len())?;
            for (seq, (topic, qos)) in (first..).zip(subs) {
                batch.insert(
                    &h.data,
                    field_key(&bucket, seq, FIELD_SUB_TOPIC),
                    topic.as_bytes().to_vec(),
                );
                batch.insert(&h.data, field_key(&bucket, seq, FIELD_SUB_QOS), vec![*qos as u8]);
            }
            Ok(())
        })
    }

    fn subscriptions(&self, id: &str) -> Result<TopicsQos> {
        let prefix = session_prefix(id)?;
        let bucket = subscriptions_bucket(&prefix);
        self.read(|h| {
            h.require_session(&prefix)?;

            // fields of one subscription are adjacent: qos sorts before topic
            let mut subs = TopicsQos::new();
            let mut qos = None;
            for key in Handles::keys(&h.data, &bucket)? {
                let Some((_, name)) = split_field_key(&key, bucket.len()) else {
                    continue;
                };
                let Some(value) = h.data.get(&key).map_err(storage_err)? else {
                    continue;
                };
                match name {
                    FIELD_SUB_QOS => {
                        let byte = value.first().copied().unwrap_or_default();
                        qos = Some(QoS::try_from(byte)?);
                    }
                    FIELD_SUB_TOPIC => {
                        let topic = String::from_utf8(value.to_vec())
                            .map_err(|_| ProtocolError::InvalidUtf8)?;
                        subs.insert(topic, qos.take().unwrap_or_default());
                    }
                    _ => {}
                }
            }
            Ok(subs)
        })
    }

    fn delete_subscriptions(&self, id: &str) -> Result<()> {
        let prefix = session_prefix(id)?;
        let bucket = subscriptions_bucket(&prefix);
        self.write(|h, batch| {
            h.require_session(&prefix)?;
            Handles::remove_prefix(batch, &h.data, &bucket)?;
            batch.remove(&h.meta, session_counter(&bucket));
            Ok(())
        })
    }

    fn store_messages(&self, id: &str, dir: Direction, msgs: &[StoredMessage]) -> Result<()> {
        let prefix = session_prefix(id)?;
        let bucket = direction_bucket(&prefix, dir);
        self.write(|h, batch| {
            h.require_session(&prefix)?;
            h.put_records(batch, &h.data, &bucket, &session_counter(&bucket), msgs)
        })
    }

    fn load_messages(&self, id: &str) -> Result<StoredQueues> {
        let prefix = session_prefix(id)?;
        self.read(|h| {
            h.require_session(&prefix)?;
            Ok(StoredQueues {
                incoming: Handles::get_records(&h.data, &direction_bucket(&prefix, Direction::In))?,
                outgoing: Handles::get_records(&h.data, &direction_bucket(&prefix, Direction::Out))?,
            })
        })
    }

    fn delete_messages(&self, id: &str) -> Result<()> {
        let prefix = session_prefix(id)?;
        let bucket = messages_bucket(&prefix);
        self.write(|h, batch| {
            h.require_session(&prefix)?;
            Handles::remove_prefix(batch, &h.data, &bucket)?;
            Handles::remove_prefix(batch, &h.meta, &session_counter(&bucket))?;
            Ok(())
        })
    }

    fn store_retained(&self, msgs: &[StoredMessage]) -> Result<()> {
        self.write(|h, batch| h.put_records(batch, &h.retained, &[], &[META_RETAINED], msgs))
    }

    fn load_retained(&self) -> Result<Vec<StoredMessage>> {
        self.read(|h| Handles::get_records(&h.retained, &[]))
    }

    fn delete_retained(&self) -> Result<()> {
        self.write(|h, batch| {
            Handles::remove_prefix(batch, &h.retained, &[])?;
            batch.remove(&h.meta, vec![META_RETAINED]);
            Ok(())
        })
    }

    fn close(&self) -> Result<()> {
        let mut guard = self
            .handles
            .write()
            .map_err(|_| ProtocolError::LockPoisoned)?;
        let handles = guard.take().ok_or(ProtocolError::NotOpen)?;
        handles
            .db
            .persist(PersistMode::SyncAll)
            .map_err(storage_err)?;
        drop(handles);
        debug!("durable store released");
        Ok(())
    }
}
