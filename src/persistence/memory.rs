//! Volatile backend. State lives in process memory and is gone on drop.

use crate::error::{ProtocolError, Result};
use crate::persistence::{
    check_session_id, Backend, Direction, StoredMessage, StoredQueues, TopicsQos,
};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct SessionState {
    subscriptions: TopicsQos,
    incoming: Vec<StoredMessage>,
    outgoing: Vec<StoredMessage>,
}

impl SessionState {
    fn queue_mut(&mut self, dir: Direction) -> &mut Vec<StoredMessage> {
        match dir {
            Direction::In => &mut self.incoming,
            Direction::Out => &mut self.outgoing,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    sessions: BTreeMap<String, SessionState>,
    retained: Vec<StoredMessage>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| ProtocolError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| ProtocolError::LockPoisoned)
    }

    fn with_session<T>(&self, id: &str, f: impl FnOnce(&SessionState) -> T) -> Result<T> {
        let state = self.read()?;
        state.sessions.get(id).map(f).ok_or(ProtocolError::NotFound)
    }

    fn with_session_mut<T>(&self, id: &str, f: impl FnOnce(&mut SessionState) -> T) -> Result<T> {
        let mut state = self.write()?;
        state
            .sessions
            .get_mut(id)
            .map(f)
            .ok_or(ProtocolError::NotFound)
    }
}

impl Backend for MemoryBackend {
    fn create_session(&self, id: &str) -> Result<()> {
        check_session_id(id)?;
        let mut state = self.write()?;
        if state.sessions.contains_key(id) {
            return Err(ProtocolError::AlreadyExists);
        }
        state.sessions.insert(id.to_owned(), SessionState::default());
        Ok(())
    }

    fn has_session(&self, id: &str) -> Result<bool> {
        Ok(self.read()?.sessions.contains_key(id))
    }

    fn session_ids(&self) -> Result<Vec<String>> {
        Ok(self.read()?.sessions.keys().cloned().collect())
    }

    fn delete_session(&self, id: &str) -> Result<()> {
        self.write()?
            .sessions
            .remove(id)
            .map(drop)
            .ok_or(ProtocolError::NotFound)
    }

    fn add_subscriptions(&self, id: &str, subs: &TopicsQos) -> Result<()> {
        self.with_session_mut(id, |session| {
            session
                .subscriptions
                .extend(subs.iter().map(|(topic, qos)| (topic.clone(), *qos)));
        })
    }

    fn subscriptions(&self, id: &str) -> Result<TopicsQos> {
        self.with_session(id, |session| session.subscriptions.clone())
    }

    fn delete_subscriptions(&self, id: &str) -> Result<()> {
        self.with_session_mut(id, |session| session.subscriptions.clear())
    }

    fn store_messages(&self, id: &str, dir: Direction, msgs: &[StoredMessage]) -> Result<()> {
        self.with_session_mut(id, |session| {
            session.queue_mut(dir).extend_from_slice(msgs);
        })
    }

    fn load_messages(&self, id: &str) -> Result<StoredQueues> {
        self.with_session(id, |session| StoredQueues {
            incoming: session.incoming.clone(),
            outgoing: session.outgoing.clone(),
        })
    }

    fn delete_messages(&self, id: &str) -> Result<()> {
        self.with_session_mut(id, |session| {
            session.incoming.clear();
            session.outgoing.clear();
        })
    }

    fn store_retained(&self, msgs: &[StoredMessage]) -> Result<()> {
        self.write()?.retained.extend_from_slice(msgs);
        Ok(())
    }

    fn load_retained(&self) -> Result<Vec<StoredMessage>> {
        Ok(self.read()?.retained.clone())
    }

    fn delete_retained(&self) -> Result<()> {
        self.write()?.retained.clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.write()?;
        *state = State::default();
        Ok(())
    }
}
