use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::relay::types::{ConnHandle, ConnId};

/// A joined, named member bound to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub conn: ConnHandle,
}

impl Participant {
    pub fn new(name: impl Into<String>, conn: ConnHandle) -> Self {
        Self {
            name: name.into(),
            conn,
        }
    }
}

#[derive(Debug, Default)]
struct Members {
    by_name: HashMap<String, ConnHandle>,
    by_conn: HashMap<ConnId, String>,
}

impl Members {
    fn others(&self, excluding: Option<ConnId>) -> Vec<ConnHandle> {
        self.by_name
            .values()
            .filter(|c| Some(c.id()) != excluding)
            .cloned()
            .collect()
    }

    fn remove_conn(&mut self, conn_id: ConnId) -> Option<Participant> {
        let name = self.by_conn.remove(&conn_id)?;
        let conn = self.by_name.remove(&name)?;
        Some(Participant { name, conn })
    }
}

/// Shared membership of the relay: who is joined, under which name, on which
/// connection.
///
/// Every operation takes the single internal lock, does map work only and
/// returns owned data. Nothing here touches the network, so callers do their
/// sends on the returned snapshots after the lock is released.
#[derive(Debug, Default)]
pub struct Registry {
    members: Mutex<Members>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // Critical sections never panic halfway through an update, so the maps are
    // consistent even if another holder panicked.
    fn lock(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `participant` unless its name (or its connection) is already present.
    pub fn add(&self, participant: Participant) -> bool {
        self.admit(participant).is_some()
    }

    /// Adds `participant` and, under the same lock, snapshots every other
    /// member's connection. `None` if the name or connection is taken.
    pub fn admit(&self, participant: Participant) -> Option<Vec<ConnHandle>> {
        let mut m = self.lock();
        let conn_id = participant.conn.id();
        if m.by_name.contains_key(&participant.name) || m.by_conn.contains_key(&conn_id) {
            return None;
        }
        m.by_conn.insert(conn_id, participant.name.clone());
        m.by_name.insert(participant.name, participant.conn);
        Some(m.others(Some(conn_id)))
    }

    /// Snapshots every other member, then removes the one on `conn_id`.
    pub fn withdraw(&self, conn_id: ConnId) -> Option<(Participant, Vec<ConnHandle>)> {
        let mut m = self.lock();
        if !m.by_conn.contains_key(&conn_id) {
            return None;
        }
        let others = m.others(Some(conn_id));
        let removed = m.remove_conn(conn_id)?;
        Some((removed, others))
    }

    pub fn remove_by_connection(&self, conn_id: ConnId) -> bool {
        self.lock().remove_conn(conn_id).is_some()
    }

    pub fn remove_by_name(&self, name: &str) -> bool {
        let mut m = self.lock();
        match m.by_name.remove(name) {
            Some(conn) => {
                m.by_conn.remove(&conn.id());
                true
            }
            None => false,
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<Participant> {
        self.lock()
            .by_name
            .get(name)
            .map(|conn| Participant::new(name, conn.clone()))
    }

    pub fn name_for(&self, conn_id: ConnId) -> Option<String> {
        self.lock().by_conn.get(&conn_id).cloned()
    }

    pub fn contains_connection(&self, conn_id: ConnId) -> bool {
        self.lock().by_conn.contains_key(&conn_id)
    }

    /// Point-in-time copy of member connections, optionally minus one.
    pub fn snapshot_connections(&self, excluding: Option<ConnId>) -> Vec<ConnHandle> {
        self.lock().others(excluding)
    }

    /// Removes and returns everyone.
    pub fn drain(&self) -> Vec<Participant> {
        let mut m = self.lock();
        m.by_conn.clear();
        m.by_name
            .drain()
            .map(|(name, conn)| Participant { name, conn })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
