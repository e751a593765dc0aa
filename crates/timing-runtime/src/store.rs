//! In-memory store for the sessions and reference profiles of one analysis.
//!
//! The store is the only mutable state in the engine. It keeps sessions in
//! insertion order (a replacing [`SessionStore::put`] keeps the original
//! slot) and hands out read-only views to the analysis code.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use timing_core::error::{Result, TimingError};
use timing_core::models::{
    LapRecord, ReferenceProfile, SessionKey, SessionMeta, SessionSchema, SessionSource,
    TimingSession,
};
use tracing::{debug, info};

// ── SessionStore ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Vec<TimingSession>,
    index: HashMap<SessionKey, usize>,
    references: Vec<ReferenceProfile>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Sessions ──────────────────────────────────────────────────────────

    /// Insert `session`, replacing any session stored under the same key.
    ///
    /// Returns the replaced session.
    pub fn put(&mut self, session: TimingSession) -> Option<TimingSession> {
        match self.index.get(&session.key) {
            Some(&slot) => {
                info!(
                    "Replacing session {} ({} laps -> {} laps)",
                    session.key,
                    self.sessions[slot].records.len(),
                    session.records.len()
                );
                Some(std::mem::replace(&mut self.sessions[slot], session))
            }
            None => {
                debug!("Storing session {}", session.key);
                self.index.insert(session.key.clone(), self.sessions.len());
                self.sessions.push(session);
                None
            }
        }
    }

    pub fn get(&self, key: &SessionKey) -> Result<&TimingSession> {
        self.index
            .get(key)
            .map(|&slot| &self.sessions[slot])
            .ok_or_else(|| TimingError::SessionNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.index.contains_key(key)
    }

    /// Append one lap to the session named by `meta.key`.
    ///
    /// A missing session is created from `meta` with a schema derived from
    /// the record. An existing session keeps its metadata; the record must
    /// carry the session's sector count.
    pub fn append_record(&mut self, meta: SessionMeta, record: LapRecord) -> Result<()> {
        let Some(&slot) = self.index.get(&meta.key) else {
            debug!("Creating session {} from a manual lap", meta.key);
            let schema = SessionSchema::from_record(&record);
            self.put(TimingSession::new(meta, schema, vec![record]));
            return Ok(());
        };

        let session = &mut self.sessions[slot];
        let expected = session.schema.sector_count;
        let found = record.sector_times.len();
        if expected != found {
            return Err(TimingError::SchemaMismatch { expected, found });
        }

        session.schema.has_lap_number |= record.lap_number.is_some();
        session.schema.has_speed |= record.speed.is_some();
        session.schema.has_speed_trap |= record.speed_trap.is_some();
        session.schema.has_signal |= record.signal.is_some();
        session.records.push(record);
        debug!("Appended lap to {} ({} laps)", session.key, session.records.len());
        Ok(())
    }

    /// Stored keys in insertion order.
    pub fn list_keys(&self) -> Vec<&SessionKey> {
        self.sessions.iter().map(|s| &s.key).collect()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &TimingSession> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every session and reference profile.
    pub fn clear_all(&mut self) {
        info!(
            "Clearing {} sessions and {} references",
            self.sessions.len(),
            self.references.len()
        );
        self.sessions.clear();
        self.index.clear();
        self.references.clear();
    }

    // ── References ────────────────────────────────────────────────────────

    /// Store a profile, replacing one with the same name in place.
    pub fn put_reference(&mut self, profile: ReferenceProfile) -> Option<ReferenceProfile> {
        match self.references.iter_mut().find(|r| r.name == profile.name) {
            Some(existing) => {
                debug!("Replacing reference profile '{}'", profile.name);
                Some(std::mem::replace(existing, profile))
            }
            None => {
                debug!("Storing reference profile '{}'", profile.name);
                self.references.push(profile);
                None
            }
        }
    }

    pub fn get_reference(&self, name: &str) -> Result<&ReferenceProfile> {
        self.references
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| TimingError::ReferenceNotFound(name.to_string()))
    }

    /// Reference names in insertion order.
    pub fn list_references(&self) -> Vec<&str> {
        self.references.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn remove_reference(&mut self, name: &str) -> Result<ReferenceProfile> {
        let pos = self
            .references
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| TimingError::ReferenceNotFound(name.to_string()))?;
        Ok(self.references.remove(pos))
    }
}

impl SessionSource for SessionStore {
    fn sessions(&self) -> Box<dyn Iterator<Item = &TimingSession> + '_> {
        Box::new(self.sessions.iter())
    }
}

// ── SharedStore ───────────────────────────────────────────────────────────────

/// A store shared between callers; every access holds the lock for the
/// duration of the closure.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<SessionStore>>,
}

impl SharedStore {
    pub fn new(store: SessionStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with shared access to the store.
    pub fn read<R>(&self, f: impl FnOnce(&SessionStore) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with exclusive access to the store.
    pub fn write<R>(&self, f: impl FnOnce(&mut SessionStore) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
