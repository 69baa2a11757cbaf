use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::{RecordSession, ResourceError, Result, TransactionalResource};

const UNIQUE_RECORD_KEY: &str = "unique_record_key";
const WRITE_CONFLICT: &str = "write_conflict";

/// A call observed by the in-memory resource, in invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOp {
    Begin,
    Flush,
    Commit,
    Rollback,
    Abandon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Insert,
    Upsert,
}

#[derive(Debug, Clone)]
struct Write {
    collection: String,
    key: String,
    value: Value,
    kind: WriteKind,
}

/// Committed value a session observed through `fetch_for_update`.
#[derive(Debug, Clone)]
struct Read {
    collection: String,
    key: String,
    observed: Option<Value>,
}

type Collections = HashMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Default)]
struct InMemoryState {
    collections: Collections,
    journal: Vec<ResourceOp>,
    fail_on_begin: bool,
    fail_on_flush: bool,
    fail_on_commit: bool,
    fail_on_rollback: bool,
}

/// In-memory transactional resource for testing and local runs.
///
/// Sessions buffer their writes. `flush` checks the buffered inserts for
/// duplicate keys and moves them into the session's flushed set; `commit`
/// applies the flushed set atomically; `rollback` discards it. Every call is
/// recorded in a journal so callers can assert on the exact sequence.
///
/// Concurrency is optimistic: records read with `fetch_for_update` are
/// compared against the committed state on flush and commit, and a session
/// whose read went stale fails with a `write_conflict` constraint error.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResource {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryResource {
    /// Creates a new empty in-memory resource.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes a committed record directly, bypassing any session.
    pub fn seed(&self, collection: &str, key: &str, value: Value) {
        self.lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Reads a committed record.
    pub fn get(&self, collection: &str, key: &str) -> Option<Value> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned()
    }

    /// Returns the number of committed records in a collection.
    pub fn record_count(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns every call made against this resource so far.
    pub fn journal(&self) -> Vec<ResourceOp> {
        self.lock().journal.clone()
    }

    /// Returns how many times the given call was made.
    pub fn count(&self, op: ResourceOp) -> usize {
        self.lock().journal.iter().filter(|o| **o == op).count()
    }

    /// Clears the call journal.
    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Configures the resource to fail when a session is started.
    pub fn set_fail_on_begin(&self, fail: bool) {
        self.lock().fail_on_begin = fail;
    }

    /// Configures the resource to fail on flush.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.lock().fail_on_flush = fail;
    }

    /// Configures the resource to fail on commit.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.lock().fail_on_commit = fail;
    }

    /// Configures the resource to fail on rollback.
    pub fn set_fail_on_rollback(&self, fail: bool) {
        self.lock().fail_on_rollback = fail;
    }
}

/// A session on an [`InMemoryResource`].
#[derive(Debug)]
pub struct InMemorySession {
    pending: Vec<Write>,
    flushed: Vec<Write>,
    reads: Vec<Read>,
    closed: bool,
    resource: InMemoryResource,
}

impl InMemorySession {
    /// Returns the number of writes not yet flushed.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Returns the number of flushed but uncommitted writes.
    pub fn flushed_writes(&self) -> usize {
        self.flushed.len()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ResourceError::SessionClosed);
        }
        Ok(())
    }

    fn buffer(&mut self, collection: &str, key: &str, value: Value, kind: WriteKind) -> Result<()> {
        self.ensure_open()?;
        self.pending.push(Write {
            collection: collection.to_string(),
            key: key.to_string(),
            value,
            kind,
        });
        Ok(())
    }

    fn discard(&mut self) {
        self.pending.clear();
        self.flushed.clear();
        self.reads.clear();
        self.closed = true;
    }

    fn own_write(&self, collection: &str, key: &str) -> Option<&Write> {
        self.pending
            .iter()
            .rev()
            .chain(self.flushed.iter().rev())
            .find(|w| w.collection == collection && w.key == key)
    }
}

/// Checks every insert in `writes`, in order, against the committed records
/// and against the writes that precede it.
fn check_unique(committed: &Collections, earlier: &[Write], writes: &[Write]) -> Result<()> {
    for (i, write) in writes.iter().enumerate() {
        if write.kind != WriteKind::Insert {
            continue;
        }
        let same_key = |w: &Write| w.collection == write.collection && w.key == write.key;
        let exists = committed
            .get(&write.collection)
            .is_some_and(|records| records.contains_key(&write.key))
            || earlier.iter().any(same_key)
            || writes[..i].iter().any(same_key);
        if exists {
            return Err(ResourceError::Constraint {
                constraint: UNIQUE_RECORD_KEY.to_string(),
                detail: format!("{}/{} already exists", write.collection, write.key),
            });
        }
    }
    Ok(())
}

/// Fails if a record read for update has been changed by another session.
fn check_reads(committed: &Collections, reads: &[Read]) -> Result<()> {
    for read in reads {
        let current = committed
            .get(&read.collection)
            .and_then(|records| records.get(&read.key));
        if current != read.observed.as_ref() {
            return Err(ResourceError::Constraint {
                constraint: WRITE_CONFLICT.to_string(),
                detail: format!(
                    "{}/{} was changed by another session",
                    read.collection, read.key
                ),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl TransactionalResource for InMemoryResource {
    type Session = InMemorySession;

    async fn begin(&self) -> Result<InMemorySession> {
        let mut state = self.lock();
        state.journal.push(ResourceOp::Begin);
        if state.fail_on_begin {
            return Err(ResourceError::Unavailable(
                "Connection refused".to_string(),
            ));
        }

        Ok(InMemorySession {
            pending: Vec::new(),
            flushed: Vec::new(),
            reads: Vec::new(),
            closed: false,
            resource: self.clone(),
        })
    }

    async fn flush(&self, session: &mut InMemorySession) -> Result<()> {
        let mut state = self.lock();
        state.journal.push(ResourceOp::Flush);
        session.ensure_open()?;
        if state.fail_on_flush {
            return Err(ResourceError::Unavailable("Flush timed out".to_string()));
        }

        check_reads(&state.collections, &session.reads)?;
        check_unique(&state.collections, &session.flushed, &session.pending)?;
        let pending = std::mem::take(&mut session.pending);
        session.flushed.extend(pending);
        Ok(())
    }

    async fn commit(&self, session: &mut InMemorySession) -> Result<()> {
        let mut state = self.lock();
        state.journal.push(ResourceOp::Commit);
        session.ensure_open()?;
        if state.fail_on_commit {
            return Err(ResourceError::Unavailable(
                "Commit rejected by resource".to_string(),
            ));
        }

        // Other sessions may have committed since this one flushed.
        check_reads(&state.collections, &session.reads)?;
        let mut writes = std::mem::take(&mut session.flushed);
        writes.append(&mut session.pending);
        if let Err(e) = check_unique(&state.collections, &[], &writes) {
            session.flushed = writes;
            return Err(e);
        }

        for write in writes {
            state
                .collections
                .entry(write.collection)
                .or_default()
                .insert(write.key, write.value);
        }
        session.reads.clear();
        session.closed = true;
        Ok(())
    }

    async fn rollback(&self, session: &mut InMemorySession) -> Result<()> {
        let mut state = self.lock();
        state.journal.push(ResourceOp::Rollback);
        if state.fail_on_rollback {
            return Err(ResourceError::Unavailable(
                "Rollback lost connection".to_string(),
            ));
        }
        session.discard();
        Ok(())
    }

    fn abandon(&self, mut session: InMemorySession) {
        self.lock().journal.push(ResourceOp::Abandon);
        session.discard();
    }
}

#[async_trait]
impl RecordSession for InMemorySession {
    async fn fetch(&mut self, collection: &str, key: &str) -> Result<Option<Value>> {
        self.ensure_open()?;
        if let Some(write) = self.own_write(collection, key) {
            return Ok(Some(write.value.clone()));
        }
        Ok(self.resource.get(collection, key))
    }

    async fn fetch_for_update(&mut self, collection: &str, key: &str) -> Result<Option<Value>> {
        self.ensure_open()?;
        if let Some(write) = self.own_write(collection, key) {
            return Ok(Some(write.value.clone()));
        }

        let observed = self.resource.get(collection, key);
        let seen = self
            .reads
            .iter()
            .any(|r| r.collection == collection && r.key == key);
        if !seen {
            self.reads.push(Read {
                collection: collection.to_string(),
                key: key.to_string(),
                observed: observed.clone(),
            });
        }
        Ok(observed)
    }

    async fn insert(&mut self, collection: &str, key: &str, value: Value) -> Result<()> {
        self.buffer(collection, key, value, WriteKind::Insert)
    }

    async fn upsert(&mut self, collection: &str, key: &str, value: Value) -> Result<()> {
        self.buffer(collection, key, value, WriteKind::Upsert)
    }
}
