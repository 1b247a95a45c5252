//! Per-connection session: a typed value store plus the registry of open streams

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use futures::future::AbortHandle;
use scc::hash_map::Entry;

use crate::error::{Result, RpcError};
use crate::logging::session_tag;

use super::key::TypeKey;

/// Type-erased value held by a session.
///
/// Internally an `Arc<T>` boxed as `Any`, so the same allocation can sit under
/// several keys (a concrete type and a trait object it implements).
#[derive(Clone)]
pub struct SessionValue(Arc<dyn Any + Send + Sync>);

impl SessionValue {
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self(Arc::new(value))
    }

    /// Recover the value as `Arc<T>` if it was stored as `T`
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.0.downcast_ref::<Arc<T>>().cloned()
    }
}

impl fmt::Debug for SessionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionValue(..)")
    }
}

#[derive(Clone)]
enum Slot {
    Value(SessionValue),
    /// The session itself, resolved through the weak self reference
    Myself,
}

static NEXT_EMITTER_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Cancellation handle for a stream bridged into responses
#[derive(Debug, Clone)]
pub struct EmitterHandle {
    token: u64,
    abort: AbortHandle,
}

impl EmitterHandle {
    pub fn new(abort: AbortHandle) -> Self {
        Self { token: NEXT_EMITTER_TOKEN.fetch_add(1, Ordering::Relaxed), abort }
    }

    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted()
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }
}

/// Server-side state of one connection.
///
/// Always holds an entry for its own type so handlers can inject the current
/// session like any other value. Once destroyed every operation fails with
/// [`RpcError::SessionExpired`], even if the store happens to be empty.
pub struct Session {
    id: String,
    me: Weak<Session>,
    store: scc::HashMap<TypeKey, Slot>,
    emitters: scc::HashMap<i64, EmitterHandle>,
    destroyed: AtomicBool,
    created_at: DateTime<Utc>,
    last_accessed_ms: AtomicI64,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        let now = Utc::now();
        let session = Arc::new_cyclic(|me| Session {
            id: id.into(),
            me: me.clone(),
            store: scc::HashMap::new(),
            emitters: scc::HashMap::new(),
            destroyed: AtomicBool::new(false),
            created_at: now,
            last_accessed_ms: AtomicI64::new(now.timestamp_millis()),
        });
        let _ = session.store.insert_sync(TypeKey::of::<Session>(), Slot::Myself);
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_accessed_ms.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    /// Record an access (for idle eviction)
    pub fn touch(&self) {
        self.last_accessed_ms.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> chrono::Duration {
        Utc::now() - self.last_accessed_at()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            Err(RpcError::SessionExpired)
        } else {
            Ok(())
        }
    }

    fn materialize(&self, slot: &Slot) -> Option<SessionValue> {
        match slot {
            Slot::Value(value) => Some(value.clone()),
            Slot::Myself => self.me.upgrade().map(SessionValue::new),
        }
    }

    /// Roll back a write under `key` that raced with `destroy()`.
    ///
    /// `destroy()` raises the flag before draining the store, so a write that
    /// lands after the drain always observes the flag here.
    fn settle(&self, key: &TypeKey) -> Result<()> {
        if self.is_destroyed() {
            self.store.remove_sync(key);
            return Err(RpcError::SessionExpired);
        }
        Ok(())
    }

    fn put(&self, key: TypeKey, slot: Slot) -> Result<()> {
        self.ensure_alive()?;
        match self.store.entry_sync(key) {
            Entry::Occupied(mut occupied) => *occupied.get_mut() = slot,
            Entry::Vacant(vacant) => {
                vacant.insert_entry(slot);
            }
        }
        self.settle(&key)
    }

    /// Store `value` under its own type, replacing any previous value
    pub fn add<T: Send + Sync + 'static>(&self, value: T) -> Result<Arc<T>> {
        let value = Arc::new(value);
        self.add_shared(Arc::clone(&value))?;
        Ok(value)
    }

    /// Store an existing `Arc` under `T`, which may be a trait object type.
    ///
    /// ```ignore
    /// let user = Arc::new(Principal::new("alice", ["admin"]));
    /// session.add_shared(user.clone())?;
    /// session.add_shared::<dyn RoleHolder>(user)?;
    /// ```
    pub fn add_shared<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) -> Result<()> {
        self.put(TypeKey::of::<T>(), Slot::Value(SessionValue::new(value)))
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>> {
        Ok(self.get_by_key(&TypeKey::of::<T>())?.and_then(|value| value.downcast::<T>()))
    }

    /// Look a value up by key without knowing its type statically
    pub fn get_by_key(&self, key: &TypeKey) -> Result<Option<SessionValue>> {
        self.ensure_alive()?;
        Ok(self.store.read_sync(key, |_, slot| slot.clone()).and_then(|slot| self.materialize(&slot)))
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> Result<bool> {
        self.ensure_alive()?;
        Ok(self.store.contains_sync(&TypeKey::of::<T>()))
    }

    /// Remove the value stored under `T`; returns whether one was present
    pub fn remove<T: ?Sized + 'static>(&self) -> Result<bool> {
        self.ensure_alive()?;
        Ok(self.store.remove_sync(&TypeKey::of::<T>()).is_some())
    }

    /// Combine `value` with the stored one using `f`, or store `value` as is
    /// when nothing is stored yet
    pub fn merge<T, F>(&self, value: T, f: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&T, T) -> T,
    {
        self.ensure_alive()?;
        let key = TypeKey::of::<T>();
        let merged = match self.store.entry_sync(key) {
            Entry::Occupied(mut occupied) => {
                let existing = self.materialize(occupied.get()).and_then(|v| v.downcast::<T>());
                let next = Arc::new(match existing {
                    Some(current) => f(&current, value),
                    None => value,
                });
                *occupied.get_mut() = Slot::Value(SessionValue::new(Arc::clone(&next)));
                next
            }
            Entry::Vacant(vacant) => {
                let next = Arc::new(value);
                vacant.insert_entry(Slot::Value(SessionValue::new(Arc::clone(&next))));
                next
            }
        };
        self.settle(&key)?;
        Ok(merged)
    }

    /// Recompute the value stored under `T`.
    ///
    /// `f` always runs and sees the current value, if any. Returning `None`
    /// removes the entry.
    pub fn compute<T, F>(&self, f: F) -> Result<Option<Arc<T>>>
    where
        T: Send + Sync + 'static,
        F: FnOnce(Option<&T>) -> Option<T>,
    {
        self.ensure_alive()?;
        let key = TypeKey::of::<T>();
        let computed = match self.store.entry_sync(key) {
            Entry::Occupied(mut occupied) => {
                let existing = self.materialize(occupied.get()).and_then(|v| v.downcast::<T>());
                match f(existing.as_deref()) {
                    Some(value) => {
                        let next = Arc::new(value);
                        *occupied.get_mut() = Slot::Value(SessionValue::new(Arc::clone(&next)));
                        Some(next)
                    }
                    None => {
                        occupied.remove();
                        None
                    }
                }
            }
            Entry::Vacant(vacant) => f(None).map(|value| {
                let next = Arc::new(value);
                vacant.insert_entry(Slot::Value(SessionValue::new(Arc::clone(&next))));
                next
            }),
        };
        self.settle(&key)?;
        Ok(computed)
    }

    /// Number of stored entries, including the self reference
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Track an open stream under the request id that opened it.
    ///
    /// A stream already registered under the same id is cancelled and replaced.
    pub fn register_emitter(&self, request_id: i64, handle: EmitterHandle) -> Result<()> {
        self.ensure_alive()?;
        let previous = match self.emitters.entry_sync(request_id) {
            Entry::Occupied(mut occupied) => Some(std::mem::replace(occupied.get_mut(), handle)),
            Entry::Vacant(vacant) => {
                vacant.insert_entry(handle);
                None
            }
        };
        if let Some(previous) = previous {
            log::warn!("Stream {} re-registered in session, cancelling the previous one", request_id);
            previous.cancel();
        }

        // destroy() may have drained the registry between the check and the insert
        if self.is_destroyed() {
            if let Some((_, handle)) = self.emitters.remove_sync(&request_id) {
                handle.cancel();
            }
            return Err(RpcError::SessionExpired);
        }
        Ok(())
    }

    /// Cancel and forget the stream opened by `request_id`.
    ///
    /// Returns whether a stream was registered; unknown ids are not an error.
    pub fn unregister_emitter(&self, request_id: i64) -> Result<bool> {
        self.ensure_alive()?;
        match self.emitters.remove_sync(&request_id) {
            Some((_, handle)) => {
                handle.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forget a stream that finished on its own, unless it was replaced meanwhile
    pub(crate) fn release_emitter(&self, request_id: i64, token: u64) {
        if let Entry::Occupied(occupied) = self.emitters.entry_sync(request_id) {
            if occupied.get().token() == token {
                occupied.remove();
            }
        }
    }

    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    /// Cancel every open stream, drop all stored values and mark the session
    /// expired. Calling it again does nothing.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.emitters.retain_sync(|_, handle| {
            handle.cancel();
            false
        });
        self.store.retain_sync(|_, _| false);
        log::debug!("Session {} destroyed", session_tag(&self.id));
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("entries", &self.store.len())
            .field("emitters", &self.emitters.len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
