//! In-process remote store.
//!
//! Behaves like the hosted document service: merge-upserts, a
//! server-assigned `updatedAt`, and feeds that deliver the full snapshot on
//! subscribe and after every change. It also doubles as the loopback
//! backend for tests, so it counts pushes and live subscriptions.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use lacquer_shared::constants::{REMOTE_META, REMOTE_SETTINGS_DOC, UPDATED_AT_FIELD};

use crate::error::SyncError;
use crate::remote::{DocPath, Document, FeedTarget, Identity, IdentityProvider, RemoteStore, Snapshot};

#[derive(Default)]
struct Room {
    collections: HashMap<String, BTreeMap<String, Document>>,
    feeds: HashMap<FeedTarget, watch::Sender<Snapshot>>,
}

impl Room {
    fn snapshot(&self, target: FeedTarget) -> Snapshot {
        let documents = self
            .collections
            .get(target.remote_collection())
            .map(|docs| {
                docs.iter()
                    .filter(|(id, _)| target.contains(target.remote_collection(), id))
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Snapshot { documents }
    }

    fn notify(&self, collection: &str, id: &str) {
        for (target, feed) in &self.feeds {
            if target.contains(collection, id) {
                feed.send_replace(self.snapshot(*target));
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    rooms: Mutex<HashMap<String, Room>>,
    uid: Mutex<Option<String>>,
    clock: AtomicI64,
    offline: AtomicBool,
    upserts: AtomicUsize,
    settings_pushes: AtomicUsize,
    identity_requests: AtomicUsize,
    live_feeds: Arc<AtomicUsize>,
}

/// Cheaply cloneable handle to a shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Inner>,
}

/// Decrements the live feed count when a subscription stream is dropped.
struct FeedGuard(Arc<AtomicUsize>);

impl Drop for FeedGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<String, Room>> {
        // Every write completes under the lock, so poisoning leaves no
        // half-written room behind.
        self.inner
            .rooms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Strictly increasing milliseconds, so two writes in the same
    /// millisecond still order.
    fn next_timestamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let prev = self
            .inner
            .clock
            .fetch_max(now, Ordering::SeqCst);
        if prev >= now {
            self.inner.clock.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            now
        }
    }

    /// Make every upsert fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Total successful upserts across all rooms.
    pub fn upserts(&self) -> usize {
        self.inner.upserts.load(Ordering::SeqCst)
    }

    /// Successful writes to any room's `meta/settings` document.
    pub fn settings_pushes(&self) -> usize {
        self.inner.settings_pushes.load(Ordering::SeqCst)
    }

    pub fn identity_requests(&self) -> usize {
        self.inner.identity_requests.load(Ordering::SeqCst)
    }

    /// Subscription streams that are still alive.
    pub fn active_subscriptions(&self) -> usize {
        self.inner.live_feeds.load(Ordering::SeqCst)
    }

    pub fn document(&self, room: &str, collection: &str, id: &str) -> Option<Document> {
        self.rooms()
            .get(room)
            .and_then(|r| r.collections.get(collection))
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    pub fn snapshot(&self, room: &str, target: FeedTarget) -> Snapshot {
        self.rooms()
            .get(room)
            .map(|r| r.snapshot(target))
            .unwrap_or_default()
    }

    /// Delete a document directly, as another client or an admin would.
    pub fn remove(&self, room: &str, collection: &str, id: &str) -> bool {
        let mut rooms = self.rooms();
        let Some(room) = rooms.get_mut(room) else {
            return false;
        };
        let removed = room
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some();
        if removed {
            room.notify(collection, id);
        }
        removed
    }

    fn apply_upsert(&self, room: &str, path: &DocPath, doc: Document) -> Result<(), SyncError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Remote("remote store is offline".into()));
        }

        let stamp = self.next_timestamp();
        let mut rooms = self.rooms();
        let room_state = rooms.entry(room.to_string()).or_default();
        let existing = room_state
            .collections
            .entry(path.collection.clone())
            .or_default()
            .entry(path.id.clone())
            .or_default();
        for (field, value) in doc {
            existing.insert(field, value);
        }
        existing.insert(UPDATED_AT_FIELD.to_string(), Value::from(stamp));
        room_state.notify(&path.collection, &path.id);

        self.inner.upserts.fetch_add(1, Ordering::SeqCst);
        if path.collection == REMOTE_META && path.id == REMOTE_SETTINGS_DOC {
            self.inner.settings_pushes.fetch_add(1, Ordering::SeqCst);
        }

        debug!(room, path = %path, updated_at = stamp, "Upserted document");
        Ok(())
    }

    fn open_feed(&self, room: &str, target: FeedTarget) -> BoxStream<'static, Snapshot> {
        let rx = {
            let mut rooms = self.rooms();
            let room_state = rooms.entry(room.to_string()).or_default();
            let current = room_state.snapshot(target);
            room_state
                .feeds
                .entry(target)
                .or_insert_with(|| watch::channel(current).0)
                .subscribe()
        };

        self.inner.live_feeds.fetch_add(1, Ordering::SeqCst);
        let guard = FeedGuard(self.inner.live_feeds.clone());

        futures::stream::unfold((rx, guard, true), |(mut rx, guard, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let snapshot = rx.borrow_and_update().clone();
            Some((snapshot, (rx, guard, false)))
        })
        .boxed()
    }
}

impl IdentityProvider for MemoryRemote {
    fn ensure_identity(&self) -> BoxFuture<'_, Result<Identity, SyncError>> {
        async move {
            self.inner.identity_requests.fetch_add(1, Ordering::SeqCst);
            let mut uid = self
                .inner
                .uid
                .lock()
                .map_err(|e| SyncError::Identity(format!("Lock poisoned: {e}")))?;
            let uid = uid
                .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
                .clone();
            Ok(Identity { uid, token: None })
        }
        .boxed()
    }
}

impl RemoteStore for MemoryRemote {
    fn upsert<'a>(
        &'a self,
        room: &'a str,
        path: &'a DocPath,
        doc: Document,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        async move { self.apply_upsert(room, path, doc) }.boxed()
    }

    fn subscribe<'a>(
        &'a self,
        room: &'a str,
        target: FeedTarget,
    ) -> BoxFuture<'a, Result<BoxStream<'static, Snapshot>, SyncError>> {
        async move { Ok(self.open_feed(room, target)) }.boxed()
    }
}
