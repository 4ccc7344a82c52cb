//! The mirror task.
//!
//! One tokio task owns the sync session. It watches the state tree for
//! sync key changes and local edits, pushes changed records upward, and
//! turns remote snapshots into `MergeRemote` actions sent back to the
//! owner of the store. All of its work is serialized on that one task.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lacquer_shared::{
    Action, AppState, Collection, Manicure, MergePolicy, Polish, Record, RemoteCollection, RemoteSettings,
    RemoteUpdate, Settings, Tool,
};

use crate::reconcile::Baseline;
use crate::remote::{record_to_document, DocPath, FeedTarget, IdentityProvider, RemoteStore, Snapshot};

/// Tuning for [`spawn_mirror`].
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Local changes are collected for this long before a flush.
    pub debounce: Duration,
    pub policy: MergePolicy,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            policy: MergePolicy::Replace,
        }
    }
}

/// Receiver of the actions the mirror derives from remote snapshots. They
/// must be applied in order with every other dispatch.
pub trait ActionSink: Send + 'static {
    /// Returns `false` once nobody is listening any more.
    fn send_action(&self, action: Action) -> bool;
}

impl ActionSink for mpsc::UnboundedSender<Action> {
    fn send_action(&self, action: Action) -> bool {
        self.send(action).is_ok()
    }
}

/// Owner handle of a running mirror. Dropping it aborts the task and
/// every subscription it holds.
pub struct MirrorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MirrorHandle {
    /// Stop the mirror and wait until its session is torn down.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Mirror task failed");
                }
            }
        }
    }
}

impl Drop for MirrorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawn the mirror on the current tokio runtime.
///
/// `state_rx` is the store's state feed; merges of inbound snapshots go
/// out through `actions`.
pub fn spawn_mirror(
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    config: MirrorConfig,
    state_rx: watch::Receiver<Arc<AppState>>,
    actions: impl ActionSink,
) -> MirrorHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = MirrorTask {
        remote,
        identity,
        config,
        state_rx,
        actions: Box::new(actions),
        session: None,
        current_key: String::new(),
        flush_at: None,
    };

    MirrorHandle {
        shutdown: Some(shutdown_tx),
        task: Some(tokio::spawn(task.run(shutdown_rx))),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything tied to one sync key. Dropping it aborts the listeners.
struct Session {
    room: String,
    listeners: JoinSet<()>,
    inbound_tx: mpsc::UnboundedSender<(FeedTarget, Snapshot)>,
    inbound: mpsc::UnboundedReceiver<(FeedTarget, Snapshot)>,
    polishes: Baseline<Polish>,
    tools: Baseline<Tool>,
    manicures: Baseline<Manicure>,
    /// Settings the remote is known to hold, sync key stripped.
    settings: Option<Settings>,
    /// Settings from the last snapshot, sync key stripped.
    seen_settings: Option<Settings>,
}

impl Session {
    fn new(room: String) -> Self {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        Self {
            room,
            listeners: JoinSet::new(),
            inbound_tx,
            inbound,
            polishes: Baseline::default(),
            tools: Baseline::default(),
            manicures: Baseline::default(),
            settings: None,
            seen_settings: None,
        }
    }

    fn listen(&mut self, target: FeedTarget, mut feed: BoxStream<'static, Snapshot>) {
        let tx = self.inbound_tx.clone();
        self.listeners.spawn(async move {
            while let Some(snapshot) = feed.next().await {
                if tx.send((target, snapshot)).is_err() {
                    break;
                }
            }
            debug!(feed = %target, "Remote feed ended");
        });
    }

    fn has_pending(&self, state: &AppState) -> bool {
        state.polishes.iter().any(|r| self.polishes.is_dirty(r))
            || state.tools.iter().any(|r| self.tools.is_dirty(r))
            || state.manicures.iter().any(|r| self.manicures.is_dirty(r))
            || self.settings.as_ref() != Some(&state.settings.without_sync_key())
    }

    async fn push_records(&mut self, remote: &dyn RemoteStore, state: &AppState) -> usize {
        push_collection(remote, &self.room, &state.polishes, &mut self.polishes).await
            + push_collection(remote, &self.room, &state.tools, &mut self.tools).await
            + push_collection(remote, &self.room, &state.manicures, &mut self.manicures).await
    }

    async fn push_settings(&mut self, remote: &dyn RemoteStore, settings: &Settings) {
        let outgoing = settings.without_sync_key();
        if self.settings.as_ref() == Some(&outgoing) {
            return;
        }
        match remote
            .upsert(&self.room, &DocPath::settings(), settings.to_remote_document())
            .await
        {
            Ok(()) => self.settings = Some(outgoing),
            Err(e) => warn!(room = %self.room, error = %e, "Failed to push settings"),
        }
    }

    /// Turn a snapshot into a merge against the current baseline, and
    /// adopt the snapshot as the new baseline.
    fn merge_inbound(&mut self, target: FeedTarget, snapshot: &Snapshot, policy: MergePolicy) -> Option<RemoteUpdate> {
        let update = match target {
            FeedTarget::Collection(Collection::Polishes) => {
                RemoteUpdate::Polishes(remote_collection(policy, &mut self.polishes, snapshot))
            }
            FeedTarget::Collection(Collection::Tools) => {
                RemoteUpdate::Tools(remote_collection(policy, &mut self.tools, snapshot))
            }
            FeedTarget::Collection(Collection::Manicures) => {
                RemoteUpdate::Manicures(remote_collection(policy, &mut self.manicures, snapshot))
            }
            FeedTarget::Settings => {
                let (_, document) = snapshot.documents.first()?;
                let remote_now = Settings::default().merge_remote(document).without_sync_key();
                self.settings = Some(remote_now.clone());
                RemoteUpdate::Settings(RemoteSettings {
                    policy,
                    document: document.clone(),
                    synced: self.seen_settings.replace(remote_now),
                })
            }
        };
        Some(update)
    }

    fn close(mut self) {
        self.listeners.abort_all();
    }
}

fn remote_collection<T: Record>(policy: MergePolicy, baseline: &mut Baseline<T>, snapshot: &Snapshot) -> RemoteCollection<T> {
    let records: Vec<T> = snapshot.decode();
    let synced = baseline.advance(&records);
    RemoteCollection {
        policy,
        records,
        synced,
    }
}

/// Upsert every record that differs from the baseline. Failures are
/// logged and the record stays dirty for the next flush.
async fn push_collection<T: Record>(
    remote: &dyn RemoteStore,
    room: &str,
    local: &[T],
    baseline: &mut Baseline<T>,
) -> usize {
    let mut pushed = 0;
    for record in local {
        if !baseline.is_dirty(record) {
            continue;
        }
        let doc = match record_to_document(record) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(collection = %T::COLLECTION, id = %record.id(), error = %e, "Cannot encode record");
                continue;
            }
        };
        let path = DocPath::record(T::COLLECTION, record.id());
        match remote.upsert(room, &path, doc).await {
            Ok(()) => {
                baseline.mark_synced(record);
                pushed += 1;
            }
            Err(e) => warn!(room, path = %path, error = %e, "Failed to push record"),
        }
    }
    pushed
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

struct MirrorTask {
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    config: MirrorConfig,
    state_rx: watch::Receiver<Arc<AppState>>,
    actions: Box<dyn ActionSink>,
    session: Option<Session>,
    /// Trimmed key of the current (or failed) session; empty when inert.
    current_key: String,
    flush_at: Option<Instant>,
}

impl MirrorTask {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let initial = self.state_rx.borrow_and_update().clone();
        self.on_state(initial).await;

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        debug!("State feed closed");
                        break;
                    }
                    let state = self.state_rx.borrow_and_update().clone();
                    self.on_state(state).await;
                }

                Some((target, snapshot)) = next_inbound(&mut self.session) => {
                    if !self.on_inbound(target, snapshot) {
                        debug!("Action sink closed");
                        break;
                    }
                }

                () = wait_until(self.flush_at) => {
                    self.flush_at = None;
                    self.flush().await;
                }
            }
        }

        self.teardown();
        debug!("Mirror stopped");
    }

    async fn on_state(&mut self, state: Arc<AppState>) {
        let key = state
            .settings
            .active_sync_key()
            .unwrap_or_default()
            .to_string();

        if key != self.current_key {
            self.teardown();
            self.current_key = key;
            if !self.current_key.is_empty() {
                self.activate(&state).await;
            }
            return;
        }

        if self.session.is_some() {
            if self.flush_at.is_none() {
                self.flush_at = Some(Instant::now() + self.config.debounce);
            }
        } else if !self.current_key.is_empty() {
            // The last activation failed; try again now that something changed.
            self.activate(&state).await;
        }
    }

    async fn activate(&mut self, state: &AppState) {
        let room = self.current_key.clone();

        match self.identity.ensure_identity().await {
            Ok(identity) => debug!(uid = %identity.uid, "Identity confirmed"),
            Err(e) => {
                warn!(room = %room, error = %e, "No identity, sync stays inactive");
                return;
            }
        }

        let mut session = Session::new(room);

        for target in FeedTarget::ALL {
            match self.remote.subscribe(&session.room, target).await {
                Ok(feed) => session.listen(target, feed),
                Err(e) => warn!(room = %session.room, feed = %target, error = %e, "Subscription failed"),
            }
        }

        session.push_settings(self.remote.as_ref(), &state.settings).await;
        let pushed = session.push_records(self.remote.as_ref(), state).await;

        info!(room = %session.room, pushed, feeds = session.listeners.len(), "Sync session active");
        self.session = Some(session);
    }

    fn teardown(&mut self) {
        self.flush_at = None;
        if let Some(session) = self.session.take() {
            info!(room = %session.room, "Sync session closed");
            session.close();
        }
    }

    async fn flush(&mut self) {
        let state = self.state_rx.borrow().clone();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.has_pending(&state) {
            return;
        }

        if let Err(e) = self.identity.ensure_identity().await {
            warn!(room = %session.room, error = %e, "No identity, skipping push");
            return;
        }

        let pushed = session.push_records(self.remote.as_ref(), &state).await;
        session.push_settings(self.remote.as_ref(), &state.settings).await;
        debug!(room = %session.room, pushed, "Flushed local changes");
    }

    /// Returns `false` once nobody is listening for actions any more.
    fn on_inbound(&mut self, target: FeedTarget, snapshot: Snapshot) -> bool {
        let Some(session) = self.session.as_mut() else {
            return true;
        };
        let Some(update) = session.merge_inbound(target, &snapshot, self.config.policy) else {
            return true;
        };

        debug!(room = %session.room, feed = %target, documents = snapshot.len(), "Merging remote snapshot");
        self.actions.send_action(Action::MergeRemote(update))
    }
}

async fn next_inbound(session: &mut Option<Session>) -> Option<(FeedTarget, Snapshot)> {
    match session {
        Some(session) => session.inbound.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
