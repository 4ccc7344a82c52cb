//! The single dispatch queue.
//!
//! One tokio task owns the [`Store`] and the [`LocalPersistence`] handle.
//! Local commands and remote merges share one channel into it, so actions
//! are applied in the order they were sent, and each state change is
//! written to disk before the next action is applied.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use lacquer_shared::{Action, AppState};
use lacquer_store::LocalPersistence;
use lacquer_sync::ActionSink;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::Store;

/// An action plus, for awaited dispatches, where to send the new state.
type Queued = (Action, Option<oneshot::Sender<Arc<AppState>>>);

pub struct RuntimeHandle {
    queue: mpsc::UnboundedSender<Queued>,
    state: watch::Receiver<Arc<AppState>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Fire-and-forget access to the queue, as used by the remote mirror.
#[derive(Clone)]
pub struct ActionSender(mpsc::UnboundedSender<Queued>);

impl ActionSender {
    pub fn send(&self, action: Action) -> Result<()> {
        self.0
            .send((action, None))
            .map_err(|_| anyhow!("state runtime has stopped"))
    }
}

impl ActionSink for ActionSender {
    fn send_action(&self, action: Action) -> bool {
        self.send(action).is_ok()
    }
}

/// Hydrate a fresh store from `persistence` and start the queue.
pub fn boot(persistence: LocalPersistence) -> RuntimeHandle {
    let store = Store::default();
    store.dispatch(Action::Hydrate(persistence.load()));
    spawn_runtime(store, persistence)
}

pub fn spawn_runtime(store: Store, persistence: LocalPersistence) -> RuntimeHandle {
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let state = store.subscribe();

    let task = tokio::spawn(run(store, persistence, queue_rx, shutdown_rx));

    RuntimeHandle {
        queue: queue_tx,
        state,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    }
}

impl RuntimeHandle {
    /// Queue `action` and wait until it has been applied.
    pub async fn dispatch(&self, action: Action) -> Result<Arc<AppState>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.queue
            .send((action, Some(ack_tx)))
            .map_err(|_| anyhow!("state runtime has stopped"))?;
        ack_rx.await.map_err(|_| anyhow!("state runtime dropped the request"))
    }

    pub fn sender(&self) -> ActionSender {
        ActionSender(self.queue.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.state.clone()
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.borrow().clone()
    }

    /// Apply everything already queued, then stop the task.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "State runtime failed");
            }
        }
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    store: Store,
    persistence: LocalPersistence,
    mut queue: mpsc::UnboundedReceiver<Queued>,
    mut shutdown: oneshot::Receiver<()>,
) {
    info!("State runtime started");

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            queued = queue.recv() => {
                let Some((action, ack)) = queued else { break };
                let state = apply(&store, &persistence, action);
                if let Some(ack) = ack {
                    let _ = ack.send(state);
                }
            }
        }
    }

    queue.close();
    while let Ok((action, ack)) = queue.try_recv() {
        let state = apply(&store, &persistence, action);
        if let Some(ack) = ack {
            let _ = ack.send(state);
        }
    }

    info!("State runtime stopped");
}

fn apply(store: &Store, persistence: &LocalPersistence, action: Action) -> Arc<AppState> {
    let kind = action_kind(&action);
    let before = store.state();
    let after = store.dispatch(action);

    if Arc::ptr_eq(&before, &after) {
        debug!(action = kind, "Dispatch left state unchanged");
    } else {
        debug!(action = kind, "State changed");
        persistence.save(&after);
    }
    after
}

fn action_kind(action: &Action) -> &'static str {
    match action {
        Action::Hydrate(_) => "hydrate",
        Action::HydratePartial(_) => "hydrate/partial",
        Action::MergeRemote(_) => "merge/remote",
        Action::SettingsUpdate(_) => "settings/update",
        Action::Polish(_) => "polish",
        Action::Tool(_) => "tool",
        Action::Manicure(_) => "manicure",
        Action::Reset => "reset",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lacquer_shared::{EntityAction, PartialState, Polish, SettingsPatch};
    use lacquer_store::Database;

    fn open(path: &std::path::Path) -> LocalPersistence {
        LocalPersistence::new(Database::open_at(path).unwrap())
    }

    #[tokio::test]
    async fn changes_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lacquer.db");

        let runtime = boot(open(&path));
        let polish = Polish::new("Essie", "Ballet Slippers");
        runtime
            .dispatch(Action::Polish(EntityAction::Add(polish.clone())))
            .await
            .unwrap();
        runtime
            .dispatch(Action::SettingsUpdate(SettingsPatch::new().wall_count(3)))
            .await
            .unwrap();
        runtime.shutdown().await;

        let runtime = boot(open(&path));
        let state = runtime.state();
        assert_eq!(state.polish(&polish.id), Some(&polish));
        assert_eq!(state.settings.wall_names, vec!["A", "B", "C"]);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn sender_actions_are_applied_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = boot(open(&dir.path().join("lacquer.db")));
        let sender = runtime.sender();

        let first = Polish::new("OPI", "Malaga Wine");
        let second = Polish::new("OPI", "Lincoln Park After Dark");
        sender
            .send(Action::HydratePartial(PartialState::polishes(vec![first.clone()])))
            .unwrap();
        sender
            .send(Action::Polish(EntityAction::Add(second.clone())))
            .unwrap();

        // The ack comes back only after everything queued before it.
        let state = runtime.dispatch(Action::Polish(EntityAction::Delete("missing".into()))).await.unwrap();
        let ids: Vec<&str> = state.polishes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn mirror_actions_and_dispatches_share_one_order() {
        let runtime = boot(LocalPersistence::new(Database::open_in_memory().unwrap()));
        let sender = runtime.sender();

        let remote = Polish::new("OPI", "Remote");
        let local = Polish::new("OPI", "Local");
        sender
            .send(Action::HydratePartial(PartialState::polishes(vec![remote.clone()])))
            .unwrap();
        let state = runtime
            .dispatch(Action::Polish(EntityAction::Add(local.clone())))
            .await
            .unwrap();

        let ids: Vec<&str> = state.polishes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![local.id.as_str(), remote.id.as_str()]);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn unchanged_dispatch_skips_save() {
        let runtime = boot(LocalPersistence::new(Database::open_in_memory().unwrap()));
        let before = runtime.state();
        let after = runtime.dispatch(Action::Polish(EntityAction::Delete("missing".into()))).await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_fails() {
        let runtime = boot(LocalPersistence::new(Database::open_in_memory().unwrap()));
        let sender = runtime.sender();
        runtime.shutdown().await;
        assert!(sender.send(Action::Reset).is_err());
    }
}
