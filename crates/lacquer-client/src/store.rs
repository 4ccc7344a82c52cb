//! The explicit state store.
//!
//! [`Store`] owns the current [`AppState`] behind a `watch` channel. Every
//! write goes through [`Store::dispatch`], which runs the reducer and
//! publishes the replacement tree to subscribers. The tree itself is never
//! mutated in place.

use std::sync::Arc;

use lacquer_shared::{reduce, Action, AppState};
use tokio::sync::watch;

pub struct Store {
    tx: watch::Sender<Arc<AppState>>,
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> Arc<AppState> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.tx.subscribe()
    }

    /// Reduce `action` into the current state and return the result.
    ///
    /// When the reducer yields an equal state nothing is published and the
    /// previous `Arc` is returned unchanged.
    pub fn dispatch(&self, action: Action) -> Arc<AppState> {
        self.tx.send_if_modified(|current| {
            let next = reduce(current, action);
            if next == **current {
                false
            } else {
                *current = Arc::new(next);
                true
            }
        });
        self.state()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lacquer_shared::{EntityAction, Polish, SettingsPatch};

    #[test]
    fn dispatch_publishes_new_tree() {
        let store = Store::default();
        let mut rx = store.subscribe();
        let before = store.state();

        let after = store.dispatch(Action::Polish(EntityAction::Add(Polish::new("OPI", "Bubble Bath"))));

        assert!(!Arc::ptr_eq(&before, &after));
        assert!(before.polishes.is_empty());
        assert_eq!(after.polishes.len(), 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().polishes.len(), 1);
    }

    #[test]
    fn equal_results_are_not_published() {
        let store = Store::default();
        let mut rx = store.subscribe();
        rx.borrow_and_update();
        let before = store.state();

        let after = store.dispatch(Action::Polish(EntityAction::Delete("missing".into())));
        assert!(Arc::ptr_eq(&before, &after));
        assert!(!rx.has_changed().unwrap());

        let after = store.dispatch(Action::SettingsUpdate(SettingsPatch::new().wall_count(2)));
        assert!(Arc::ptr_eq(&before, &after));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn wall_count_update_renames_walls() {
        let store = Store::default();
        let state = store.dispatch(Action::SettingsUpdate(SettingsPatch::new().wall_count(3)));
        assert_eq!(state.settings.wall_names, vec!["A", "B", "C"]);
    }
}
