//! Session locking.
//!
//! [`Session::set_locked`] is the write path: it records `{locked, lockedBy}`
//! in each collaborative Document's shared metadata, one transaction per
//! Document. [`Session::lock_superdoc`] is the apply path and the only place
//! local lock state changes. Peers reach it through the metadata observers
//! installed at construction; the writer calls it once itself.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::{LockStatus, Session};
use crate::{
    collaboration::{MetaChange, MetaValue, Replica, META_LOCKED, META_LOCKED_BY},
    events::SessionEvent,
    types::User,
};

impl Session {
    /// Lock or unlock the session for every peer.
    pub fn set_locked(&self, lock: bool) {
        let (user, replicas) = {
            let state = self.state();
            let replicas: Vec<Arc<dyn Replica>> = state
                .documents
                .iter()
                .filter_map(|doc| doc.collaboration())
                .map(|handle| Arc::clone(&handle.replica))
                .collect();
            (state.user.clone(), replicas)
        };

        let locked_by = serde_json::to_value(&user).unwrap_or(MetaValue::Null);
        for replica in &replicas {
            replica.transact_meta(vec![
                (META_LOCKED.to_string(), MetaValue::Bool(lock)),
                (META_LOCKED_BY.to_string(), locked_by.clone()),
            ]);
        }
        debug!(locked = lock, documents = replicas.len(), "Lock written to shared metadata");

        self.lock_superdoc(lock, Some(user));
    }

    /// Apply a lock state locally and emit `locked`.
    pub fn lock_superdoc(&self, is_locked: bool, locked_by: Option<User>) {
        self.state().lock = LockStatus {
            is_locked,
            locked_by: locked_by.clone(),
            locked_at: is_locked.then(Utc::now),
        };
        info!(
            locked = is_locked,
            by = ?locked_by.as_ref().and_then(|user| user.name.as_deref()),
            "Lock state applied"
        );
        self.emit(&SessionEvent::Locked {
            is_locked,
            locked_by,
        });
    }

    pub(super) fn observe_lock_changes(&self) {
        let replicas: Vec<Arc<dyn Replica>> = self
            .state()
            .documents
            .iter()
            .filter_map(|doc| doc.collaboration())
            .map(|handle| Arc::clone(&handle.replica))
            .collect();

        let observers = replicas
            .into_iter()
            .map(|replica| {
                let session = Arc::downgrade(&self.inner);
                let source = Arc::downgrade(&replica);
                let id = replica.observe_meta(Arc::new(move |change: &MetaChange| {
                    if change.is_local() || !change.has(META_LOCKED) {
                        return;
                    }
                    if let (Some(inner), Some(replica)) = (session.upgrade(), source.upgrade()) {
                        Self { inner }.apply_remote_lock(replica.as_ref());
                    }
                }));
                (replica, id)
            })
            .collect();

        self.state().lock_observers = observers;
    }

    fn apply_remote_lock(&self, replica: &dyn Replica) {
        let is_locked = replica
            .get_meta(META_LOCKED)
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        let locked_by = replica
            .get_meta(META_LOCKED_BY)
            .and_then(|value| serde_json::from_value::<User>(value).ok());

        let unchanged = {
            let state = self.state();
            state.lock.is_locked == is_locked && state.lock.locked_by == locked_by
        };
        if unchanged {
            debug!(replica = replica.name(), "Remote lock matches local state");
            return;
        }
        self.lock_superdoc(is_locked, locked_by);
    }
}
