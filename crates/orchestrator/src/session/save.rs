//! Immediate-save coordination.
//!
//! A save round asks every collaborative Document for an immediate save by
//! setting `immediate-save` in its shared metadata, then waits until each
//! one has flipped `immediate-save-finished`. The pending set is fixed
//! before the first request goes out and each Document acknowledges at most
//! once.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::Session;
use crate::{
    collaboration::{
        MetaChange, MetaValue, ObserverId, Replica, META_IMMEDIATE_SAVE,
        META_IMMEDIATE_SAVE_FINISHED,
    },
    types::DocumentId,
    Error, Result,
};

type RoundId = u64;

struct SaveRound {
    pending: BTreeSet<DocumentId>,
    done: Option<oneshot::Sender<()>>,
    observers: Vec<(Arc<dyn Replica>, ObserverId)>,
}

impl SaveRound {
    fn release(mut self) {
        for (replica, id) in self.observers.drain(..) {
            replica.unobserve_meta(id);
        }
    }
}

/// Save rounds in flight.
#[derive(Default)]
pub(crate) struct SaveRounds {
    next: RoundId,
    rounds: HashMap<RoundId, SaveRound>,
}

impl SaveRounds {
    pub(crate) fn pending(&self) -> usize {
        self.rounds.values().map(|round| round.pending.len()).sum()
    }

    /// Abandon every round; their waiters resolve with [`Error::Destroyed`].
    pub(crate) fn abort_all(&mut self) {
        for (_, round) in self.rounds.drain() {
            round.release();
        }
    }
}

impl Session {
    /// Resolve once every collaborative Document acknowledged an immediate
    /// save. There is no deadline; see [`Session::save_with_timeout`].
    pub async fn save(&self) -> Result<()> {
        let Some((_, done)) = self.begin_save() else {
            return Ok(());
        };
        done.await.map_err(|_| Error::Destroyed)
    }

    /// Like [`Session::save`], failing with [`Error::SaveTimeout`] if the
    /// acknowledgments do not all arrive within `limit`.
    pub async fn save_with_timeout(&self, limit: Duration) -> Result<()> {
        let Some((round, done)) = self.begin_save() else {
            return Ok(());
        };
        match tokio::time::timeout(limit, done).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::Destroyed),
            Err(_) => {
                let pending = self.abandon_save(round);
                warn!(pending, "Save timed out waiting for acknowledgments");
                Err(Error::SaveTimeout { pending })
            }
        }
    }

    /// Acknowledgments outstanding across all save rounds.
    pub fn pending_save_acknowledgments(&self) -> usize {
        self.state().saves.pending()
    }

    fn begin_save(&self) -> Option<(RoundId, oneshot::Receiver<()>)> {
        let targets: Vec<(DocumentId, Arc<dyn Replica>)> = self
            .state()
            .documents
            .iter()
            .filter_map(|doc| {
                doc.collaboration()
                    .map(|handle| (doc.id.clone(), Arc::clone(&handle.replica)))
            })
            .collect();

        if targets.is_empty() {
            debug!("No collaborative documents; nothing to save");
            return None;
        }

        let (tx, rx) = oneshot::channel();
        let round = {
            let mut state = self.state();
            let round = state.saves.next;
            state.saves.next += 1;
            state.saves.rounds.insert(
                round,
                SaveRound {
                    pending: targets.iter().map(|(id, _)| id.clone()).collect(),
                    done: Some(tx),
                    observers: Vec::new(),
                },
            );
            round
        };

        let observers: Vec<(Arc<dyn Replica>, ObserverId)> = targets
            .iter()
            .map(|(document_id, replica)| {
                let session = Arc::downgrade(&self.inner);
                let document_id = document_id.clone();
                let id = replica.observe_meta(Arc::new(move |change: &MetaChange| {
                    if !change.has(META_IMMEDIATE_SAVE_FINISHED) {
                        return;
                    }
                    if let Some(inner) = session.upgrade() {
                        Self { inner }.acknowledge_save(round, &document_id);
                    }
                }));
                (Arc::clone(replica), id)
            })
            .collect();

        if let Some(entry) = self.state().saves.rounds.get_mut(&round) {
            entry.observers = observers;
        }

        info!(round, documents = targets.len(), "Requesting immediate save");
        for (_, replica) in &targets {
            replica.set_meta(META_IMMEDIATE_SAVE, MetaValue::Bool(true));
        }

        Some((round, rx))
    }

    fn acknowledge_save(&self, round: RoundId, document_id: &DocumentId) {
        let finished = {
            let mut state = self.state();
            let Some(entry) = state.saves.rounds.get_mut(&round) else {
                return;
            };
            if !entry.pending.remove(document_id) {
                return;
            }
            debug!(round, document_id = %document_id, remaining = entry.pending.len(), "Save acknowledged");
            if entry.pending.is_empty() {
                state.saves.rounds.remove(&round)
            } else {
                None
            }
        };

        if let Some(mut entry) = finished {
            if let Some(done) = entry.done.take() {
                let _ = done.send(());
            }
            entry.release();
            info!(round, "Save complete");
        }
    }

    fn abandon_save(&self, round: RoundId) -> usize {
        let entry = self.state().saves.rounds.remove(&round);
        entry.map_or(0, |entry| {
            let pending = entry.pending.len();
            entry.release();
            pending
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::{
        collaboration::MemoryBackend,
        config::{CollaborationConfig, SessionConfig},
        registry::{DocumentDescriptor, DocumentInput},
        types::DocumentType,
    };

    fn collaborative(ids: &[&str], backend: Arc<MemoryBackend>) -> Result<Session> {
        let mut config = SessionConfig::with_selector("#app");
        config.modules.collaboration = Some(CollaborationConfig::default());
        config.documents = ids
            .iter()
            .map(|id| DocumentInput::from(DocumentDescriptor::with_id(*id, DocumentType::Docx)))
            .collect();
        Session::builder(config)
            .collaboration_backend(backend)
            .build()
    }

    fn acknowledge(backend: &MemoryBackend, room: &str) {
        backend
            .join(room, format!("{room}#server"))
            .set_meta(META_IMMEDIATE_SAVE_FINISHED, MetaValue::Bool(true));
    }

    #[tokio::test]
    async fn test_non_collaborative_save_resolves_immediately() -> Result<()> {
        let session = Session::new(SessionConfig::with_selector("#app"))?;
        session.save().await
    }

    #[test]
    fn test_save_waits_for_every_document() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let session = collaborative(&["a", "b", "c"], Arc::clone(&backend))?;

        let mut save = task::spawn(session.save());
        assert_pending!(save.poll());
        assert_eq!(session.pending_save_acknowledgments(), 3);

        acknowledge(&backend, "c");
        assert_pending!(save.poll());
        acknowledge(&backend, "c");
        assert_pending!(save.poll());
        assert_eq!(session.pending_save_acknowledgments(), 2);

        acknowledge(&backend, "a");
        assert_pending!(save.poll());
        acknowledge(&backend, "b");
        assert!(save.is_woken());
        assert_ready!(save.poll())?;
        assert_eq!(session.pending_save_acknowledgments(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_with_acknowledging_server() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new().with_save_acknowledgments());
        let session = collaborative(&["a", "b"], backend)?;

        session.save().await?;

        let doc = &session.documents()[0];
        let replica = doc.collaboration().map(|h| Arc::clone(&h.replica));
        assert_eq!(
            replica.and_then(|r| r.get_meta(META_IMMEDIATE_SAVE)),
            Some(MetaValue::Bool(true))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_save_timeout_reports_pending() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let session = collaborative(&["a", "b"], Arc::clone(&backend))?;
        // An acknowledgment from before the request does not count.
        acknowledge(&backend, "a");

        let result = session.save_with_timeout(Duration::from_millis(50)).await;
        assert_eq!(result, Err(Error::SaveTimeout { pending: 2 }));
        assert_eq!(session.pending_save_acknowledgments(), 0);
        Ok(())
    }

    #[test]
    fn test_destroy_releases_waiters() -> Result<()> {
        let backend = Arc::new(MemoryBackend::new());
        let session = collaborative(&["a"], backend)?;

        let mut save = task::spawn(session.save());
        assert_pending!(save.poll());
        session.destroy();
        assert_eq!(assert_ready!(save.poll()), Err(Error::Destroyed));
        Ok(())
    }
}
