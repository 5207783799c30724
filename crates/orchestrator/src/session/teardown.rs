//! Idempotent session teardown.

use tracing::{debug, info};

use super::Session;
use crate::collaboration::CollaborationMode;

impl Session {
    /// Release every resource the session holds.
    ///
    /// Safe to call repeatedly and while other operations are in flight.
    /// Each step tolerates resources that were never created.
    pub fn destroy(&self) {
        let (transport, mode, observers, documents) = {
            let mut state = self.state();
            if state.destroyed {
                debug!(session_id = %self.id(), "Session already destroyed");
                return;
            }
            state.destroyed = true;
            state.saves.abort_all();
            state.active_editor = None;
            state.readiness.reset();
            state.comments_list_rendered = false;
            (
                state.transport.take(),
                std::mem::take(&mut state.collaboration),
                std::mem::take(&mut state.lock_observers),
                std::mem::take(&mut state.documents),
            )
        };

        if let Some(transport) = transport {
            transport.cancel_retry();
            transport.disconnect();
            transport.destroy();
            debug!("Transport closed");
        }

        for (replica, id) in observers {
            replica.unobserve_meta(id);
        }

        // A per-document handle is shut down with its Document below.
        if let CollaborationMode::SharedSession(handle) = mode {
            handle.shutdown();
            debug!("Session channel closed");
        }

        let count = documents.len();
        for mut document in documents {
            if let Some(handle) = document.take_collaboration() {
                handle.shutdown();
            }
            document.unbind_editor();
        }

        if let Some(host) = &self.inner.collaborators.host {
            host.unmount();
        }
        self.inner.events.clear();

        info!(session_id = %self.id(), documents = count, "Session destroyed");
    }
}
