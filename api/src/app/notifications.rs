//! Ledger notification dispatch
//!
//! The ledger service pushes events into an unbounded channel after its
//! transaction commits; a background task drains the channel into a
//! `MembershipNotifier`. Emitting never blocks and a failed delivery is only
//! logged.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::ports::{LedgerEvent, MembershipNotifier};

/// Sending half handed to the ledger service
#[derive(Clone)]
pub struct LedgerEventSink {
    tx: mpsc::UnboundedSender<LedgerEvent>,
}

impl LedgerEventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LedgerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event (non-blocking, fire-and-forget)
    pub fn emit(&self, event: LedgerEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(
                member_id = %e.0.target_id(),
                "Notification dispatcher is gone; dropping ledger event"
            );
        }
    }
}

/// Spawn the background task that delivers queued events
pub fn spawn_dispatcher(
    notifier: Arc<dyn MembershipNotifier>,
    rx: mpsc::UnboundedReceiver<LedgerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(run_dispatcher(notifier, rx))
}

/// Deliver events until every sink is dropped
pub async fn run_dispatcher(
    notifier: Arc<dyn MembershipNotifier>,
    mut rx: mpsc::UnboundedReceiver<LedgerEvent>,
) {
    while let Some(event) = rx.recv().await {
        let result = match &event {
            LedgerEvent::MemberExpired {
                target_id,
                affected_ids,
                ..
            } => notifier.notify_expired(target_id, affected_ids).await,
            LedgerEvent::MemberReverted {
                target_id,
                affected_ids,
                ..
            } => notifier.notify_reverted(target_id, affected_ids).await,
        };

        if let Err(e) = result {
            tracing::warn!(
                error = %e,
                member_id = %event.target_id(),
                "Failed to deliver ledger notification"
            );
        }
    }

    tracing::debug!("Notification dispatcher stopped");
}
