/*
 * Responsibility
 * - Typed internal events (ProfileCreated) and the outbound channel they travel on
 * - Publishing never blocks and never fails the caller; delivery is fire-and-forget
 * - Subscribers (audit log, welcome provisioning, ...) hang off the receiving end
 */
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCreated {
    pub profile_id: Uuid,
    pub dn: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<ProfileCreated>,
}

impl EventPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProfileCreated>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn profile_created(&self, event: ProfileCreated) {
        let profile_id = event.profile_id;
        if self.tx.send(event).is_err() {
            warn!(profile_id = %profile_id, "profile_created dropped: no subscriber");
        }
    }
}

/// Drain the channel into the audit log until every publisher is dropped.
pub fn spawn_audit_subscriber(mut rx: mpsc::UnboundedReceiver<ProfileCreated>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!(
                profile_id = %event.profile_id,
                dn = %event.dn,
                at = %event.timestamp,
                "profile created"
            );
        }
    })
}
