//! Database notification channels that wake the monitor.

use std::collections::BTreeSet;
use std::time::Duration;

use sqlx::postgres::PgListener;
use sqlx::PgPool;

use crate::DbResult;

/// How long to keep draining notifications that are already in flight after
/// the first one arrives. Anything later wakes the next call instead.
const DRAIN_GRACE: Duration = Duration::from_millis(50);

/// The notification channels the queue monitor subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueueEvent {
    BuildsAdded,
    BuildsRestarted,
    BuildsCancelled,
    BuildsDeleted,
}

impl QueueEvent {
    pub const ALL: [QueueEvent; 4] = [
        QueueEvent::BuildsAdded,
        QueueEvent::BuildsRestarted,
        QueueEvent::BuildsCancelled,
        QueueEvent::BuildsDeleted,
    ];

    pub fn channel(self) -> &'static str {
        match self {
            QueueEvent::BuildsAdded => "builds_added",
            QueueEvent::BuildsRestarted => "builds_restarted",
            QueueEvent::BuildsCancelled => "builds_cancelled",
            QueueEvent::BuildsDeleted => "builds_deleted",
        }
    }

    fn from_channel(channel: &str) -> Option<Self> {
        QueueEvent::ALL.into_iter().find(|e| e.channel() == channel)
    }
}

/// One dedicated connection receiving queue notifications.
///
/// Notifications are wake signals only; payloads are ignored. Notifications
/// that arrive while the monitor is scanning are buffered by the driver and
/// surface on the next wait.
pub struct QueueListener {
    listener: PgListener,
}

impl QueueListener {
    /// Open a listening connection subscribed to all four channels.
    pub async fn connect(pool: &PgPool) -> DbResult<Self> {
        let mut listener = PgListener::connect_with(pool).await?;
        let channels: Vec<&str> = QueueEvent::ALL.iter().map(|e| e.channel()).collect();
        listener.listen_all(channels).await?;
        Ok(Self { listener })
    }

    /// Block until at least one channel fires, then return the set of
    /// channels that have fired since the last call. Spurious wake-ups are
    /// allowed; the caller re-checks state either way.
    pub async fn wait_for_event(&mut self) -> DbResult<BTreeSet<QueueEvent>> {
        let mut fired = BTreeSet::new();

        let first = self.listener.recv().await?;
        fired.extend(QueueEvent::from_channel(first.channel()));

        while let Ok(next) = tokio::time::timeout(DRAIN_GRACE, self.listener.recv()).await {
            fired.extend(QueueEvent::from_channel(next?.channel()));
        }

        Ok(fired)
    }
}
