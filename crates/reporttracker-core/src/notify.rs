//! Notification seam. Every successful transition produces exactly one
//! event; delivery is fire-and-forget and never affects the transition
//! outcome.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    AllAdmins,
    User(Uuid),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FlagRaised,
    FlagAccepted,
    FlagDiscarded,
    FlagRevived,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::FlagRaised => "flagged_daily",
            NotificationKind::FlagAccepted => "flag_accepted",
            NotificationKind::FlagDiscarded => "flag_discarded",
            NotificationKind::FlagRevived => "flag_revived",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub recipient: Recipient,
    pub kind: NotificationKind,
    pub message: String,
    pub flag_id: Uuid,
    pub daily_data_id: Uuid,
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

/// Schedules delivery off the request path. A failed delivery is logged and
/// dropped.
pub fn dispatch(sink: Arc<dyn NotificationSink>, event: NotificationEvent) {
    tokio::spawn(async move {
        let kind = event.kind.as_str();
        let flag_id = event.flag_id;
        if let Err(err) = sink.deliver(event).await {
            tracing::warn!(kind, %flag_id, "dropping notification: {err}");
        }
    });
}

/// Sink that only logs. Stands in where no delivery transport is wired up.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        tracing::info!(
            kind = event.kind.as_str(),
            flag_id = %event.flag_id,
            daily_data_id = %event.daily_data_id,
            "{}",
            event.message
        );
        Ok(())
    }
}
