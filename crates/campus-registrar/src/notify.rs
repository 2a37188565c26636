//! Post-Commit Notifications
//!
//! Dispatch is fire-and-forget: delivery runs on a spawned task, failures
//! are logged and never block or roll back the operation that triggered
//! them. Outbound transport lives behind the `NotificationSink` seam.

use async_trait::async_trait;
use campus_common::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Notifications emitted after successful commits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A student record was created
    Welcome {
        /// Owning tenant
        tenant: TenantId,
        /// The new student's PIN
        pin: String,
        /// Display name
        name: String,
    },
    /// A period rollover completed
    RolloverCompleted {
        /// Owning tenant
        tenant: TenantId,
        /// Rolled period's name
        period: String,
        /// Enrollments moved
        moved_count: u32,
        /// Execution timestamp
        executed_at: DateTime<Utc>,
    },
    /// The tenant is running out of configured future periods
    LowPeriodCount {
        /// Owning tenant
        tenant: TenantId,
        /// Future periods remaining
        remaining: usize,
    },
}

/// Delivery failure
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct SinkError(pub String);

/// Outbound delivery seam
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification
    async fn deliver(&self, notification: Notification) -> Result<(), SinkError>;
}

/// Default sink: logs the JSON payload
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, notification: Notification) -> Result<(), SinkError> {
        let payload = serde_json::to_string(&notification)
            .map_err(|e| SinkError(e.to_string()))?;
        tracing::info!(payload = %payload, "notification");
        Ok(())
    }
}

/// Fire-and-forget dispatcher over a sink
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn NotificationSink>,
}

impl Dispatcher {
    /// Dispatcher over the given sink
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Dispatcher over the tracing sink
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingSink))
    }

    /// Fire a notification without waiting for delivery. Failures are
    /// logged; outside an async runtime the notification is logged and
    /// dropped rather than delivered.
    pub fn fire(&self, notification: Notification) {
        let sink = self.sink.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.deliver(notification).await {
                        tracing::warn!(error = %e, "notification delivery failed");
                    }
                });
            }
            Err(_) => {
                tracing::debug!(notification = ?notification, "no runtime; notification dropped");
            }
        }
    }
}
