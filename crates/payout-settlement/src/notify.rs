//! Notification sinks.

use async_trait::async_trait;
use tracing::info;

use crate::ports::{NotificationError, NotificationSink, PayoutEvent};

/// Sink that writes each notice to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(
        &self,
        partner_id: &str,
        event: PayoutEvent,
        payload: serde_json::Value,
    ) -> Result<(), NotificationError> {
        info!(partner_id, event = %event, %payload, "Partner notification");
        Ok(())
    }
}
