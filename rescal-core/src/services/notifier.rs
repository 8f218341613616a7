//! Notifier that records event changes in the application log.

use async_trait::async_trait;

use super::{NotificationAction, Notifier};
use crate::error::RescalResult;
use crate::event::Event;

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &Event, action: NotificationAction) -> RescalResult<()> {
        tracing::info!(
            calendar = %event.calendar,
            uid = event.uid.as_deref().unwrap_or_default(),
            title = %event.title,
            %action,
            "event changed"
        );
        Ok(())
    }
}
