//! Notification sources feeding the listener loop

use std::convert::Infallible;

use async_trait::async_trait;
use ha_core::Notification;
use tokio::sync::mpsc;

/// A long-lived producer of notifications, typically the hub event feed
///
/// `Ok(None)` means the source ended cleanly; `Err` means it failed. Either
/// way the listener loop stops, and reconnecting is up to the caller.
#[async_trait]
pub trait NotificationSource: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Wait for the next notification
    async fn next_notification(&mut self) -> Result<Option<Notification>, Self::Error>;
}

#[async_trait]
impl NotificationSource for mpsc::Receiver<Notification> {
    type Error = Infallible;

    async fn next_notification(&mut self) -> Result<Option<Notification>, Self::Error> {
        Ok(self.recv().await)
    }
}

#[async_trait]
impl NotificationSource for mpsc::UnboundedReceiver<Notification> {
    type Error = Infallible;

    async fn next_notification(&mut self) -> Result<Option<Notification>, Self::Error> {
        Ok(self.recv().await)
    }
}
