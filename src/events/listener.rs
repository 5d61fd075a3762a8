use async_trait::async_trait;

use super::GroupEvent;

/// Trait for handling governance events asynchronously.
///
/// Implement this to forward events to a notification service, an audit
/// trail or metrics.
///
/// # Example
///
/// ```rust,ignore
/// use groupgate::events::{GroupEvent, Listener};
/// use async_trait::async_trait;
///
/// struct NotifyAdmins {
///     notifier: NotificationClient,
/// }
///
/// #[async_trait]
/// impl Listener for NotifyAdmins {
///     async fn handle(&self, event: &GroupEvent) {
///         if let GroupEvent::JoinRequestSubmitted { group_id, user_id, .. } = event {
///             self.notifier.new_request(*group_id, *user_id).await;
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Handle a governance event.
    ///
    /// Called for every dispatched event. Filter by matching on the variant.
    async fn handle(&self, event: &GroupEvent);
}
