use async_trait::async_trait;

use crate::events::{GroupEvent, Listener};

/// Records governance events on the current tracing span.
pub struct TracingListener;

#[async_trait]
impl Listener for TracingListener {
    async fn handle(&self, event: &GroupEvent) {
        tracing::info!(
            target: "groupgate::events",
            event_name = event.name(),
            group_id = event.group_id(),
            at = %event.timestamp(),
            detail = ?event,
            "governance event"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn test_records_without_subscriber() {
        TracingListener
            .handle(&GroupEvent::JoinRequestSubmitted {
                group_id: 3,
                request_id: 9,
                user_id: 12,
                at: Utc::now(),
            })
            .await;
    }
}
