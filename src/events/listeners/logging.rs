use async_trait::async_trait;

use crate::events::{GroupEvent, Listener};

/// Writes each governance event to the `log` facade under the
/// `groupgate::events` target.
///
/// # Example
///
/// ```rust
/// use groupgate::events::EventDispatcher;
/// use groupgate::events::listeners::LoggingListener;
///
/// let events = EventDispatcher::with_listeners(|registry| {
///     registry.listen(LoggingListener::with_level(log::Level::Debug));
/// });
/// assert_eq!(events.len(), 1);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LoggingListener {
    level: log::Level,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self::with_level(log::Level::Info)
    }

    pub fn with_level(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Listener for LoggingListener {
    async fn handle(&self, event: &GroupEvent) {
        log::log!(
            target: "groupgate::events",
            self.level,
            "msg=\"governance event\", event={}, group_id={}, at={}, detail={event:?}",
            event.name(),
            event.group_id(),
            event.timestamp()
        );
    }
}
