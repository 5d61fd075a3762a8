//! Built-in event listeners.
//!
//! Register them with [`EventDispatcher::with_listeners`](crate::EventDispatcher::with_listeners).

mod logging;
#[cfg(feature = "tracing")]
mod tracing;

pub use logging::LoggingListener;
#[cfg(feature = "tracing")]
pub use self::tracing::TracingListener;
