//! Event system for governance actions.
//!
//! Every committed state change (admission, removal, role change, link
//! issue or revocation, join request transitions) produces a [`GroupEvent`].
//! Events go to the [`EventDispatcher`] carried by the
//! [`GovernanceContext`](crate::GovernanceContext); with no listeners they
//! are dropped.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use groupgate::events::EventDispatcher;
//! use groupgate::events::listeners::LoggingListener;
//! use groupgate::GovernanceContext;
//!
//! let events = EventDispatcher::with_listeners(|registry| {
//!     registry.listen(LoggingListener::new());
//! });
//! let context = GovernanceContext::new().with_events(events);
//! ```

mod dispatcher;
mod event;
mod listener;

pub mod listeners;

pub use dispatcher::{EventDispatcher, EventRegistry};
pub use event::GroupEvent;
pub use listener::Listener;
