use std::sync::Arc;

use crate::{Clock, EventDispatcher, GovernanceConfig, GroupError, SystemClock};

/// Everything a governance service needs besides its repositories.
///
/// Passed explicitly to each service; nothing reads ambient global state.
#[derive(Clone)]
pub struct GovernanceContext {
    config: GovernanceConfig,
    pub clock: Arc<dyn Clock>,
    pub events: EventDispatcher,
}

impl Default for GovernanceContext {
    fn default() -> Self {
        Self {
            config: GovernanceConfig::default(),
            clock: Arc::new(SystemClock),
            events: EventDispatcher::new(),
        }
    }
}

impl GovernanceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `config` after checking it with [`GovernanceConfig::validate`].
    pub fn with_config(mut self, config: GovernanceConfig) -> Result<Self, GroupError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }
}

impl std::fmt::Debug for GovernanceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernanceContext")
            .field("config", &self.config)
            .field("listeners", &self.events.len())
            .finish_non_exhaustive()
    }
}
