// Holder for the active FlightService implementation.
// Built explicitly and passed around; `global()` exists for callers that
// cannot have it injected.

use std::sync::{Arc, OnceLock};

use crate::{error::ConfigurationError, model::FlightService};

#[derive(Default)]
pub struct ServiceRegistry {
    service: OnceLock<Arc<dyn FlightService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `service` if nothing is registered yet. Returns `false` and keeps
    /// the first registration otherwise.
    pub fn register(&self, service: Arc<dyn FlightService>) -> bool {
        let stored = self.service.set(service).is_ok();
        if !stored {
            tracing::warn!("flight service already registered, ignoring new registration");
        }
        stored
    }

    pub fn current(&self) -> Result<Arc<dyn FlightService>, ConfigurationError> {
        self.service
            .get()
            .cloned()
            .ok_or(ConfigurationError::ServiceNotRegistered)
    }

    pub fn is_configured(&self) -> bool {
        self.service.get().is_some()
    }
}

static GLOBAL: OnceLock<ServiceRegistry> = OnceLock::new();

/// Process-wide registry. Register once during startup, before concurrent reads begin.
pub fn global() -> &'static ServiceRegistry {
    GLOBAL.get_or_init(ServiceRegistry::new)
}
