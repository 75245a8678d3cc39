pub mod common;
pub mod requirements;

use std::sync::Arc;

use crate::events::EventSender;
use crate::repositories::RequirementRepository;
use crate::services::requirements::{RequirementService, ServiceSettings};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub requirements: Arc<RequirementService>,
}

impl AppServices {
    pub fn new(
        repository: Arc<dyn RequirementRepository>,
        event_sender: Arc<EventSender>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            requirements: Arc::new(RequirementService::new(repository, event_sender, settings)),
        }
    }
}
