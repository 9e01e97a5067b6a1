use std::sync::Arc;

use crate::backend::ClientFactory;
use crate::config::AppConfig;
use crate::gate::{AdminContext, AdminGate};
use crate::services::UserAdminService;

/// Shared router state; cheap to clone per request
#[derive(Clone)]
pub struct AppState {
    pub gate: AdminGate,
    pub compensate_failed_create: bool,
}

impl AppState {
    pub fn new(factory: Arc<dyn ClientFactory>, config: &AppConfig) -> Self {
        Self {
            gate: AdminGate::new(factory, &config.security),
            compensate_failed_create: config.security.compensate_failed_create,
        }
    }

    pub fn user_admin<'a>(&self, ctx: &'a AdminContext) -> UserAdminService<'a> {
        UserAdminService::new(ctx, self.compensate_failed_create)
    }
}
