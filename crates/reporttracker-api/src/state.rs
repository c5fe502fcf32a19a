use std::sync::Arc;

use reporttracker_core::workflow::FlagWorkflow;

use crate::auth::AuthConfig;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<FlagWorkflow>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(workflow: Arc<FlagWorkflow>, auth: AuthConfig) -> Self {
        Self { workflow, auth }
    }
}
