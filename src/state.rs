use crate::{config::Config, placement::service::PlacementService};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub service: PlacementService,
    pub config: Config,
}

impl FromRef<AppState> for PlacementService {
    fn from_ref(state: &AppState) -> Self {
        state.service.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
