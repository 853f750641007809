use std::sync::Arc;

use marquee_core::{AppConfig, Enricher, MetadataProvider, Storage};

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub provider: Arc<dyn MetadataProvider>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(storage: Storage, provider: Arc<dyn MetadataProvider>, config: AppConfig) -> Self {
        Self {
            storage: Arc::new(storage),
            provider,
            config: Arc::new(config),
        }
    }

    pub fn enricher(&self) -> Enricher<'_> {
        Enricher::new(&self.storage, self.provider.as_ref())
    }
}
