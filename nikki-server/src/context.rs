use std::sync::Arc;

use nikki_core::config::{NikkiConfig, StoreBackend};
use nikki_core::media::{AvatarService, ImageUploader};
use nikki_core::store::{GitHubContentStore, MemoryStore};
use nikki_core::{create_annotator, Annotator, AuthGate, DocumentAdapter, DocumentStore, ReadModifyWrite};

/// Everything a request needs. Built once at startup; holds no document state.
#[derive(Clone)]
pub struct DiaryContext {
    pub auth: AuthGate,
    pub rmw: ReadModifyWrite,
    pub annotator: Arc<dyn Annotator>,
    pub avatar: AvatarService,
    pub uploader: ImageUploader,
    pub document_key: String,
    store: Arc<dyn DocumentStore>,
}

/// Create the document store selected by `[store] backend`.
pub fn create_store_from_config(config: &NikkiConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.store.backend {
        StoreBackend::Github => {
            let store = GitHubContentStore::new(config.store.github()?)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, nothing will survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

impl DiaryContext {
    pub fn from_config(config: &NikkiConfig) -> anyhow::Result<Self> {
        let store = create_store_from_config(config)?;
        let annotator: Arc<dyn Annotator> = Arc::from(create_annotator(&config.enrichment));
        Ok(Self::with_parts(config, store, annotator))
    }

    /// Assemble from an explicit store and annotator.
    pub fn with_parts(
        config: &NikkiConfig,
        store: Arc<dyn DocumentStore>,
        annotator: Arc<dyn Annotator>,
    ) -> Self {
        let auth = AuthGate::new(config.auth.resolved_secret());
        if !auth.is_configured() {
            tracing::warn!("No admin password configured, every mutation will be rejected");
        }

        Self {
            auth,
            rmw: ReadModifyWrite::new(DocumentAdapter::new(store.clone())),
            annotator,
            avatar: AvatarService::new(store.clone(), config.avatar.clone()),
            uploader: ImageUploader::new(store.clone(), config.uploads.clone()),
            document_key: config.store.document_path.clone(),
            store,
        }
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }
}
