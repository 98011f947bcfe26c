use std::sync::Arc;

use crate::archive::ImageArchiver;
use crate::artifacts::ArtifactService;
use crate::identity::IdentityResolver;
use crate::storage::StorageBackend;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub artifacts: Arc<ArtifactService>,
    pub identity: Arc<dyn IdentityResolver>,
    /// `None` when no archive directory is configured; scan uploads then fail.
    pub archiver: Option<Arc<dyn ImageArchiver>>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        artifacts: Arc<ArtifactService>,
        identity: Arc<dyn IdentityResolver>,
        archiver: Option<Arc<dyn ImageArchiver>>,
    ) -> Self {
        Self {
            storage,
            artifacts,
            identity,
            archiver,
        }
    }
}
