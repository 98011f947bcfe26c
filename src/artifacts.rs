use std::sync::Arc;

use axum::body::Bytes;
use tracing::{debug, info};

use crate::cache::{Artifact, ArtifactCache, ballot_key, png_key};
use crate::error::{AppError, AppResult};
use crate::render::{Ballot, DrawBackend, PdfRasterizer};
use crate::storage::StorageBackend;

/// Cached-or-rendered access to an election's artifacts.
///
/// A cache hit never touches storage, the draw backend or the rasterizer. On
/// a miss a storage connection is held only while the record is read, never
/// across a render. Concurrent misses on the same key each render; a result
/// whose key was invalidated meanwhile is returned but not cached.
pub struct ArtifactService {
    cache: Arc<ArtifactCache>,
    draw: Arc<dyn DrawBackend>,
    rasterizer: Arc<dyn PdfRasterizer>,
}

impl ArtifactService {
    pub fn new(
        cache: Arc<ArtifactCache>,
        draw: Arc<dyn DrawBackend>,
        rasterizer: Arc<dyn PdfRasterizer>,
    ) -> Self {
        Self {
            cache,
            draw,
            rasterizer,
        }
    }

    /// PDF and bubbles for `election_id`, rendered once per stored version.
    pub async fn ballot(&self, storage: &dyn StorageBackend, election_id: i64) -> AppResult<Ballot> {
        let key = ballot_key(election_id);
        if let Some(Artifact::Ballot(ballot)) = self.cache.get(&key) {
            debug!(election_id, "ballot cache hit");
            return Ok(ballot);
        }
        debug!(election_id, "ballot cache miss");

        // Read before the record so a write landing after it is detected.
        let generation = self.cache.generation(&key);
        let data = {
            let mut db = storage
                .connect()
                .await
                .map_err(|err| AppError::backend("could not open db", err))?;
            db.get_election(election_id)
                .await
                .map_err(|err| AppError::storage("db get fail", err))?
                .data
        };

        let ballot = self
            .draw
            .render(&data)
            .await
            .map_err(|err| AppError::backend("draw fail", err))?;

        info!(election_id, size_bytes = ballot.size_bytes(), "rendered ballot");
        if self.cache.put_if_current(
            key,
            Artifact::Ballot(ballot.clone()),
            ballot.size_bytes(),
            generation,
        ) {
            self.log_usage();
        }
        Ok(ballot)
    }

    /// PNG preview derived from the cached (or freshly rendered) PDF.
    pub async fn png(&self, storage: &dyn StorageBackend, election_id: i64) -> AppResult<Bytes> {
        let key = png_key(election_id);
        if let Some(Artifact::Png(png)) = self.cache.get(&key) {
            debug!(election_id, "png cache hit");
            return Ok(png);
        }
        debug!(election_id, "png cache miss");

        let generation = self.cache.generation(&key);
        let ballot = self.ballot(storage, election_id).await?;
        let png = self
            .rasterizer
            .to_png(&ballot.pdf)
            .await
            .map_err(|err| AppError::backend("png fail", err))?;

        if self
            .cache
            .put_if_current(key, Artifact::Png(png.clone()), png.len(), generation)
        {
            self.log_usage();
        }
        Ok(png)
    }

    fn log_usage(&self) {
        let stats = self.cache.stats();
        debug!(
            entries = stats.entries,
            used_bytes = stats.used_bytes,
            capacity_bytes = stats.capacity_bytes,
            "artifact cache usage"
        );
    }

    /// Drops every cached artifact of `election_id`. Renders already in
    /// flight for it will not be cached.
    pub fn invalidate(&self, election_id: i64) {
        self.cache.invalidate(&ballot_key(election_id));
        self.cache.invalidate(&png_key(election_id));
    }
}
