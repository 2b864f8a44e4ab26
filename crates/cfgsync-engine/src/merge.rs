//! Human-adjudicated merge of two replicas of an artifact

use std::sync::Arc;

use cfgsync_core::{Adjudicator, ArtifactBundle, ArtifactSummary, MergeSide, codec};
use tracing::{debug, info};

use crate::artifact_store::ArtifactStore;
use crate::context::{EngineContext, MERGE_SCOPE};
use crate::error::EngineResult;
use crate::indexer::ListIndexer;

/// The primary file of a bundle as one side of a merge
fn merge_side(bundle: &ArtifactBundle) -> EngineResult<Option<MergeSide>> {
    let Some(file) = bundle.primary_file() else {
        return Ok(None);
    };
    let bytes = codec::decode_chunks(file.chunks())?;
    Ok(Some(MergeSide {
        document_path: bundle.document_path.clone().unwrap_or_default(),
        filename: file.filename.clone(),
        content: String::from_utf8_lossy(&bytes).into_owned(),
        mtime: file.mtime,
    }))
}

/// Compares two replicas and applies the adjudicated result
pub struct MergeResolver {
    ctx: Arc<EngineContext>,
    artifacts: Arc<ArtifactStore>,
    indexer: Arc<ListIndexer>,
    adjudicator: Arc<dyn Adjudicator>,
}

impl MergeResolver {
    pub(crate) fn new(
        ctx: Arc<EngineContext>,
        artifacts: Arc<ArtifactStore>,
        indexer: Arc<ListIndexer>,
        adjudicator: Arc<dyn Adjudicator>,
    ) -> Self {
        Self {
            ctx,
            artifacts,
            indexer,
            adjudicator,
        }
    }

    /// Ask the adjudicator to merge `a` and `b`; the result lands on `a`.
    ///
    /// Returns `false` when either side is missing or no decision was made.
    pub async fn compare(&self, a: &ArtifactSummary, b: &ArtifactSummary) -> EngineResult<bool> {
        let Some(bundle_a) = self.artifacts.load_bundle(&a.document_path).await? else {
            debug!(key = %a.document_path, "Merge side missing");
            return Ok(false);
        };
        let Some(bundle_b) = self.artifacts.load_bundle(&b.document_path).await? else {
            debug!(key = %b.document_path, "Merge side missing");
            return Ok(false);
        };
        let (Some(left), Some(right)) = (merge_side(&bundle_a)?, merge_side(&bundle_b)?) else {
            return Ok(false);
        };

        let _scope = self.ctx.scopes.lock(MERGE_SCOPE).await;
        debug!("Opening data-merging dialog");
        let display_path = left
            .filename
            .rsplit('/')
            .next()
            .unwrap_or(&left.filename)
            .to_string();
        let Some(resolved) = self.adjudicator.resolve(&display_path, &left, &right).await else {
            info!(path = %display_path, "Merge cancelled");
            return Ok(false);
        };

        self.artifacts.apply_data(&bundle_a, Some(&resolved)).await?;
        self.indexer.request_refresh(&a.document_path);
        Ok(true)
    }
}
