//! Initial `PatchHistory` delivery for `registerPatchHandler`.
//!
//! Served over plain HTTP rather than the WebSocket wire vocabulary: it's a
//! one-shot bulk fetch, not a request/reply pair in an ongoing connection.

use crate::db;
use crate::error::Result;
use convergent_store::adapter::PatchHistory;
use convergent_store::Checkpoint;
use sqlx::PgPool;

pub async fn handle_bootstrap(pool: &PgPool) -> Result<PatchHistory> {
    let stored = db::get_patches_since(pool, 0).await?;
    let mut patches = Vec::with_capacity(stored.len());
    for row in &stored {
        match row.to_patch() {
            Ok(patch) => patches.push(patch),
            Err(e) => tracing::warn!(
                adapter_patch_id = %row.adapter_patch_id,
                "Failed to decode stored patch: {}",
                e
            ),
        }
    }

    Ok(PatchHistory { checkpoint: Checkpoint::new(), patches })
}
