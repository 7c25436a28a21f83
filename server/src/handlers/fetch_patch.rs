//! `fetch-patch-request` / `fetch-patch-reply` — fetches exactly the
//! requested patches; a missing id is an error for the whole request, per
//! `ServerAdapter::fetch_patches`'s contract.

use crate::db;
use crate::error::{AppError, Result};
use convergent_store::RemotePatch;
use sqlx::PgPool;
use uuid::Uuid;

/// `patch_ids` are the opaque, adapter-assigned strings `RemotePatch` hands
/// out — this server happens to mint them as UUIDs, so parsing failure here
/// means the caller sent back an id we never issued.
pub async fn handle_fetch_patches(pool: &PgPool, patch_ids: Vec<String>) -> Result<Vec<RemotePatch>> {
    let parsed_ids: Vec<Uuid> = patch_ids
        .iter()
        .map(|id| Uuid::parse_str(id).map_err(|_| AppError::BadRequest(format!("not a patch id: {id}"))))
        .collect::<Result<_>>()?;

    let stored = db::get_patches_by_id(pool, &parsed_ids).await?;

    let mut by_id = std::collections::HashMap::with_capacity(stored.len());
    for row in &stored {
        by_id.insert(row.adapter_patch_id, row);
    }

    let mut patches = Vec::with_capacity(parsed_ids.len());
    for id in &parsed_ids {
        let row = by_id
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("patch {id} not found")))?;
        let patch = row
            .to_patch()
            .map_err(|e| AppError::Internal(format!("corrupt stored patch {id}: {e}")))?;
        patches.push(RemotePatch { adapter_patch_id: id.to_string(), patch });
    }

    Ok(patches)
}
