//! `patch-broadcast` — persists a patch from its origin store and hands back
//! the adapter-assigned id that other stores will use to address it.

use crate::db;
use crate::error::Result;
use convergent_store::{Patch, RemotePatch};
use sqlx::PgPool;

pub async fn handle_patch_broadcast(
    pool: &PgPool,
    origin_store_id: u32,
    patch: Patch,
) -> Result<RemotePatch> {
    let adapter_patch_id = db::insert_patch(pool, origin_store_id, &patch).await?;
    Ok(RemotePatch { adapter_patch_id: adapter_patch_id.to_string(), patch })
}
