//! `createStoreId` — hands out a fresh, non-zero store id.

use crate::db;
use crate::error::Result;
use sqlx::PgPool;

pub async fn handle_create_store_id(pool: &PgPool) -> Result<u32> {
    let store_id = db::allocate_store_id(pool).await?;
    Ok(store_id)
}
