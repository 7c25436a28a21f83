//! Allocation of fresh, non-zero store ids (`createStoreId`).

use sqlx::PgPool;

/// Allocate the next store id from the shared sequence.
pub async fn allocate_store_id(pool: &PgPool) -> Result<u32, sqlx::Error> {
    let (id,): (i64,) = sqlx::query_as("SELECT nextval('store_id_seq')")
        .fetch_one(pool)
        .await?;

    Ok(id as u32)
}
