//! Persistence for the patch log (`patch-broadcast` / `fetch-patch-*`).

use convergent_store::Patch;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// A patch row as stored on disk, keyed by the adapter-assigned id.
#[derive(Debug)]
pub struct StoredPatch {
    pub adapter_patch_id: Uuid,
    pub content: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredPatch {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredPatch {
            adapter_patch_id: row.try_get("adapter_patch_id")?,
            content: row.try_get("content")?,
        })
    }
}

impl StoredPatch {
    pub fn to_patch(&self) -> Result<Patch, serde_json::Error> {
        serde_json::from_value(self.content.clone())
    }
}

/// Persist a patch broadcast by `origin_store_id`, returning the id the
/// caller should treat as authoritative on the wire.
pub async fn insert_patch(
    pool: &PgPool,
    origin_store_id: u32,
    patch: &Patch,
) -> Result<Uuid, sqlx::Error> {
    let adapter_patch_id = Uuid::new_v4();
    let content = serde_json::to_value(patch).expect("Patch always serializes");

    sqlx::query(
        r#"
        INSERT INTO patches (adapter_patch_id, origin_store_id, op_clock, content)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(adapter_patch_id)
    .bind(origin_store_id as i32)
    .bind(patch.patch_id.clock() as i64)
    .bind(&content)
    .execute(pool)
    .await?;

    Ok(adapter_patch_id)
}

/// Fetch exactly the requested patches, in the order they were found.
pub async fn get_patches_by_id(
    pool: &PgPool,
    patch_ids: &[Uuid],
) -> Result<Vec<StoredPatch>, sqlx::Error> {
    sqlx::query_as::<_, StoredPatch>(
        r#"
        SELECT adapter_patch_id, content
        FROM patches
        WHERE adapter_patch_id = ANY($1)
        "#,
    )
    .bind(patch_ids)
    .fetch_all(pool)
    .await
}

/// Fetch every patch recorded after a given clock value, ordered for replay.
///
/// Used to bootstrap a reconnecting store alongside the latest checkpoint.
pub async fn get_patches_since(
    pool: &PgPool,
    since_clock: i64,
) -> Result<Vec<StoredPatch>, sqlx::Error> {
    sqlx::query_as::<_, StoredPatch>(
        r#"
        SELECT adapter_patch_id, content
        FROM patches
        WHERE op_clock > $1
        ORDER BY op_clock ASC, origin_store_id ASC
        "#,
    )
    .bind(since_clock)
    .fetch_all(pool)
    .await
}
