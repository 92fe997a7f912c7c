//! Tenant-filtered access shared by every business collection.

use entity::TenantScoped;
use platform_api::{ApiError, ApiResult};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Select};
use uuid::Uuid;

use crate::db_err;

/// All rows of `E` owned by `business_id`.
pub fn list_query<E: TenantScoped>(business_id: Uuid) -> Select<E> {
    E::find().filter(E::tenant_column().eq(business_id))
}

pub async fn find<E, C>(conn: &C, business_id: Uuid, id: Uuid) -> ApiResult<Option<E::Model>>
where
    E: TenantScoped,
    C: ConnectionTrait,
{
    list_query::<E>(business_id)
        .filter(E::id_column().eq(id))
        .one(conn)
        .await
        .map_err(db_err)
}

/// Like [`find`] but a missing row, or one owned by another tenant, is `NOT_FOUND`.
pub async fn get<E, C>(
    conn: &C,
    business_id: Uuid,
    id: Uuid,
    entity_name: &'static str,
) -> ApiResult<E::Model>
where
    E: TenantScoped,
    C: ConnectionTrait,
{
    find::<E, C>(conn, business_id, id)
        .await?
        .ok_or(ApiError::NotFound(entity_name))
}

pub async fn delete<E, C>(
    conn: &C,
    business_id: Uuid,
    id: Uuid,
    entity_name: &'static str,
) -> ApiResult<()>
where
    E: TenantScoped,
    C: ConnectionTrait,
{
    let result = E::delete_many()
        .filter(E::tenant_column().eq(business_id))
        .filter(E::id_column().eq(id))
        .exec(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound(entity_name));
    }
    tracing::info!(entity = entity_name, %id, %business_id, "record deleted");
    Ok(())
}
