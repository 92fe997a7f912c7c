use async_graphql::{Context, InputObject, Object, ID};
use chrono::Utc;
use entity::{product, service};
use platform_api::ApiError;
use sea_orm::{
    prelude::DateTimeWithTimeZone, ActiveModelTrait, ActiveValue::Set, ColumnTrait,
    QueryFilter, QueryOrder,
};
use uuid::Uuid;

use super::{
    current_principal, database, gql, non_negative,
    nodes::{ProductNode, ServiceNode},
    object_storage, optional_text, parse_uuid, require, required_text,
};
use crate::{
    db_err,
    identity::Permission,
    repo,
    storage::{decode_data_url, extension_for, ObjectPath},
};

#[derive(Clone, Debug, InputObject)]
pub struct ServiceInput {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub duration_minutes: i32,
    #[graphql(default = true)]
    pub active: bool,
}

#[derive(Clone, Debug, InputObject)]
pub struct ProductInput {
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: i64,
    pub cost_cents: i64,
    #[graphql(default)]
    pub min_stock: i32,
    #[graphql(default = true)]
    pub active: bool,
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn positive_minutes(value: i32) -> async_graphql::Result<i32> {
    if value <= 0 {
        return Err(gql(ApiError::validation("duration must be positive")));
    }
    Ok(value)
}

/// Decode an uploaded image and store it as `<feature>/<id>/image.<ext>`.
async fn store_image(
    ctx: &Context<'_>,
    feature: &str,
    id: Uuid,
    data_url: &str,
) -> async_graphql::Result<String> {
    let storage = object_storage(ctx)?;
    let image = decode_data_url(data_url).map_err(|err| gql(ApiError::validation(err.to_string())))?;
    if !image.content_type.starts_with("image/") {
        return Err(gql(ApiError::validation("only images can be uploaded")));
    }
    let filename = format!("image.{}", extension_for(&image.content_type));
    let path = ObjectPath::new(feature, id, filename)
        .map_err(|err| gql(ApiError::validation(err.to_string())))?;
    storage
        .upload(&path, image.bytes, &image.content_type)
        .await
        .map_err(|err| gql(ApiError::Upstream(err.to_string())))
}

#[derive(Default)]
pub struct CatalogQuery;

#[Object]
impl CatalogQuery {
    async fn services(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] active_only: bool,
    ) -> async_graphql::Result<Vec<ServiceNode>> {
        let principal = current_principal(ctx)?;
        let db = database(ctx)?;
        let mut query = repo::list_query::<service::Entity>(principal.business_id);
        if active_only {
            query = query.filter(service::Column::Active.eq(true));
        }
        let records = query
            .order_by_asc(service::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(ServiceNode::from).collect())
    }

    async fn products(
        &self,
        ctx: &Context<'_>,
        #[graphql(default)] low_stock_only: bool,
    ) -> async_graphql::Result<Vec<ProductNode>> {
        let principal = require(ctx, Permission::Catalog)
            .or_else(|_| require(ctx, Permission::Stock))?;
        let db = database(ctx)?;
        let records = repo::list_query::<product::Entity>(principal.business_id)
            .order_by_asc(product::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records
            .into_iter()
            .filter(|p| !low_stock_only || p.stock_quantity <= p.min_stock)
            .map(ProductNode::from)
            .collect())
    }

    /// Active services of a shop, readable without a session.
    async fn storefront_services(
        &self,
        ctx: &Context<'_>,
        business_id: ID,
    ) -> async_graphql::Result<Vec<ServiceNode>> {
        let db = database(ctx)?;
        let records = repo::list_query::<service::Entity>(parse_uuid(&business_id)?)
            .filter(service::Column::Active.eq(true))
            .order_by_asc(service::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(ServiceNode::from).collect())
    }
}

#[derive(Default)]
pub struct CatalogMutation;

#[Object]
impl CatalogMutation {
    async fn create_service(
        &self,
        ctx: &Context<'_>,
        input: ServiceInput,
    ) -> async_graphql::Result<ServiceNode> {
        let principal = require(ctx, Permission::Catalog)?;
        let db = database(ctx)?;
        let now = now();
        let record = service::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(principal.business_id),
            name: Set(required_text("name", &input.name)?),
            description: Set(optional_text(input.description)),
            price_cents: Set(non_negative("priceCents", input.price_cents)?),
            duration_minutes: Set(positive_minutes(input.duration_minutes)?),
            image_url: Set(None),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db.as_ref())
        .await
        .map_err(|err| gql(db_err(err)))?;
        Ok(record.into())
    }

    async fn update_service(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: ServiceInput,
    ) -> async_graphql::Result<ServiceNode> {
        let principal = require(ctx, Permission::Catalog)?;
        let db = database(ctx)?;
        let existing =
            repo::get::<service::Entity, _>(db.as_ref(), principal.business_id, parse_uuid(&id)?, "service")
                .await
                .map_err(gql)?;
        let mut active: service::ActiveModel = existing.into();
        active.name = Set(required_text("name", &input.name)?);
        active.description = Set(optional_text(input.description));
        active.price_cents = Set(non_negative("priceCents", input.price_cents)?);
        active.duration_minutes = Set(positive_minutes(input.duration_minutes)?);
        active.active = Set(input.active);
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn delete_service(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let principal = require(ctx, Permission::Catalog)?;
        let db = database(ctx)?;
        repo::delete::<service::Entity, _>(db.as_ref(), principal.business_id, parse_uuid(&id)?, "service")
            .await
            .map_err(gql)?;
        Ok(true)
    }

    /// `dataUrl` is a base64 image data URL.
    async fn upload_service_image(
        &self,
        ctx: &Context<'_>,
        id: ID,
        data_url: String,
    ) -> async_graphql::Result<ServiceNode> {
        let principal = require(ctx, Permission::Catalog)?;
        let db = database(ctx)?;
        let existing =
            repo::get::<service::Entity, _>(db.as_ref(), principal.business_id, parse_uuid(&id)?, "service")
                .await
                .map_err(gql)?;
        let url = store_image(ctx, "services", existing.id, &data_url).await?;
        let mut active: service::ActiveModel = existing.into();
        active.image_url = Set(Some(url));
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn create_product(
        &self,
        ctx: &Context<'_>,
        input: ProductInput,
    ) -> async_graphql::Result<ProductNode> {
        let principal = require(ctx, Permission::Catalog)?;
        let db = database(ctx)?;
        let now = now();
        let record = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(principal.business_id),
            name: Set(required_text("name", &input.name)?),
            sku: Set(optional_text(input.sku).map(|s| s.to_uppercase())),
            price_cents: Set(non_negative("priceCents", input.price_cents)?),
            cost_cents: Set(non_negative("costCents", input.cost_cents)?),
            stock_quantity: Set(0),
            min_stock: Set(input.min_stock.max(0)),
            image_url: Set(None),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db.as_ref())
        .await
        .map_err(|err| gql(db_err(err)))?;
        Ok(record.into())
    }

    /// Stock is only changed through stock movements.
    async fn update_product(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: ProductInput,
    ) -> async_graphql::Result<ProductNode> {
        let principal = require(ctx, Permission::Catalog)?;
        let db = database(ctx)?;
        let existing =
            repo::get::<product::Entity, _>(db.as_ref(), principal.business_id, parse_uuid(&id)?, "product")
                .await
                .map_err(gql)?;
        let mut active: product::ActiveModel = existing.into();
        active.name = Set(required_text("name", &input.name)?);
        active.sku = Set(optional_text(input.sku).map(|s| s.to_uppercase()));
        active.price_cents = Set(non_negative("priceCents", input.price_cents)?);
        active.cost_cents = Set(non_negative("costCents", input.cost_cents)?);
        active.min_stock = Set(input.min_stock.max(0));
        active.active = Set(input.active);
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn delete_product(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let principal = require(ctx, Permission::Catalog)?;
        let db = database(ctx)?;
        repo::delete::<product::Entity, _>(db.as_ref(), principal.business_id, parse_uuid(&id)?, "product")
            .await
            .map_err(gql)?;
        Ok(true)
    }

    async fn upload_product_image(
        &self,
        ctx: &Context<'_>,
        id: ID,
        data_url: String,
    ) -> async_graphql::Result<ProductNode> {
        let principal = require(ctx, Permission::Catalog)?;
        let db = database(ctx)?;
        let existing =
            repo::get::<product::Entity, _>(db.as_ref(), principal.business_id, parse_uuid(&id)?, "product")
                .await
                .map_err(gql)?;
        let url = store_image(ctx, "products", existing.id, &data_url).await?;
        let mut active: product::ActiveModel = existing.into();
        active.image_url = Set(Some(url));
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }
}
