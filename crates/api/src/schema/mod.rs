use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, Error, MergedObject, Object, Schema, ID,
};
use platform_api::ApiError;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::{
    auth::{AuthConfig, SESSION_COOKIE},
    functions::FunctionInvoker,
    identity::{Permission, Principal, Role},
    reference::ReferenceDataClient,
    storage::ObjectStorage,
};

mod account;
mod board;
mod catalog;
mod finance;
mod inspection;
mod integrations;
pub mod nodes;
mod operations;

pub type ShopSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub struct AppSchema(pub ShopSchema);

/// Collaborators every resolver can reach through the context.
#[derive(Clone)]
pub struct ShopServices {
    pub db: Arc<DatabaseConnection>,
    pub auth: Arc<AuthConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub functions: Arc<dyn FunctionInvoker>,
    pub reference: Arc<ReferenceDataClient>,
}

pub fn build_schema(services: ShopServices) -> AppSchema {
    let schema = Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(services.db)
        .data(services.auth)
        .data(services.storage)
        .data(services.functions)
        .data(services.reference)
        .finish();
    AppSchema(schema)
}

pub struct QueryRoot;
pub struct MutationRoot;

#[Object]
impl QueryRoot {
    async fn shop(&self) -> ShopQuery {
        ShopQuery::default()
    }
}

#[Object]
impl MutationRoot {
    async fn shop(&self) -> ShopMutation {
        ShopMutation::default()
    }
}

#[derive(MergedObject, Default)]
pub struct ShopQuery(
    account::AccountQuery,
    catalog::CatalogQuery,
    operations::OperationsQuery,
    board::BoardQuery,
    inspection::InspectionQuery,
    finance::FinanceQuery,
    integrations::IntegrationsQuery,
);

#[derive(MergedObject, Default)]
pub struct ShopMutation(
    account::AccountMutation,
    catalog::CatalogMutation,
    operations::OperationsMutation,
    board::BoardMutation,
    inspection::InspectionMutation,
    finance::FinanceMutation,
);

pub(crate) fn gql(err: ApiError) -> Error {
    err.into_graphql()
}

pub(crate) fn database(ctx: &Context<'_>) -> async_graphql::Result<Arc<DatabaseConnection>> {
    ctx.data::<Arc<DatabaseConnection>>()
        .cloned()
        .map_err(|_| gql(ApiError::internal(anyhow::anyhow!("missing database connection"))))
}

pub(crate) fn auth_config(ctx: &Context<'_>) -> async_graphql::Result<Arc<AuthConfig>> {
    ctx.data::<Arc<AuthConfig>>()
        .cloned()
        .map_err(|_| gql(ApiError::internal(anyhow::anyhow!("missing auth configuration"))))
}

pub(crate) fn object_storage(ctx: &Context<'_>) -> async_graphql::Result<Arc<dyn ObjectStorage>> {
    ctx.data::<Arc<dyn ObjectStorage>>()
        .cloned()
        .map_err(|_| gql(ApiError::internal(anyhow::anyhow!("missing object storage"))))
}

pub(crate) fn function_invoker(
    ctx: &Context<'_>,
) -> async_graphql::Result<Arc<dyn FunctionInvoker>> {
    ctx.data::<Arc<dyn FunctionInvoker>>()
        .cloned()
        .map_err(|_| gql(ApiError::internal(anyhow::anyhow!("missing function client"))))
}

pub(crate) fn reference_client(
    ctx: &Context<'_>,
) -> async_graphql::Result<Arc<ReferenceDataClient>> {
    ctx.data::<Arc<ReferenceDataClient>>()
        .cloned()
        .map_err(|_| gql(ApiError::internal(anyhow::anyhow!("missing reference client"))))
}

pub(crate) fn current_principal(ctx: &Context<'_>) -> async_graphql::Result<Principal> {
    ctx.data::<Principal>()
        .cloned()
        .map_err(|_| gql(ApiError::Unauthenticated))
}

/// Business owner or an employee holding `permission`.
pub(crate) fn require(ctx: &Context<'_>, permission: Permission) -> async_graphql::Result<Principal> {
    let principal = current_principal(ctx)?;
    if principal.can(permission) {
        Ok(principal)
    } else {
        Err(gql(ApiError::Forbidden))
    }
}

pub(crate) fn require_owner(ctx: &Context<'_>) -> async_graphql::Result<Principal> {
    let principal = current_principal(ctx)?;
    if principal.role == Role::Business {
        Ok(principal)
    } else {
        Err(gql(ApiError::Forbidden))
    }
}

/// Returns the principal together with its customer record id.
pub(crate) fn require_customer(ctx: &Context<'_>) -> async_graphql::Result<(Principal, Uuid)> {
    let principal = current_principal(ctx)?;
    match (principal.role, principal.customer_id) {
        (Role::Customer, Some(customer_id)) => Ok((principal, customer_id)),
        _ => Err(gql(ApiError::Forbidden)),
    }
}

pub(crate) fn parse_uuid(id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| gql(ApiError::validation("invalid id")))
}

pub(crate) fn parse_optional_uuid(id: Option<&ID>) -> async_graphql::Result<Option<Uuid>> {
    id.map(parse_uuid).transpose()
}

pub(crate) fn append_session_cookie(ctx: &Context<'_>, token: &str, ttl_minutes: i64) {
    let max_age = (ttl_minutes.max(0) * 60).to_string();
    let cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, token, max_age
    );
    ctx.append_http_header("Set-Cookie", cookie);
}

pub(crate) fn clear_session_cookie(ctx: &Context<'_>) {
    ctx.append_http_header("Set-Cookie", expired_session_cookie());
}

pub fn expired_session_cookie() -> String {
    format!("{}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE)
}

pub(crate) fn required_text(field: &str, value: &str) -> async_graphql::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(gql(ApiError::validation(format!("{field} is required"))));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn non_negative(field: &str, value: i64) -> async_graphql::Result<i64> {
    if value < 0 {
        return Err(gql(ApiError::validation(format!("{field} cannot be negative"))));
    }
    Ok(value)
}
