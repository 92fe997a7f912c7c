use async_graphql::{Context, InputObject, Object, SimpleObject, ID};
use chrono::Utc;
use entity::{business, customer, employee};
use platform_api::ApiError;
use sea_orm::{
    prelude::DateTimeWithTimeZone, ActiveModelTrait, ActiveValue::Set, ColumnTrait,
    Condition, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use super::{
    append_session_cookie, auth_config, clear_session_cookie, current_principal, database, gql,
    nodes::{BusinessNode, CustomerNode, EmployeeNode, ViewerNode},
    optional_text, parse_uuid, require, require_owner, required_text,
};
use crate::{
    auth::{self, AuthError, AuthFailure},
    db_err,
    identity::{resolve_principal, DbRoleDirectory, Permission},
    repo,
};

#[derive(Clone, Debug, SimpleObject)]
pub struct AuthPayload {
    pub ok: bool,
    /// Provider-style code such as `auth/invalid-credential`.
    pub error_code: Option<String>,
    /// Localized message for the failure.
    pub error: Option<String>,
    pub viewer: Option<ViewerNode>,
    pub token: Option<String>,
}

impl AuthPayload {
    fn failed(failure: AuthFailure) -> Self {
        Self {
            ok: false,
            error_code: Some(failure.code().to_string()),
            error: Some(failure.localized_message().to_string()),
            viewer: None,
            token: None,
        }
    }
}

fn auth_outcome<T>(result: Result<T, AuthError>) -> async_graphql::Result<Result<T, AuthFailure>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(AuthError::Failure(failure)) => Ok(Err(failure)),
        Err(AuthError::Db(err)) => Err(gql(db_err(err))),
        Err(AuthError::Hash(message)) => Err(gql(ApiError::internal(anyhow::anyhow!(message)))),
    }
}

/// Resolve the role for a fresh login and hand out the session cookie.
async fn start_session(
    ctx: &Context<'_>,
    account_id: Uuid,
) -> async_graphql::Result<AuthPayload> {
    let db = database(ctx)?;
    let auth = auth_config(ctx)?;
    let directory = DbRoleDirectory::new(db.as_ref());
    let principal = resolve_principal(&directory, account_id)
        .await
        .map_err(|err| gql(db_err(err)))?;
    let Some(principal) = principal else {
        tracing::warn!(%account_id, "login without role record");
        clear_session_cookie(ctx);
        return Ok(AuthPayload::failed(AuthFailure::NoProfile));
    };
    let token = auth::issue_token(account_id, &auth)
        .map_err(|err| gql(ApiError::internal(err.into())))?;
    append_session_cookie(ctx, &token, auth.session_ttl_minutes);
    Ok(AuthPayload {
        ok: true,
        error_code: None,
        error: None,
        viewer: Some(principal.into()),
        token: Some(token),
    })
}

fn permissions_json(permissions: &[Permission]) -> Value {
    let mut names: Vec<&str> = permissions.iter().map(|p| p.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    Value::from(names)
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

#[derive(Clone, Debug, InputObject)]
pub struct BusinessSignUpInput {
    pub email: String,
    pub password: String,
    pub business_name: String,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, InputObject)]
pub struct CustomerSignUpInput {
    pub business_id: ID,
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, InputObject)]
pub struct UpdateBusinessInput {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone, Debug, InputObject)]
pub struct NewEmployeeInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub permissions: Vec<Permission>,
    #[graphql(default)]
    pub commission_bps: i32,
}

#[derive(Clone, Debug, InputObject)]
pub struct UpdateEmployeeInput {
    pub id: ID,
    pub name: Option<String>,
    pub permissions: Option<Vec<Permission>>,
    pub commission_bps: Option<i32>,
}

#[derive(Clone, Debug, InputObject)]
pub struct CustomerInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Default)]
pub struct AccountQuery;

#[Object]
impl AccountQuery {
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<ViewerNode> {
        Ok(current_principal(ctx)?.into())
    }

    async fn business(&self, ctx: &Context<'_>) -> async_graphql::Result<BusinessNode> {
        let principal = current_principal(ctx)?;
        let db = database(ctx)?;
        business::Entity::find_by_id(principal.business_id)
            .one(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?
            .map(BusinessNode::from)
            .ok_or_else(|| gql(ApiError::NotFound("business")))
    }

    async fn employees(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<EmployeeNode>> {
        let principal = require(ctx, Permission::Employees)?;
        let db = database(ctx)?;
        let records = repo::list_query::<employee::Entity>(principal.business_id)
            .order_by_asc(employee::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(EmployeeNode::from).collect())
    }

    async fn customers(
        &self,
        ctx: &Context<'_>,
        q: Option<String>,
    ) -> async_graphql::Result<Vec<CustomerNode>> {
        let principal = require(ctx, Permission::Customers)?;
        let db = database(ctx)?;
        let mut query = repo::list_query::<customer::Entity>(principal.business_id);
        if let Some(filter) = optional_text(q) {
            let pattern = format!("%{}%", filter);
            query = query.filter(
                Condition::any()
                    .add(customer::Column::Name.like(pattern.clone()))
                    .add(customer::Column::Email.like(pattern.clone()))
                    .add(customer::Column::Phone.like(pattern)),
            );
        }
        let records = query
            .order_by_asc(customer::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(CustomerNode::from).collect())
    }
}

#[derive(Default)]
pub struct AccountMutation;

#[Object]
impl AccountMutation {
    /// Registers a new shop and its owner login.
    async fn sign_up_business(
        &self,
        ctx: &Context<'_>,
        input: BusinessSignUpInput,
    ) -> async_graphql::Result<AuthPayload> {
        let db = database(ctx)?;
        let name = required_text("businessName", &input.business_name)?;
        let span = tracing::info_span!("shop.auth.signUpBusiness");
        let txn = db.begin().await.map_err(|err| gql(db_err(err)))?;
        let account = match auth_outcome(
            auth::create_account(&txn, &input.email, &input.password)
                .instrument(span)
                .await,
        )? {
            Ok(account) => account,
            Err(failure) => return Ok(AuthPayload::failed(failure)),
        };
        let now = now();
        business::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_account_id: Set(account.id),
            name: Set(name),
            tax_id: Set(optional_text(input.tax_id)),
            phone: Set(optional_text(input.phone)),
            postal_code: Set(None),
            address: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|err| gql(db_err(err)))?;
        txn.commit().await.map_err(|err| gql(db_err(err)))?;
        start_session(ctx, account.id).await
    }

    /// Storefront self-registration for a shop's customer.
    async fn sign_up_customer(
        &self,
        ctx: &Context<'_>,
        input: CustomerSignUpInput,
    ) -> async_graphql::Result<AuthPayload> {
        let db = database(ctx)?;
        let business_id = parse_uuid(&input.business_id)?;
        let name = required_text("name", &input.name)?;
        business::Entity::find_by_id(business_id)
            .one(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?
            .ok_or_else(|| gql(ApiError::NotFound("business")))?;
        let txn = db.begin().await.map_err(|err| gql(db_err(err)))?;
        let account = match auth_outcome(
            auth::create_account(&txn, &input.email, &input.password).await,
        )? {
            Ok(account) => account,
            Err(failure) => return Ok(AuthPayload::failed(failure)),
        };
        let now = now();
        customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(Some(account.id)),
            business_id: Set(business_id),
            name: Set(name),
            email: Set(Some(account.email.clone())),
            phone: Set(optional_text(input.phone)),
            tax_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|err| gql(db_err(err)))?;
        txn.commit().await.map_err(|err| gql(db_err(err)))?;
        start_session(ctx, account.id).await
    }

    async fn sign_in(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<AuthPayload> {
        let db = database(ctx)?;
        let span = tracing::info_span!("shop.auth.signIn");
        let account = match auth_outcome(
            auth::authenticate(db.as_ref(), &email, &password)
                .instrument(span)
                .await,
        )? {
            Ok(account) => account,
            Err(failure) => return Ok(AuthPayload::failed(failure)),
        };
        start_session(ctx, account.id).await
    }

    async fn sign_out(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        clear_session_cookie(ctx);
        Ok(true)
    }

    async fn update_business(
        &self,
        ctx: &Context<'_>,
        input: UpdateBusinessInput,
    ) -> async_graphql::Result<BusinessNode> {
        let principal = require_owner(ctx)?;
        let db = database(ctx)?;
        let existing = business::Entity::find_by_id(principal.business_id)
            .one(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?
            .ok_or_else(|| gql(ApiError::NotFound("business")))?;
        let mut active: business::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(required_text("name", &name)?);
        }
        if let Some(tax_id) = input.tax_id {
            active.tax_id = Set(optional_text(Some(tax_id)));
        }
        if let Some(phone) = input.phone {
            active.phone = Set(optional_text(Some(phone)));
        }
        if let Some(postal_code) = input.postal_code {
            active.postal_code = Set(optional_text(Some(postal_code)));
        }
        if let Some(address) = input.address {
            active.address = Set(optional_text(Some(address)));
        }
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn create_employee(
        &self,
        ctx: &Context<'_>,
        input: NewEmployeeInput,
    ) -> async_graphql::Result<EmployeeNode> {
        let principal = require(ctx, Permission::Employees)?;
        let db = database(ctx)?;
        let name = required_text("name", &input.name)?;
        if !(0..=10_000).contains(&input.commission_bps) {
            return Err(gql(ApiError::validation("commission must be between 0 and 10000 bps")));
        }
        let txn = db.begin().await.map_err(|err| gql(db_err(err)))?;
        let account = match auth_outcome(
            auth::create_account(&txn, &input.email, &input.password).await,
        )? {
            Ok(account) => account,
            Err(failure) => {
                return Err(gql(ApiError::validation(failure.localized_message())));
            }
        };
        let now = now();
        let record = employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account.id),
            business_id: Set(principal.business_id),
            name: Set(name),
            permissions: Set(permissions_json(&input.permissions)),
            commission_bps: Set(input.commission_bps),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|err| gql(db_err(err)))?;
        txn.commit().await.map_err(|err| gql(db_err(err)))?;
        tracing::info!(employee_id = %record.id, business_id = %principal.business_id, "employee created");
        Ok(record.into())
    }

    async fn update_employee(
        &self,
        ctx: &Context<'_>,
        input: UpdateEmployeeInput,
    ) -> async_graphql::Result<EmployeeNode> {
        let principal = require(ctx, Permission::Employees)?;
        let db = database(ctx)?;
        let id = parse_uuid(&input.id)?;
        let existing = repo::get::<employee::Entity, _>(db.as_ref(), principal.business_id, id, "employee")
            .await
            .map_err(gql)?;
        let mut active: employee::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(required_text("name", &name)?);
        }
        if let Some(permissions) = input.permissions {
            active.permissions = Set(permissions_json(&permissions));
        }
        if let Some(bps) = input.commission_bps {
            if !(0..=10_000).contains(&bps) {
                return Err(gql(ApiError::validation("commission must be between 0 and 10000 bps")));
            }
            active.commission_bps = Set(bps);
        }
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn delete_employee(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let principal = require(ctx, Permission::Employees)?;
        let db = database(ctx)?;
        repo::delete::<employee::Entity, _>(db.as_ref(), principal.business_id, parse_uuid(&id)?, "employee")
            .await
            .map_err(gql)?;
        Ok(true)
    }

    async fn create_customer(
        &self,
        ctx: &Context<'_>,
        input: CustomerInput,
    ) -> async_graphql::Result<CustomerNode> {
        let principal = require(ctx, Permission::Customers)?;
        let db = database(ctx)?;
        let now = now();
        let record = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(None),
            business_id: Set(principal.business_id),
            name: Set(required_text("name", &input.name)?),
            email: Set(optional_text(input.email).map(|e| e.to_lowercase())),
            phone: Set(optional_text(input.phone)),
            tax_id: Set(optional_text(input.tax_id)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db.as_ref())
        .await
        .map_err(|err| gql(db_err(err)))?;
        Ok(record.into())
    }

    async fn update_customer(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: CustomerInput,
    ) -> async_graphql::Result<CustomerNode> {
        let principal = require(ctx, Permission::Customers)?;
        let db = database(ctx)?;
        let existing = repo::get::<customer::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "customer",
        )
        .await
        .map_err(gql)?;
        let mut active: customer::ActiveModel = existing.into();
        active.name = Set(required_text("name", &input.name)?);
        active.email = Set(optional_text(input.email).map(|e| e.to_lowercase()));
        active.phone = Set(optional_text(input.phone));
        active.tax_id = Set(optional_text(input.tax_id));
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn delete_customer(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let principal = require(ctx, Permission::Customers)?;
        let db = database(ctx)?;
        repo::delete::<customer::Entity, _>(db.as_ref(), principal.business_id, parse_uuid(&id)?, "customer")
            .await
            .map_err(gql)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_lists_are_sorted_and_unique() {
        let json = permissions_json(&[Permission::Stock, Permission::Agenda, Permission::Stock]);
        assert_eq!(json, serde_json::json!(["agenda", "stock"]));
    }

    #[test]
    fn failed_payload_carries_code_and_message() {
        let payload = AuthPayload::failed(AuthFailure::InvalidCredential);
        assert!(!payload.ok);
        assert_eq!(payload.error_code.as_deref(), Some("auth/invalid-credential"));
        assert_eq!(payload.error.as_deref(), Some("E-mail ou senha incorretos."));
    }
}
