use async_graphql::{Context, InputObject, Json, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};
use entity::{fiscal_rule, payment_method, stock_movement, voucher};
use platform_api::ApiError;
use sea_orm::{
    prelude::DateTimeWithTimeZone, ActiveModelTrait, ActiveValue::Set, ColumnTrait,
    QueryFilter, QueryOrder,
};
use serde_json::Value;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{
    current_principal, database, function_invoker, gql, non_negative,
    nodes::{
        FiscalRuleNode, PaymentMethodNode, ProductNode, StockMovementKind, StockMovementNode,
        VoucherNode,
    },
    optional_text, parse_optional_uuid, parse_uuid, require, required_text,
};
use crate::{
    db_err,
    functions::{scoped_payload, RemoteFunction},
    identity::{Permission, Principal},
    repo,
    workflow::{self, StockMovementRequest},
};

const MAX_BPS: i32 = 10_000;

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn basis_points(field: &str, value: i32) -> async_graphql::Result<i32> {
    if !(0..=MAX_BPS).contains(&value) {
        return Err(gql(ApiError::validation(format!(
            "{field} must be between 0 and {MAX_BPS}"
        ))));
    }
    Ok(value)
}

#[derive(Clone, Debug, InputObject)]
pub struct FiscalRuleInput {
    pub name: String,
    pub ncm: Option<String>,
    pub tax_code: String,
    pub rate_bps: i32,
    #[graphql(default = true)]
    pub active: bool,
}

#[derive(Clone, Debug, InputObject)]
pub struct PaymentMethodInput {
    pub name: String,
    #[graphql(default)]
    pub fee_bps: i32,
    #[graphql(default)]
    pub settlement_days: i32,
    #[graphql(default = true)]
    pub active: bool,
}

/// Exactly one of `percentOffBps` or `amountOffCents` is expected; both add up when set.
#[derive(Clone, Debug, InputObject)]
pub struct VoucherInput {
    pub code: String,
    pub percent_off_bps: Option<i32>,
    pub amount_off_cents: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    #[graphql(default = true)]
    pub active: bool,
}

#[derive(Clone, Debug, InputObject)]
pub struct StockMovementInput {
    pub product_id: ID,
    pub kind: StockMovementKind,
    pub quantity: i32,
    pub note: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StockMovementResult {
    pub movement: StockMovementNode,
    pub product: ProductNode,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct VoucherPreview {
    pub code: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

struct VoucherFields {
    code: String,
    percent_off_bps: Option<i32>,
    amount_off_cents: Option<i64>,
    expires_at: Option<DateTimeWithTimeZone>,
}

fn voucher_fields(input: &VoucherInput) -> async_graphql::Result<VoucherFields> {
    let code = workflow::normalize_voucher_code(&input.code);
    if code.is_empty() {
        return Err(gql(ApiError::validation("code is required")));
    }
    if input.percent_off_bps.is_none() && input.amount_off_cents.is_none() {
        return Err(gql(ApiError::validation(
            "voucher needs a percentage or an amount",
        )));
    }
    Ok(VoucherFields {
        code,
        percent_off_bps: input
            .percent_off_bps
            .map(|bps| basis_points("percentOffBps", bps))
            .transpose()?,
        amount_off_cents: input
            .amount_off_cents
            .map(|cents| non_negative("amountOffCents", cents))
            .transpose()?,
        expires_at: input.expires_at.map(Into::into),
    })
}

async fn ensure_unique_code(
    ctx: &Context<'_>,
    business_id: Uuid,
    code: &str,
    except: Option<Uuid>,
) -> async_graphql::Result<()> {
    let db = database(ctx)?;
    let clash = repo::list_query::<voucher::Entity>(business_id)
        .filter(voucher::Column::Code.eq(code))
        .one(db.as_ref())
        .await
        .map_err(|err| gql(db_err(err)))?;
    match clash {
        Some(existing) if Some(existing.id) != except => Err(gql(ApiError::Conflict(format!(
            "voucher {code} already exists"
        )))),
        _ => Ok(()),
    }
}

async fn invoke(
    ctx: &Context<'_>,
    principal: &Principal,
    function: RemoteFunction,
    payload: Option<Value>,
) -> async_graphql::Result<Value> {
    let invoker = function_invoker(ctx)?;
    let payload = scoped_payload(principal.business_id, payload)
        .map_err(|err| gql(ApiError::from(err)))?;
    let span = info_span!(
        "shop.functions.invoke",
        function = function.name(),
        business_id = %principal.business_id,
    );
    invoker
        .invoke(function, payload)
        .instrument(span)
        .await
        .map_err(|err| {
            tracing::warn!(function = function.name(), error = %err, "remote function failed");
            gql(ApiError::from(err))
        })
}

#[derive(Default)]
pub struct FinanceQuery;

#[Object]
impl FinanceQuery {
    async fn fiscal_rules(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<FiscalRuleNode>> {
        let principal = require(ctx, Permission::Fiscal)?;
        let db = database(ctx)?;
        let records = repo::list_query::<fiscal_rule::Entity>(principal.business_id)
            .order_by_asc(fiscal_rule::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(FiscalRuleNode::from).collect())
    }

    async fn payment_methods(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Vec<PaymentMethodNode>> {
        let principal = require(ctx, Permission::Finance)?;
        let db = database(ctx)?;
        let records = repo::list_query::<payment_method::Entity>(principal.business_id)
            .order_by_asc(payment_method::Column::Name)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(PaymentMethodNode::from).collect())
    }

    async fn vouchers(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<VoucherNode>> {
        let principal = require(ctx, Permission::Finance)
            .or_else(|_| require(ctx, Permission::Marketing))?;
        let db = database(ctx)?;
        let records = repo::list_query::<voucher::Entity>(principal.business_id)
            .order_by_asc(voucher::Column::Code)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(VoucherNode::from).collect())
    }

    /// Newest first; optionally limited to one product.
    async fn stock_movements(
        &self,
        ctx: &Context<'_>,
        product_id: Option<ID>,
    ) -> async_graphql::Result<Vec<StockMovementNode>> {
        let principal = require(ctx, Permission::Stock)?;
        let db = database(ctx)?;
        let mut query = repo::list_query::<stock_movement::Entity>(principal.business_id);
        if let Some(product_id) = parse_optional_uuid(product_id.as_ref())? {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }
        let records = query
            .order_by_desc(stock_movement::Column::CreatedAt)
            .all(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(records.into_iter().map(StockMovementNode::from).collect())
    }

    /// Price a cart against a voucher code without consuming it.
    async fn preview_voucher(
        &self,
        ctx: &Context<'_>,
        code: String,
        subtotal_cents: i64,
    ) -> async_graphql::Result<VoucherPreview> {
        let principal = current_principal(ctx)?;
        let db = database(ctx)?;
        let subtotal = non_negative("subtotalCents", subtotal_cents)?;
        let discount = workflow::apply_voucher(db.as_ref(), principal.business_id, &code, subtotal)
            .await
            .map_err(gql)?;
        Ok(VoucherPreview {
            code: workflow::normalize_voucher_code(&code),
            subtotal_cents: subtotal,
            discount_cents: discount.discount_cents,
            total_cents: discount.total_cents,
        })
    }

    /// Runs a read-only report on the function tier.
    async fn run_report(
        &self,
        ctx: &Context<'_>,
        function: RemoteFunction,
        payload: Option<Json<Value>>,
    ) -> async_graphql::Result<Json<Value>> {
        if function == RemoteFunction::GenerateMarketingCopy {
            return Err(gql(ApiError::validation(
                "use generateMarketingCopy for text generation",
            )));
        }
        let principal = require(ctx, function.permission())?;
        let result = invoke(ctx, &principal, function, payload.map(|p| p.0)).await?;
        Ok(Json(result))
    }
}

#[derive(Default)]
pub struct FinanceMutation;

#[Object]
impl FinanceMutation {
    async fn create_fiscal_rule(
        &self,
        ctx: &Context<'_>,
        input: FiscalRuleInput,
    ) -> async_graphql::Result<FiscalRuleNode> {
        let principal = require(ctx, Permission::Fiscal)?;
        let db = database(ctx)?;
        let now = now();
        let record = fiscal_rule::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(principal.business_id),
            name: Set(required_text("name", &input.name)?),
            ncm: Set(optional_text(input.ncm)),
            tax_code: Set(required_text("taxCode", &input.tax_code)?),
            rate_bps: Set(basis_points("rateBps", input.rate_bps)?),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db.as_ref())
        .await
        .map_err(|err| gql(db_err(err)))?;
        Ok(record.into())
    }

    async fn update_fiscal_rule(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: FiscalRuleInput,
    ) -> async_graphql::Result<FiscalRuleNode> {
        let principal = require(ctx, Permission::Fiscal)?;
        let db = database(ctx)?;
        let existing = repo::get::<fiscal_rule::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "fiscal rule",
        )
        .await
        .map_err(gql)?;
        let mut active: fiscal_rule::ActiveModel = existing.into();
        active.name = Set(required_text("name", &input.name)?);
        active.ncm = Set(optional_text(input.ncm));
        active.tax_code = Set(required_text("taxCode", &input.tax_code)?);
        active.rate_bps = Set(basis_points("rateBps", input.rate_bps)?);
        active.active = Set(input.active);
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn delete_fiscal_rule(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let principal = require(ctx, Permission::Fiscal)?;
        let db = database(ctx)?;
        repo::delete::<fiscal_rule::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "fiscal rule",
        )
        .await
        .map_err(gql)?;
        Ok(true)
    }

    async fn create_payment_method(
        &self,
        ctx: &Context<'_>,
        input: PaymentMethodInput,
    ) -> async_graphql::Result<PaymentMethodNode> {
        let principal = require(ctx, Permission::Finance)?;
        let db = database(ctx)?;
        let now = now();
        let record = payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(principal.business_id),
            name: Set(required_text("name", &input.name)?),
            fee_bps: Set(basis_points("feeBps", input.fee_bps)?),
            settlement_days: Set(input.settlement_days.max(0)),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db.as_ref())
        .await
        .map_err(|err| gql(db_err(err)))?;
        Ok(record.into())
    }

    async fn update_payment_method(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: PaymentMethodInput,
    ) -> async_graphql::Result<PaymentMethodNode> {
        let principal = require(ctx, Permission::Finance)?;
        let db = database(ctx)?;
        let existing = repo::get::<payment_method::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "payment method",
        )
        .await
        .map_err(gql)?;
        let mut active: payment_method::ActiveModel = existing.into();
        active.name = Set(required_text("name", &input.name)?);
        active.fee_bps = Set(basis_points("feeBps", input.fee_bps)?);
        active.settlement_days = Set(input.settlement_days.max(0));
        active.active = Set(input.active);
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn delete_payment_method(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<bool> {
        let principal = require(ctx, Permission::Finance)?;
        let db = database(ctx)?;
        repo::delete::<payment_method::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "payment method",
        )
        .await
        .map_err(gql)?;
        Ok(true)
    }

    async fn create_voucher(
        &self,
        ctx: &Context<'_>,
        input: VoucherInput,
    ) -> async_graphql::Result<VoucherNode> {
        let principal = require(ctx, Permission::Finance)
            .or_else(|_| require(ctx, Permission::Marketing))?;
        let fields = voucher_fields(&input)?;
        ensure_unique_code(ctx, principal.business_id, &fields.code, None).await?;
        let db = database(ctx)?;
        let now = now();
        let record = voucher::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(principal.business_id),
            code: Set(fields.code),
            percent_off_bps: Set(fields.percent_off_bps),
            amount_off_cents: Set(fields.amount_off_cents),
            expires_at: Set(fields.expires_at),
            active: Set(input.active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db.as_ref())
        .await
        .map_err(|err| gql(db_err(err)))?;
        Ok(record.into())
    }

    async fn update_voucher(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: VoucherInput,
    ) -> async_graphql::Result<VoucherNode> {
        let principal = require(ctx, Permission::Finance)
            .or_else(|_| require(ctx, Permission::Marketing))?;
        let db = database(ctx)?;
        let existing = repo::get::<voucher::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "voucher",
        )
        .await
        .map_err(gql)?;
        let fields = voucher_fields(&input)?;
        ensure_unique_code(ctx, principal.business_id, &fields.code, Some(existing.id)).await?;
        let mut active: voucher::ActiveModel = existing.into();
        active.code = Set(fields.code);
        active.percent_off_bps = Set(fields.percent_off_bps);
        active.amount_off_cents = Set(fields.amount_off_cents);
        active.expires_at = Set(fields.expires_at);
        active.active = Set(input.active);
        active.updated_at = Set(now());
        let updated = active
            .update(db.as_ref())
            .await
            .map_err(|err| gql(db_err(err)))?;
        Ok(updated.into())
    }

    async fn delete_voucher(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let principal = require(ctx, Permission::Finance)
            .or_else(|_| require(ctx, Permission::Marketing))?;
        let db = database(ctx)?;
        repo::delete::<voucher::Entity, _>(
            db.as_ref(),
            principal.business_id,
            parse_uuid(&id)?,
            "voucher",
        )
        .await
        .map_err(gql)?;
        Ok(true)
    }

    async fn record_stock_movement(
        &self,
        ctx: &Context<'_>,
        input: StockMovementInput,
    ) -> async_graphql::Result<StockMovementResult> {
        let principal = require(ctx, Permission::Stock)?;
        let db = database(ctx)?;
        let request = StockMovementRequest {
            business_id: principal.business_id,
            product_id: parse_uuid(&input.product_id)?,
            kind: input.kind.into(),
            quantity: input.quantity,
            note: optional_text(input.note),
            created_by: Some(principal.employee_id.unwrap_or(principal.account_id)),
        };
        let span = info_span!(
            "shop.stock.movement",
            product_id = %request.product_id,
            kind = ?request.kind,
            quantity = request.quantity,
        );
        let (movement, product) = workflow::record_stock_movement(db.as_ref(), request)
            .instrument(span)
            .await
            .map_err(gql)?;
        Ok(StockMovementResult {
            movement: movement.into(),
            product: product.into(),
        })
    }

    /// Text generation on the function tier; the reply is passed through untouched.
    async fn generate_marketing_copy(
        &self,
        ctx: &Context<'_>,
        payload: Option<Json<Value>>,
    ) -> async_graphql::Result<Json<Value>> {
        let principal = require(ctx, Permission::Marketing)?;
        let result = invoke(
            ctx,
            &principal,
            RemoteFunction::GenerateMarketingCopy,
            payload.map(|p| p.0),
        )
        .await?;
        Ok(Json(result))
    }
}
