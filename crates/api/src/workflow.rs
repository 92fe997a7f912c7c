//! Multi-record operations: quote and appointment approval, stock, invoicing.

use chrono::Utc;
use entity::{
    appointment, invoice_line, product, quote, review, service_order, stock_movement, voucher,
};
use platform_api::{ApiError, ApiResult};
use sea_orm::{
    prelude::DateTimeWithTimeZone, ActiveModelTrait, ActiveValue::Set, ColumnTrait,
    ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    catalog::{self, LineItemRef},
    db_err, repo,
};

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

pub struct QuoteRequest {
    pub business_id: Uuid,
    pub customer_id: Uuid,
    pub description: String,
    pub vehicle: Option<String>,
    pub items: Vec<LineItemRef>,
}

pub async fn request_quote<C: ConnectionTrait>(
    conn: &C,
    request: QuoteRequest,
) -> ApiResult<quote::Model> {
    let description = request.description.trim().to_string();
    if description.is_empty() {
        return Err(ApiError::validation("description is required"));
    }
    if request.items.is_empty() {
        return Err(ApiError::validation("select at least one service or product"));
    }
    let priced = catalog::price_items(conn, request.business_id, &request.items).await?;
    let now = now();
    let model = quote::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(request.business_id),
        customer_id: Set(request.customer_id),
        description: Set(description),
        vehicle: Set(request.vehicle.filter(|v| !v.trim().is_empty())),
        items: Set(catalog::encode_items(&request.items)),
        total_cents: Set(catalog::total_cents(&priced)),
        status: Set(quote::Status::Requested),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(db_err)?;
    tracing::info!(quote_id = %model.id, total_cents = model.total_cents, "quote requested");
    Ok(model)
}

/// Approve a quote and book the resulting appointment in one transaction.
pub async fn approve_quote(
    db: &DatabaseConnection,
    business_id: Uuid,
    quote_id: Uuid,
    scheduled_at: DateTimeWithTimeZone,
    employee_id: Option<Uuid>,
) -> ApiResult<(quote::Model, appointment::Model)> {
    let txn = db.begin().await.map_err(db_err)?;
    let existing = repo::get::<quote::Entity, _>(&txn, business_id, quote_id, "quote").await?;
    if existing.status.is_terminal() {
        return Err(ApiError::Conflict("quote is already closed".into()));
    }
    let now = now();
    let booked = appointment::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(business_id),
        customer_id: Set(existing.customer_id),
        employee_id: Set(employee_id),
        quote_id: Set(Some(existing.id)),
        vehicle: Set(existing.vehicle.clone()),
        scheduled_at: Set(scheduled_at),
        notes: Set(Some(existing.description.clone())),
        status: Set(appointment::Status::Requested),
        items: Set(existing.items.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(db_err)?;

    let mut active: quote::ActiveModel = existing.into();
    active.status = Set(quote::Status::Approved);
    active.updated_at = Set(now);
    let approved = active.update(&txn).await.map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;
    tracing::info!(%quote_id, appointment_id = %booked.id, "quote approved");
    Ok((approved, booked))
}

pub struct AppointmentRequest {
    pub business_id: Uuid,
    pub customer_id: Uuid,
    pub scheduled_at: DateTimeWithTimeZone,
    pub vehicle: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<LineItemRef>,
}

pub async fn request_appointment<C: ConnectionTrait>(
    conn: &C,
    request: AppointmentRequest,
) -> ApiResult<appointment::Model> {
    if request.items.is_empty() {
        return Err(ApiError::validation("select at least one service"));
    }
    catalog::price_items(conn, request.business_id, &request.items).await?;
    let now = now();
    appointment::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(request.business_id),
        customer_id: Set(request.customer_id),
        employee_id: Set(None),
        quote_id: Set(None),
        vehicle: Set(request.vehicle.filter(|v| !v.trim().is_empty())),
        scheduled_at: Set(request.scheduled_at),
        notes: Set(request.notes.filter(|n| !n.trim().is_empty())),
        status: Set(appointment::Status::Requested),
        items: Set(catalog::encode_items(&request.items)),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(db_err)
}

/// Accept a requested appointment and open its service order in one transaction.
pub async fn approve_appointment(
    db: &DatabaseConnection,
    business_id: Uuid,
    appointment_id: Uuid,
    employee_id: Option<Uuid>,
) -> ApiResult<(appointment::Model, service_order::Model)> {
    let txn = db.begin().await.map_err(db_err)?;
    let existing =
        repo::get::<appointment::Entity, _>(&txn, business_id, appointment_id, "appointment")
            .await?;
    if existing.status != appointment::Status::Requested {
        return Err(ApiError::Conflict(
            "only requested appointments can be approved".into(),
        ));
    }
    let now = now();
    let employee_id = employee_id.or(existing.employee_id);
    let order = service_order::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(business_id),
        customer_id: Set(existing.customer_id),
        employee_id: Set(employee_id),
        appointment_id: Set(Some(existing.id)),
        items: Set(existing.items.clone()),
        status: Set(service_order::Status::Scheduled),
        started_at: Set(None),
        finished_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(db_err)?;

    let mut active: appointment::ActiveModel = existing.into();
    active.status = Set(appointment::Status::Approved);
    active.employee_id = Set(employee_id);
    active.updated_at = Set(now);
    let approved = active.update(&txn).await.map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;
    tracing::info!(%appointment_id, service_order_id = %order.id, "appointment approved");
    Ok((approved, order))
}

pub async fn close_appointment<C: ConnectionTrait>(
    conn: &C,
    business_id: Uuid,
    appointment_id: Uuid,
    status: appointment::Status,
) -> ApiResult<appointment::Model> {
    if !matches!(
        status,
        appointment::Status::Declined | appointment::Status::Cancelled
    ) {
        return Err(ApiError::validation("appointments can only be declined or cancelled"));
    }
    let existing =
        repo::get::<appointment::Entity, _>(conn, business_id, appointment_id, "appointment")
            .await?;
    if matches!(
        existing.status,
        appointment::Status::Declined | appointment::Status::Cancelled
    ) {
        return Err(ApiError::Conflict("appointment is already closed".into()));
    }
    let mut active: appointment::ActiveModel = existing.into();
    active.status = Set(status);
    active.updated_at = Set(now());
    active.update(conn).await.map_err(db_err)
}

pub struct StockMovementRequest {
    pub business_id: Uuid,
    pub product_id: Uuid,
    pub kind: stock_movement::Kind,
    /// Positive for in/out; signed delta for adjustments.
    pub quantity: i32,
    pub note: Option<String>,
    pub created_by: Option<Uuid>,
}

pub fn stock_delta(kind: stock_movement::Kind, quantity: i32) -> ApiResult<i32> {
    match kind {
        stock_movement::Kind::In | stock_movement::Kind::Out if quantity <= 0 => {
            Err(ApiError::validation("quantity must be positive"))
        }
        stock_movement::Kind::Adjustment if quantity == 0 => {
            Err(ApiError::validation("adjustment must change the stock"))
        }
        stock_movement::Kind::Out => Ok(-quantity),
        stock_movement::Kind::In | stock_movement::Kind::Adjustment => Ok(quantity),
    }
}

/// Insert the movement and apply it to the product's stock in one transaction.
pub async fn record_stock_movement(
    db: &DatabaseConnection,
    request: StockMovementRequest,
) -> ApiResult<(stock_movement::Model, product::Model)> {
    let delta = stock_delta(request.kind, request.quantity)?;
    let txn = db.begin().await.map_err(db_err)?;
    let item =
        repo::get::<product::Entity, _>(&txn, request.business_id, request.product_id, "product")
            .await?;
    let next = item
        .stock_quantity
        .checked_add(delta)
        .ok_or_else(|| ApiError::validation("quantity out of range"))?;
    if next < 0 {
        return Err(ApiError::Conflict(format!(
            "insufficient stock: {} available",
            item.stock_quantity
        )));
    }
    let now = now();
    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(request.business_id),
        product_id: Set(item.id),
        kind: Set(request.kind),
        quantity: Set(request.quantity),
        note: Set(request.note.filter(|n| !n.trim().is_empty())),
        created_by: Set(request.created_by),
        created_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(db_err)?;

    let mut active: product::ActiveModel = item.into();
    active.stock_quantity = Set(next);
    active.updated_at = Set(now);
    let updated = active.update(&txn).await.map_err(db_err)?;
    txn.commit().await.map_err(db_err)?;
    if updated.stock_quantity <= updated.min_stock {
        tracing::warn!(product_id = %updated.id, stock = updated.stock_quantity, "product at or below minimum stock");
    }
    Ok((movement, updated))
}

pub async fn add_invoice_line<C: ConnectionTrait>(
    conn: &C,
    business_id: Uuid,
    service_order_id: Uuid,
    item: LineItemRef,
    quantity: i32,
) -> ApiResult<invoice_line::Model> {
    if quantity <= 0 {
        return Err(ApiError::validation("quantity must be positive"));
    }
    repo::get::<service_order::Entity, _>(conn, business_id, service_order_id, "service order")
        .await?;
    let priced = catalog::price_items(conn, business_id, &[item]).await?;
    let Some(priced) = priced.into_iter().next() else {
        return Err(ApiError::validation("unknown catalog item"));
    };
    let total = priced
        .unit_price_cents
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| ApiError::validation("line total out of range"))?;
    invoice_line::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(business_id),
        service_order_id: Set(service_order_id),
        item_kind: Set(item.kind.into()),
        item_id: Set(item.item_id),
        description: Set(priced.name),
        quantity: Set(quantity),
        unit_price_cents: Set(priced.unit_price_cents),
        total_cents: Set(total),
        created_at: Set(now()),
    }
    .insert(conn)
    .await
    .map_err(db_err)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Discount {
    pub discount_cents: i64,
    pub total_cents: i64,
}

/// Percentage first, then fixed amount; never below zero.
pub fn discount_for(record: &voucher::Model, subtotal_cents: i64) -> Discount {
    let subtotal = subtotal_cents.max(0);
    // i128 keeps `subtotal * bps` exact for any i64 subtotal.
    let percent = record
        .percent_off_bps
        .map(|bps| i128::from(subtotal) * i128::from(bps.clamp(0, 10_000)) / 10_000)
        .unwrap_or(0);
    let fixed = i128::from(record.amount_off_cents.unwrap_or(0).max(0));
    let discount = (percent + fixed).min(i128::from(subtotal));
    // Bounded by `subtotal`, so it fits back into i64.
    let discount = i64::try_from(discount).unwrap_or(subtotal);
    Discount {
        discount_cents: discount,
        total_cents: subtotal - discount,
    }
}

pub fn normalize_voucher_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub async fn apply_voucher<C: ConnectionTrait>(
    conn: &C,
    business_id: Uuid,
    code: &str,
    subtotal_cents: i64,
) -> ApiResult<Discount> {
    let code = normalize_voucher_code(code);
    let record = repo::list_query::<voucher::Entity>(business_id)
        .filter(voucher::Column::Code.eq(code))
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or(ApiError::NotFound("voucher"))?;
    if !record.active {
        return Err(ApiError::validation("voucher is inactive"));
    }
    if record.expires_at.is_some_and(|at| at < now()) {
        return Err(ApiError::validation("voucher has expired"));
    }
    Ok(discount_for(&record, subtotal_cents))
}

pub async fn submit_review<C: ConnectionTrait>(
    conn: &C,
    business_id: Uuid,
    customer_id: Uuid,
    service_order_id: Option<Uuid>,
    rating: i16,
    comment: Option<String>,
) -> ApiResult<review::Model> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::validation("rating must be between 1 and 5"));
    }
    if let Some(order_id) = service_order_id {
        let order = repo::get::<service_order::Entity, _>(conn, business_id, order_id, "service order")
            .await?;
        if order.customer_id != customer_id {
            return Err(ApiError::Forbidden);
        }
    }
    review::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(business_id),
        customer_id: Set(customer_id),
        service_order_id: Set(service_order_id),
        rating: Set(rating),
        comment: Set(comment.filter(|c| !c.trim().is_empty())),
        created_at: Set(now()),
    }
    .insert(conn)
    .await
    .map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voucher(percent: Option<i32>, amount: Option<i64>) -> voucher::Model {
        let now = now();
        voucher::Model {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            code: "WAX10".into(),
            percent_off_bps: percent,
            amount_off_cents: amount,
            expires_at: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stock_deltas_follow_movement_kind() {
        assert_eq!(stock_delta(stock_movement::Kind::In, 5).unwrap(), 5);
        assert_eq!(stock_delta(stock_movement::Kind::Out, 5).unwrap(), -5);
        assert_eq!(stock_delta(stock_movement::Kind::Adjustment, -2).unwrap(), -2);
        assert_eq!(
            stock_delta(stock_movement::Kind::Out, 0).unwrap_err().code(),
            "VALIDATION"
        );
        assert!(stock_delta(stock_movement::Kind::Adjustment, 0).is_err());
    }

    #[test]
    fn discounts_never_exceed_subtotal() {
        assert_eq!(
            discount_for(&voucher(Some(1_000), None), 20_000),
            Discount {
                discount_cents: 2_000,
                total_cents: 18_000
            }
        );
        assert_eq!(
            discount_for(&voucher(Some(500), Some(1_000)), 10_000).total_cents,
            8_500
        );
        assert_eq!(
            discount_for(&voucher(None, Some(50_000)), 10_000),
            Discount {
                discount_cents: 10_000,
                total_cents: 0
            }
        );
    }

    #[test]
    fn huge_subtotals_and_amounts_stay_in_range() {
        let percent_only = discount_for(&voucher(Some(1_000), None), i64::MAX / 100);
        assert_eq!(percent_only.discount_cents, i64::MAX / 100 / 10);
        assert_eq!(
            percent_only.discount_cents + percent_only.total_cents,
            i64::MAX / 100
        );

        assert_eq!(
            discount_for(&voucher(Some(5_000), Some(i64::MAX)), i64::MAX),
            Discount {
                discount_cents: i64::MAX,
                total_cents: 0
            }
        );

        let full = discount_for(&voucher(Some(10_000), None), i64::MAX);
        assert_eq!(full.discount_cents, i64::MAX);
        assert_eq!(full.total_cents, 0);
    }

    #[test]
    fn stored_percentages_outside_the_range_are_clamped() {
        assert_eq!(
            discount_for(&voucher(Some(25_000), None), 4_000),
            Discount {
                discount_cents: 4_000,
                total_cents: 0
            }
        );
        assert_eq!(
            discount_for(&voucher(Some(-500), Some(100)), 4_000),
            Discount {
                discount_cents: 100,
                total_cents: 3_900
            }
        );
        assert_eq!(
            discount_for(&voucher(Some(1_000), Some(-300)), 4_000).discount_cents,
            400
        );
    }

    #[test]
    fn negative_subtotal_counts_as_zero() {
        assert_eq!(
            discount_for(&voucher(Some(1_000), Some(500)), -10),
            Discount {
                discount_cents: 0,
                total_cents: 0
            }
        );
    }

    #[test]
    fn voucher_codes_are_upper_cased() {
        assert_eq!(normalize_voucher_code("  wax10 "), "WAX10");
    }
}
