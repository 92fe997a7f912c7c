use async_graphql::{Enum, SimpleObject, ID};
use chrono::{DateTime, Utc};
use entity::{
    appointment, business, customer, employee, fiscal_rule, inspection, invoice_line,
    payment_method, product, quote, review, service, service_order, stock_movement, voucher,
};

use crate::{
    catalog::{decode_items, ItemKind, LineItemRef},
    identity::{Permissions, Principal, Role},
    inspection::{ChecklistEntry, DamageMarker},
};

fn id(value: uuid::Uuid) -> ID {
    ID::from(value.to_string())
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum ServiceOrderStatus {
    Scheduled,
    InProgress,
    AwaitingCustomer,
    AwaitingParts,
    Completed,
    Cancelled,
}

impl From<service_order::Status> for ServiceOrderStatus {
    fn from(value: service_order::Status) -> Self {
        match value {
            service_order::Status::Scheduled => ServiceOrderStatus::Scheduled,
            service_order::Status::InProgress => ServiceOrderStatus::InProgress,
            service_order::Status::AwaitingCustomer => ServiceOrderStatus::AwaitingCustomer,
            service_order::Status::AwaitingParts => ServiceOrderStatus::AwaitingParts,
            service_order::Status::Completed => ServiceOrderStatus::Completed,
            service_order::Status::Cancelled => ServiceOrderStatus::Cancelled,
        }
    }
}

impl From<ServiceOrderStatus> for service_order::Status {
    fn from(value: ServiceOrderStatus) -> Self {
        match value {
            ServiceOrderStatus::Scheduled => service_order::Status::Scheduled,
            ServiceOrderStatus::InProgress => service_order::Status::InProgress,
            ServiceOrderStatus::AwaitingCustomer => service_order::Status::AwaitingCustomer,
            ServiceOrderStatus::AwaitingParts => service_order::Status::AwaitingParts,
            ServiceOrderStatus::Completed => service_order::Status::Completed,
            ServiceOrderStatus::Cancelled => service_order::Status::Cancelled,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum QuoteStatus {
    Requested,
    UnderReview,
    AwaitingCustomer,
    Approved,
    Cancelled,
    ReturnedForRevision,
}

impl From<quote::Status> for QuoteStatus {
    fn from(value: quote::Status) -> Self {
        match value {
            quote::Status::Requested => QuoteStatus::Requested,
            quote::Status::UnderReview => QuoteStatus::UnderReview,
            quote::Status::AwaitingCustomer => QuoteStatus::AwaitingCustomer,
            quote::Status::Approved => QuoteStatus::Approved,
            quote::Status::Cancelled => QuoteStatus::Cancelled,
            quote::Status::ReturnedForRevision => QuoteStatus::ReturnedForRevision,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum AppointmentStatus {
    Requested,
    Approved,
    Declined,
    Cancelled,
}

impl From<appointment::Status> for AppointmentStatus {
    fn from(value: appointment::Status) -> Self {
        match value {
            appointment::Status::Requested => AppointmentStatus::Requested,
            appointment::Status::Approved => AppointmentStatus::Approved,
            appointment::Status::Declined => AppointmentStatus::Declined,
            appointment::Status::Cancelled => AppointmentStatus::Cancelled,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum StockMovementKind {
    In,
    Out,
    Adjustment,
}

impl From<stock_movement::Kind> for StockMovementKind {
    fn from(value: stock_movement::Kind) -> Self {
        match value {
            stock_movement::Kind::In => StockMovementKind::In,
            stock_movement::Kind::Out => StockMovementKind::Out,
            stock_movement::Kind::Adjustment => StockMovementKind::Adjustment,
        }
    }
}

impl From<StockMovementKind> for stock_movement::Kind {
    fn from(value: StockMovementKind) -> Self {
        match value {
            StockMovementKind::In => stock_movement::Kind::In,
            StockMovementKind::Out => stock_movement::Kind::Out,
            StockMovementKind::Adjustment => stock_movement::Kind::Adjustment,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ViewerNode {
    pub account_id: ID,
    pub business_id: ID,
    pub role: Role,
    pub display_name: String,
    /// `["*"]` for business owners.
    pub permissions: Vec<String>,
    pub employee_id: Option<ID>,
    pub customer_id: Option<ID>,
}

impl From<Principal> for ViewerNode {
    fn from(principal: Principal) -> Self {
        Self {
            account_id: id(principal.account_id),
            business_id: id(principal.business_id),
            role: principal.role,
            display_name: principal.display_name,
            permissions: principal.permissions.names(),
            employee_id: principal.employee_id.map(id),
            customer_id: principal.customer_id.map(id),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct BusinessNode {
    pub id: ID,
    pub name: String,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<business::Model> for BusinessNode {
    fn from(model: business::Model) -> Self {
        Self {
            id: id(model.id),
            name: model.name,
            tax_id: model.tax_id,
            phone: model.phone,
            postal_code: model.postal_code,
            address: model.address,
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct EmployeeNode {
    pub id: ID,
    pub account_id: ID,
    pub name: String,
    pub permissions: Vec<String>,
    pub commission_bps: i32,
    pub created_at: DateTime<Utc>,
}

impl From<employee::Model> for EmployeeNode {
    fn from(model: employee::Model) -> Self {
        Self {
            id: id(model.id),
            account_id: id(model.account_id),
            permissions: Permissions::from_json(&model.permissions).names(),
            name: model.name,
            commission_bps: model.commission_bps,
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CustomerNode {
    pub id: ID,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    pub has_account: bool,
    pub created_at: DateTime<Utc>,
}

impl From<customer::Model> for CustomerNode {
    fn from(model: customer::Model) -> Self {
        Self {
            id: id(model.id),
            name: model.name,
            email: model.email,
            phone: model.phone,
            tax_id: model.tax_id,
            has_account: model.account_id.is_some(),
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ServiceNode {
    pub id: ID,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub duration_minutes: i32,
    pub image_url: Option<String>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<service::Model> for ServiceNode {
    fn from(model: service::Model) -> Self {
        Self {
            id: id(model.id),
            name: model.name,
            description: model.description,
            price_cents: model.price_cents,
            duration_minutes: model.duration_minutes,
            image_url: model.image_url,
            active: model.active,
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ProductNode {
    pub id: ID,
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub stock_quantity: i32,
    pub min_stock: i32,
    pub low_stock: bool,
    pub image_url: Option<String>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<product::Model> for ProductNode {
    fn from(model: product::Model) -> Self {
        Self {
            id: id(model.id),
            low_stock: model.stock_quantity <= model.min_stock,
            name: model.name,
            sku: model.sku,
            price_cents: model.price_cents,
            cost_cents: model.cost_cents,
            stock_quantity: model.stock_quantity,
            min_stock: model.min_stock,
            image_url: model.image_url,
            active: model.active,
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct AppointmentNode {
    pub id: ID,
    pub customer_id: ID,
    pub employee_id: Option<ID>,
    pub quote_id: Option<ID>,
    pub vehicle: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub items: Vec<LineItemRef>,
    pub created_at: DateTime<Utc>,
}

impl From<appointment::Model> for AppointmentNode {
    fn from(model: appointment::Model) -> Self {
        Self {
            id: id(model.id),
            customer_id: id(model.customer_id),
            employee_id: model.employee_id.map(id),
            quote_id: model.quote_id.map(id),
            vehicle: model.vehicle,
            scheduled_at: model.scheduled_at.into(),
            notes: model.notes,
            status: model.status.into(),
            items: decode_items(&model.items),
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ServiceOrderNode {
    pub id: ID,
    pub customer_id: ID,
    pub employee_id: Option<ID>,
    pub appointment_id: Option<ID>,
    pub items: Vec<LineItemRef>,
    pub status: ServiceOrderStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<service_order::Model> for ServiceOrderNode {
    fn from(model: service_order::Model) -> Self {
        Self {
            id: id(model.id),
            customer_id: id(model.customer_id),
            employee_id: model.employee_id.map(id),
            appointment_id: model.appointment_id.map(id),
            items: decode_items(&model.items),
            status: model.status.into(),
            started_at: model.started_at.map(Into::into),
            finished_at: model.finished_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct QuoteNode {
    pub id: ID,
    pub customer_id: ID,
    pub description: String,
    pub vehicle: Option<String>,
    pub items: Vec<LineItemRef>,
    pub total_cents: i64,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<quote::Model> for QuoteNode {
    fn from(model: quote::Model) -> Self {
        Self {
            id: id(model.id),
            customer_id: id(model.customer_id),
            description: model.description,
            vehicle: model.vehicle,
            items: decode_items(&model.items),
            total_cents: model.total_cents,
            status: model.status.into(),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct InvoiceLineNode {
    pub id: ID,
    pub service_order_id: ID,
    pub item_kind: ItemKind,
    pub item_id: ID,
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl From<invoice_line::Model> for InvoiceLineNode {
    fn from(model: invoice_line::Model) -> Self {
        Self {
            id: id(model.id),
            service_order_id: id(model.service_order_id),
            item_kind: model.item_kind.into(),
            item_id: id(model.item_id),
            description: model.description,
            quantity: model.quantity,
            unit_price_cents: model.unit_price_cents,
            total_cents: model.total_cents,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct StockMovementNode {
    pub id: ID,
    pub product_id: ID,
    pub kind: StockMovementKind,
    pub quantity: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<stock_movement::Model> for StockMovementNode {
    fn from(model: stock_movement::Model) -> Self {
        Self {
            id: id(model.id),
            product_id: id(model.product_id),
            kind: model.kind.into(),
            quantity: model.quantity,
            note: model.note,
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct FiscalRuleNode {
    pub id: ID,
    pub name: String,
    pub ncm: Option<String>,
    pub tax_code: String,
    pub rate_bps: i32,
    pub active: bool,
}

impl From<fiscal_rule::Model> for FiscalRuleNode {
    fn from(model: fiscal_rule::Model) -> Self {
        Self {
            id: id(model.id),
            name: model.name,
            ncm: model.ncm,
            tax_code: model.tax_code,
            rate_bps: model.rate_bps,
            active: model.active,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PaymentMethodNode {
    pub id: ID,
    pub name: String,
    pub fee_bps: i32,
    pub settlement_days: i32,
    pub active: bool,
}

impl From<payment_method::Model> for PaymentMethodNode {
    fn from(model: payment_method::Model) -> Self {
        Self {
            id: id(model.id),
            name: model.name,
            fee_bps: model.fee_bps,
            settlement_days: model.settlement_days,
            active: model.active,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct VoucherNode {
    pub id: ID,
    pub code: String,
    pub percent_off_bps: Option<i32>,
    pub amount_off_cents: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl From<voucher::Model> for VoucherNode {
    fn from(model: voucher::Model) -> Self {
        Self {
            id: id(model.id),
            code: model.code,
            percent_off_bps: model.percent_off_bps,
            amount_off_cents: model.amount_off_cents,
            expires_at: model.expires_at.map(Into::into),
            active: model.active,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ReviewNode {
    pub id: ID,
    pub customer_id: ID,
    pub service_order_id: Option<ID>,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<review::Model> for ReviewNode {
    fn from(model: review::Model) -> Self {
        Self {
            id: id(model.id),
            customer_id: id(model.customer_id),
            service_order_id: model.service_order_id.map(id),
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct InspectionNode {
    pub id: ID,
    pub appointment_id: ID,
    pub checklist: Vec<ChecklistEntry>,
    pub markers: Vec<DamageMarker>,
    pub check_in_notes: Option<String>,
    pub check_out_notes: Option<String>,
    pub check_in_signature_url: String,
    pub check_out_signature_url: Option<String>,
    pub checked_in_at: DateTime<Utc>,
    pub checked_out_at: Option<DateTime<Utc>>,
}

impl From<inspection::Model> for InspectionNode {
    fn from(model: inspection::Model) -> Self {
        Self {
            id: id(model.id),
            appointment_id: id(model.appointment_id),
            checklist: serde_json::from_value(model.checklist).unwrap_or_default(),
            markers: serde_json::from_value(model.markers).unwrap_or_default(),
            check_in_notes: model.check_in_notes,
            check_out_notes: model.check_out_notes,
            check_in_signature_url: model.check_in_signature_url,
            check_out_signature_url: model.check_out_signature_url,
            checked_in_at: model.checked_in_at.into(),
            checked_out_at: model.checked_out_at.map(Into::into),
        }
    }
}
