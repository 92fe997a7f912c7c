//! sea-orm entities for the detailing shop document store.
//!
//! Every business collection carries a `business_id` tenant key; isolation is
//! enforced by filtering on that column, never by the database itself.

pub mod account;
pub mod appointment;
pub mod business;
pub mod customer;
pub mod employee;
pub mod fiscal_rule;
pub mod inspection;
pub mod invoice_line;
pub mod payment_method;
pub mod product;
pub mod quote;
pub mod review;
pub mod service;
pub mod service_order;
pub mod stock_movement;
pub mod voucher;

use sea_orm::EntityTrait;

/// A collection whose rows belong to exactly one business.
pub trait TenantScoped: EntityTrait {
    fn tenant_column() -> Self::Column;
    fn id_column() -> Self::Column;
}

macro_rules! tenant_scoped {
    ($($module:ident),+ $(,)?) => {
        $(
            impl TenantScoped for $module::Entity {
                fn tenant_column() -> $module::Column {
                    $module::Column::BusinessId
                }

                fn id_column() -> $module::Column {
                    $module::Column::Id
                }
            }
        )+
    };
}

tenant_scoped!(
    appointment,
    customer,
    employee,
    fiscal_rule,
    inspection,
    invoice_line,
    payment_method,
    product,
    quote,
    review,
    service,
    service_order,
    stock_movement,
    voucher,
);
