//! Demo tenant used by `autodetail-server seed` and the integration tests.

use chrono::{Duration, Utc};
use entity::{
    business, customer, employee, fiscal_rule, payment_method, product, quote, service,
    service_order, voucher,
};
use sea_orm::{
    prelude::DateTimeWithTimeZone, ActiveModelTrait, ActiveValue::Set, ColumnTrait,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, TransactionTrait,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{self, AuthError},
    catalog::{encode_items, ItemKind, LineItemRef},
};

pub const OWNER_EMAIL: &str = "owner@autodetail.test";
pub const EMPLOYEE_EMAIL: &str = "detailer@autodetail.test";
pub const CUSTOMER_EMAIL: &str = "customer@autodetail.test";
pub const DEMO_PASSWORD: &str = "detail123";

#[derive(Debug, Clone)]
pub struct SeededShop {
    pub business: business::Model,
    pub employee: employee::Model,
    pub customer: customer::Model,
    pub services: Vec<service::Model>,
    pub products: Vec<product::Model>,
    pub service_orders: Vec<service_order::Model>,
    pub quotes: Vec<quote::Model>,
}

impl SeededShop {
    pub fn service_named(&self, name: &str) -> Option<&service::Model> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn product_named(&self, name: &str) -> Option<&product::Model> {
        self.products.iter().find(|p| p.name == name)
    }
}

fn to_db(err: AuthError) -> DbErr {
    match err {
        AuthError::Db(err) => err,
        other => DbErr::Custom(other.to_string()),
    }
}

/// Fails when the demo owner account already exists.
pub async fn seed_demo_shop(db: &DatabaseConnection) -> Result<SeededShop, DbErr> {
    let existing = entity::account::Entity::find()
        .filter(entity::account::Column::Email.eq(OWNER_EMAIL))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(DbErr::Custom("demo shop already seeded".into()));
    }

    let txn = db.begin().await?;
    let now: DateTimeWithTimeZone = Utc::now().into();

    let owner = auth::create_account(&txn, OWNER_EMAIL, DEMO_PASSWORD)
        .await
        .map_err(to_db)?;
    let shop = business::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_account_id: Set(owner.id),
        name: Set("Brilho Total Estética Automotiva".into()),
        tax_id: Set(Some("12345678000195".into())),
        phone: Set(Some("+55 11 4000-1234".into())),
        postal_code: Set(Some("01310100".into())),
        address: Set(Some("Avenida Paulista, 1000 - São Paulo/SP".into())),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let staff_account = auth::create_account(&txn, EMPLOYEE_EMAIL, DEMO_PASSWORD)
        .await
        .map_err(to_db)?;
    let staff = employee::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(staff_account.id),
        business_id: Set(shop.id),
        name: Set("Lia Detailer".into()),
        permissions: Set(json!(["agenda", "orders", "inspections"])),
        commission_bps: Set(1_000),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let client_account = auth::create_account(&txn, CUSTOMER_EMAIL, DEMO_PASSWORD)
        .await
        .map_err(to_db)?;
    let client = customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(Some(client_account.id)),
        business_id: Set(shop.id),
        name: Set("Rafael Souza".into()),
        email: Set(Some(CUSTOMER_EMAIL.into())),
        phone: Set(Some("+55 11 98888-7777".into())),
        tax_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let mut services = Vec::new();
    for (name, price, minutes) in [
        ("Lavagem detalhada", 12_000_i64, 90),
        ("Polimento técnico", 45_000, 240),
        ("Vitrificação de pintura", 120_000, 480),
        ("Higienização interna", 25_000, 180),
    ] {
        let record = service::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(shop.id),
            name: Set(name.into()),
            description: Set(None),
            price_cents: Set(price),
            duration_minutes: Set(minutes),
            image_url: Set(None),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        services.push(record);
    }

    let mut products = Vec::new();
    for (name, sku, price, cost, stock) in [
        ("Cera de carnaúba", "WAX-001", 8_900_i64, 4_200_i64, 12),
        ("Aromatizante", "AROMA-01", 1_500, 600, 3),
    ] {
        let record = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(shop.id),
            name: Set(name.into()),
            sku: Set(Some(sku.into())),
            price_cents: Set(price),
            cost_cents: Set(cost),
            stock_quantity: Set(stock),
            min_stock: Set(5),
            image_url: Set(None),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        products.push(record);
    }

    let wash = LineItemRef {
        kind: ItemKind::Service,
        item_id: services[0].id,
    };
    let polish = LineItemRef {
        kind: ItemKind::Service,
        item_id: services[1].id,
    };

    let mut service_orders = Vec::new();
    for (offset, status) in [
        (0, service_order::Status::Scheduled),
        (1, service_order::Status::Scheduled),
        (2, service_order::Status::InProgress),
        (3, service_order::Status::AwaitingParts),
        (4, service_order::Status::Completed),
    ] {
        let created = now + Duration::seconds(offset);
        let record = service_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(shop.id),
            customer_id: Set(client.id),
            employee_id: Set(Some(staff.id)),
            appointment_id: Set(None),
            items: Set(encode_items(&[wash, polish])),
            status: Set(status),
            started_at: Set(None),
            finished_at: Set(status.is_terminal().then_some(created)),
            created_at: Set(created),
            updated_at: Set(created),
        }
        .insert(&txn)
        .await?;
        service_orders.push(record);
    }

    let mut quotes = Vec::new();
    for (offset, status, description) in [
        (0, quote::Status::Requested, "Polimento antes da venda do carro"),
        (1, quote::Status::UnderReview, "Vitrificação completa"),
        (2, quote::Status::Approved, "Lavagem mensal"),
    ] {
        let created = now + Duration::seconds(offset);
        let record = quote::ActiveModel {
            id: Set(Uuid::new_v4()),
            business_id: Set(shop.id),
            customer_id: Set(client.id),
            description: Set(description.into()),
            vehicle: Set(Some("Honda Civic 2019".into())),
            items: Set(encode_items(&[polish])),
            total_cents: Set(services[1].price_cents),
            status: Set(status),
            created_at: Set(created),
            updated_at: Set(created),
        }
        .insert(&txn)
        .await?;
        quotes.push(record);
    }

    voucher::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(shop.id),
        code: Set("BEMVINDO10".into()),
        percent_off_bps: Set(Some(1_000)),
        amount_off_cents: Set(None),
        expires_at: Set(None),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    payment_method::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(shop.id),
        name: Set("Pix".into()),
        fee_bps: Set(0),
        settlement_days: Set(0),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    fiscal_rule::ActiveModel {
        id: Set(Uuid::new_v4()),
        business_id: Set(shop.id),
        name: Set("ISS serviços".into()),
        ncm: Set(None),
        tax_code: Set("ISS".into()),
        rate_bps: Set(500),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    tracing::info!(business_id = %shop.id, "demo shop seeded");

    Ok(SeededShop {
        business: shop,
        employee: staff,
        customer: client,
        services,
        products,
        service_orders,
        quotes,
    })
}
