mod common;

use api::{
    seed::{CUSTOMER_EMAIL, EMPLOYEE_EMAIL, OWNER_EMAIL},
    workflow::{self, StockMovementRequest},
};
use common::{error_code, TestShop};
use entity::{appointment, product, quote, stock_movement};
use platform_api::ApiError;
use sea_orm::EntityTrait;
use serde_json::json;

#[tokio::test]
async fn approving_a_quote_books_an_appointment() {
    let shop = TestShop::new().await;
    let owner = shop.principal(OWNER_EMAIL).await;
    let under_review = &shop.seeded.quotes[1];

    let data = shop
        .ok(
            r#"
            mutation Approve($id: ID!, $at: DateTime!, $employee: ID) {
                shop {
                    approveQuote(id: $id, scheduledAt: $at, employeeId: $employee) {
                        quote { id status }
                        appointment { id status quoteId employeeId vehicle }
                    }
                }
            }
            "#,
            json!({
                "id": under_review.id.to_string(),
                "at": "2026-11-04T09:30:00Z",
                "employee": shop.seeded.employee.id.to_string(),
            }),
            Some(&owner),
        )
        .await;
    let approval = &data["approveQuote"];
    assert_eq!(approval["quote"]["status"], "APPROVED");
    assert_eq!(approval["appointment"]["status"], "REQUESTED");
    assert_eq!(approval["appointment"]["quoteId"], under_review.id.to_string());
    assert_eq!(
        approval["appointment"]["employeeId"],
        shop.seeded.employee.id.to_string()
    );
    assert_eq!(approval["appointment"]["vehicle"], "Honda Civic 2019");

    let stored = quote::Entity::find_by_id(under_review.id)
        .one(shop.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, quote::Status::Approved);
}

#[tokio::test]
async fn closed_quotes_cannot_be_approved_again() {
    let shop = TestShop::new().await;
    let approved = &shop.seeded.quotes[2];
    let before = appointment::Entity::find().all(shop.db.as_ref()).await.unwrap().len();

    let err = workflow::approve_quote(
        shop.db.as_ref(),
        shop.seeded.business.id,
        approved.id,
        chrono::Utc::now().fixed_offset(),
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let after = appointment::Entity::find().all(shop.db.as_ref()).await.unwrap().len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn approved_appointment_opens_a_scheduled_order() {
    let shop = TestShop::new().await;
    let customer = shop.principal(CUSTOMER_EMAIL).await;
    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    let data = shop
        .ok(
            r#"
            mutation Book($input: AppointmentRequestInput!) {
                shop { requestAppointment(input: $input) { id } }
            }
            "#,
            json!({ "input": {
                "scheduledAt": "2026-11-05T10:00:00Z",
                "items": [{ "kind": "SERVICE", "itemId": shop.seeded.services[1].id.to_string() }],
            }}),
            Some(&customer),
        )
        .await;
    let appointment_id = data["requestAppointment"]["id"].as_str().unwrap().to_string();

    let approve = r#"
        mutation Approve($id: ID!) {
            shop {
                approveAppointment(id: $id) {
                    appointment { status }
                    serviceOrder { id status appointmentId }
                }
            }
        }
    "#;
    let data = shop
        .ok(approve, json!({ "id": appointment_id }), Some(&detailer))
        .await;
    let approval = &data["approveAppointment"];
    assert_eq!(approval["appointment"]["status"], "APPROVED");
    assert_eq!(approval["serviceOrder"]["status"], "SCHEDULED");
    assert_eq!(approval["serviceOrder"]["appointmentId"], appointment_id);

    let order_id = approval["serviceOrder"]["id"].as_str().unwrap().to_string();
    let board = shop
        .ok(
            "query { shop { serviceOrderBoard { columns { column cards { id } } } } }",
            json!({}),
            Some(&detailer),
        )
        .await;
    let scheduled = board["serviceOrderBoard"]["columns"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["column"] == "SCHEDULED")
        .cloned()
        .unwrap();
    assert!(scheduled["cards"]
        .as_array()
        .unwrap()
        .iter()
        .any(|card| card["id"] == order_id));

    let resp = shop
        .exec(approve, json!({ "id": appointment_id }), Some(&detailer))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("CONFLICT"));
}

#[tokio::test]
async fn customer_can_cancel_only_their_own_appointment() {
    let shop = TestShop::new().await;
    let customer = shop.principal(CUSTOMER_EMAIL).await;
    let data = shop
        .ok(
            r#"
            mutation Book($input: AppointmentRequestInput!) {
                shop { requestAppointment(input: $input) { id } }
            }
            "#,
            json!({ "input": {
                "scheduledAt": "2026-11-06T15:00:00Z",
                "items": [{ "kind": "SERVICE", "itemId": shop.seeded.services[0].id.to_string() }],
            }}),
            Some(&customer),
        )
        .await;
    let appointment_id = data["requestAppointment"]["id"].as_str().unwrap().to_string();
    let cancel = "mutation Cancel($id: ID!) { shop { cancelAppointment(id: $id) { status } } }";

    let data = shop
        .ok(cancel, json!({ "id": appointment_id }), Some(&customer))
        .await;
    assert_eq!(data["cancelAppointment"]["status"], "CANCELLED");

    let resp = shop
        .exec(cancel, json!({ "id": appointment_id }), Some(&customer))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("CONFLICT"));
}

#[tokio::test]
async fn unknown_catalog_items_are_rejected() {
    let shop = TestShop::new().await;
    let customer = shop.principal(CUSTOMER_EMAIL).await;
    let resp = shop
        .exec(
            r#"
            mutation Request($input: QuoteRequestInput!) {
                shop { requestQuote(input: $input) { id } }
            }
            "#,
            json!({ "input": {
                "description": "Orçamento de polimento",
                "items": [{ "kind": "SERVICE", "itemId": uuid::Uuid::new_v4().to_string() }],
            }}),
            Some(&customer),
        )
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));
}

#[tokio::test]
async fn stock_cannot_go_negative() {
    let shop = TestShop::new().await;
    let air_freshener = shop.seeded.product_named("Aromatizante").unwrap().clone();

    let err = workflow::record_stock_movement(
        shop.db.as_ref(),
        StockMovementRequest {
            business_id: shop.seeded.business.id,
            product_id: air_freshener.id,
            kind: stock_movement::Kind::Out,
            quantity: air_freshener.stock_quantity + 1,
            note: None,
            created_by: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let (movement, updated) = workflow::record_stock_movement(
        shop.db.as_ref(),
        StockMovementRequest {
            business_id: shop.seeded.business.id,
            product_id: air_freshener.id,
            kind: stock_movement::Kind::In,
            quantity: 10,
            note: Some("reposição".into()),
            created_by: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(movement.quantity, 10);
    assert_eq!(updated.stock_quantity, air_freshener.stock_quantity + 10);

    let stored = product::Entity::find_by_id(air_freshener.id)
        .one(shop.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.stock_quantity, air_freshener.stock_quantity + 10);
    let movements = stock_movement::Entity::find().all(shop.db.as_ref()).await.unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
async fn invoice_lines_are_priced_from_the_catalog() {
    let shop = TestShop::new().await;
    let owner = shop.principal(OWNER_EMAIL).await;
    let order = &shop.seeded.service_orders[2];
    let wax = shop.seeded.product_named("Cera de carnaúba").unwrap();

    let data = shop
        .ok(
            r#"
            mutation Add($order: ID!, $item: LineItemInput!) {
                shop {
                    addInvoiceLine(serviceOrderId: $order, item: $item, quantity: 3) {
                        description unitPriceCents totalCents
                    }
                }
            }
            "#,
            json!({
                "order": order.id.to_string(),
                "item": { "kind": "PRODUCT", "itemId": wax.id.to_string() },
            }),
            Some(&owner),
        )
        .await;
    let line = &data["addInvoiceLine"];
    assert_eq!(line["description"], "Cera de carnaúba");
    assert_eq!(line["unitPriceCents"], wax.price_cents);
    assert_eq!(line["totalCents"], wax.price_cents * 3);
}

#[tokio::test]
async fn vouchers_discount_the_subtotal() {
    let shop = TestShop::new().await;
    let customer = shop.principal(CUSTOMER_EMAIL).await;
    let query = r#"
        query Preview($code: String!, $subtotal: Int!) {
            shop {
                previewVoucher(code: $code, subtotalCents: $subtotal) {
                    code discountCents totalCents
                }
            }
        }
    "#;
    let data = shop
        .ok(query, json!({ "code": " bemvindo10 ", "subtotal": 20_000 }), Some(&customer))
        .await;
    let preview = &data["previewVoucher"];
    assert_eq!(preview["code"], "BEMVINDO10");
    assert_eq!(preview["discountCents"], 2_000);
    assert_eq!(preview["totalCents"], 18_000);

    let resp = shop
        .exec(query, json!({ "code": "NOPE", "subtotal": 100 }), Some(&customer))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("NOT_FOUND"));
}

#[tokio::test]
async fn voucher_preview_handles_the_largest_subtotal() {
    let shop = TestShop::new().await;
    let customer = shop.principal(CUSTOMER_EMAIL).await;
    let data = shop
        .ok(
            r#"
            query Preview($subtotal: Int!) {
                shop {
                    previewVoucher(code: "BEMVINDO10", subtotalCents: $subtotal) {
                        subtotalCents discountCents totalCents
                    }
                }
            }
            "#,
            json!({ "subtotal": i64::MAX }),
            Some(&customer),
        )
        .await;
    let preview = &data["previewVoucher"];
    assert_eq!(preview["subtotalCents"], i64::MAX);
    assert_eq!(preview["discountCents"], i64::MAX / 10);
    assert_eq!(preview["totalCents"], i64::MAX - i64::MAX / 10);
}

#[tokio::test]
async fn reviews_need_a_valid_rating() {
    let shop = TestShop::new().await;
    let customer = shop.principal(CUSTOMER_EMAIL).await;
    let finished = &shop.seeded.service_orders[4];
    let submit = r#"
        mutation Review($rating: Int!, $order: ID) {
            shop { submitReview(rating: $rating, serviceOrderId: $order, comment: "Ficou impecável") { rating } }
        }
    "#;

    let resp = shop
        .exec(submit, json!({ "rating": 6, "order": finished.id.to_string() }), Some(&customer))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));

    let data = shop
        .ok(submit, json!({ "rating": 5, "order": finished.id.to_string() }), Some(&customer))
        .await;
    assert_eq!(data["submitReview"]["rating"], 5);
}
