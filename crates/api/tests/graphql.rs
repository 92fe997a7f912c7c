mod common;

use api::{
    functions::RemoteFunction,
    seed::{CUSTOMER_EMAIL, DEMO_PASSWORD, EMPLOYEE_EMAIL, OWNER_EMAIL},
};
use common::{error_code, TestShop, SIGNATURE};
use serde_json::json;

#[tokio::test]
async fn storefront_is_public_and_catalog_is_not() {
    let shop = TestShop::new().await;
    let data = shop
        .ok(
            "query Store($id: ID!) { shop { storefrontServices(businessId: $id) { name priceCents } } }",
            json!({ "id": shop.seeded.business.id.to_string() }),
            None,
        )
        .await;
    let names: Vec<&str> = data["storefrontServices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 4);
    assert!(names.contains(&"Polimento técnico"));

    let resp = shop
        .exec("query { shop { products { name } } }", json!({}), None)
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("UNAUTHENTICATED"));

    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    let resp = shop
        .exec("query { shop { products { name } } }", json!({}), Some(&detailer))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("FORBIDDEN"));
}

#[tokio::test]
async fn low_stock_filter_uses_the_minimum() {
    let shop = TestShop::new().await;
    let owner = shop.principal(OWNER_EMAIL).await;
    let data = shop
        .ok(
            "query { shop { products(lowStockOnly: true) { name lowStock } } }",
            json!({}),
            Some(&owner),
        )
        .await;
    assert_eq!(
        data["products"],
        json!([{ "name": "Aromatizante", "lowStock": true }])
    );
}

#[tokio::test]
async fn service_image_upload_lands_in_object_storage() {
    let shop = TestShop::new().await;
    let owner = shop.principal(OWNER_EMAIL).await;
    let wash = &shop.seeded.services[0];
    let data = shop
        .ok(
            r#"
            mutation Upload($id: ID!, $image: String!) {
                shop { uploadServiceImage(id: $id, dataUrl: $image) { imageUrl } }
            }
            "#,
            json!({ "id": wash.id.to_string(), "image": SIGNATURE }),
            Some(&owner),
        )
        .await;
    let key = format!("services/{}/image.png", wash.id);
    assert_eq!(data["uploadServiceImage"]["imageUrl"], format!("memory://{key}"));
    assert!(shop.storage.get(&key).await.is_some());
}

#[tokio::test]
async fn owner_manages_employees_and_their_permissions() {
    let shop = TestShop::new().await;
    let owner = shop.principal(OWNER_EMAIL).await;
    let data = shop
        .ok(
            r#"
            mutation Hire($input: NewEmployeeInput!) {
                shop { createEmployee(input: $input) { id name permissions } }
            }
            "#,
            json!({ "input": {
                "name": "Bruno Estoquista",
                "email": "bruno@autodetail.test",
                "password": DEMO_PASSWORD,
                "permissions": ["STOCK", "CATALOG"],
            }}),
            Some(&owner),
        )
        .await;
    assert_eq!(data["createEmployee"]["name"], "Bruno Estoquista");

    let bruno = shop.principal("bruno@autodetail.test").await;
    let data = shop
        .ok("query { shop { products { name } } }", json!({}), Some(&bruno))
        .await;
    assert_eq!(data["products"].as_array().unwrap().len(), 2);

    let resp = shop
        .exec("query { shop { fiscalRules { name } } }", json!({}), Some(&bruno))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("FORBIDDEN"));

    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    let resp = shop
        .exec("query { shop { employees { name } } }", json!({}), Some(&detailer))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("FORBIDDEN"));
}

#[tokio::test]
async fn voucher_codes_are_unique_per_shop() {
    let shop = TestShop::new().await;
    let owner = shop.principal(OWNER_EMAIL).await;
    let create = r#"
        mutation Create($input: VoucherInput!) {
            shop { createVoucher(input: $input) { code percentOffBps amountOffCents } }
        }
    "#;

    let data = shop
        .ok(create, json!({ "input": { "code": " lavagem5 ", "amountOffCents": 500 } }), Some(&owner))
        .await;
    assert_eq!(data["createVoucher"]["code"], "LAVAGEM5");
    assert_eq!(data["createVoucher"]["amountOffCents"], 500);

    let resp = shop
        .exec(create, json!({ "input": { "code": "bemvindo10", "percentOffBps": 500 } }), Some(&owner))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("CONFLICT"));

    let resp = shop
        .exec(create, json!({ "input": { "code": "VAZIO" } }), Some(&owner))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));

    let resp = shop
        .exec(create, json!({ "input": { "code": "DEMAIS", "percentOffBps": 20_000 } }), Some(&owner))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));
}

#[tokio::test]
async fn fiscal_rules_and_payment_methods_round_out_the_back_office() {
    let shop = TestShop::new().await;
    let owner = shop.principal(OWNER_EMAIL).await;
    let data = shop
        .ok(
            r#"
            mutation {
                shop {
                    createFiscalRule(input: { name: "ICMS produtos", ncm: "3405.30.00", taxCode: "ICMS", rateBps: 1800 }) { id rateBps }
                    createPaymentMethod(input: { name: "Cartão de crédito", feeBps: 350, settlementDays: 30 }) { id feeBps }
                }
            }
            "#,
            json!({}),
            Some(&owner),
        )
        .await;
    assert_eq!(data["createFiscalRule"]["rateBps"], 1800);
    assert_eq!(data["createPaymentMethod"]["feeBps"], 350);

    let data = shop
        .ok(
            "query { shop { fiscalRules { taxCode } paymentMethods { name } } }",
            json!({}),
            Some(&owner),
        )
        .await;
    assert_eq!(data["fiscalRules"].as_array().unwrap().len(), 2);
    assert_eq!(
        data["paymentMethods"],
        json!([{ "name": "Cartão de crédito" }, { "name": "Pix" }])
    );

    let id = shop
        .ok("query { shop { paymentMethods { id name } } }", json!({}), Some(&owner))
        .await["paymentMethods"][1]["id"]
        .clone();
    let data = shop
        .ok(
            "mutation Remove($id: ID!) { shop { deletePaymentMethod(id: $id) } }",
            json!({ "id": id }),
            Some(&owner),
        )
        .await;
    assert_eq!(data["deletePaymentMethod"], true);
    let resp = shop
        .exec(
            "mutation Remove($id: ID!) { shop { deletePaymentMethod(id: $id) } }",
            json!({ "id": id }),
            Some(&owner),
        )
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("NOT_FOUND"));
}

#[tokio::test]
async fn reports_run_remotely_with_the_tenant_injected() {
    let shop = TestShop::new().await;
    let owner = shop.principal(OWNER_EMAIL).await;
    let data = shop
        .ok(
            r#"
            query Report($payload: JSON) {
                shop { runReport(function: CASH_FLOW, payload: $payload) }
            }
            "#,
            json!({ "payload": { "month": "2026-10", "businessId": "someone-else" } }),
            Some(&owner),
        )
        .await;
    let echo = &data["runReport"]["echo"];
    assert_eq!(data["runReport"]["function"], "cashFlow");
    assert_eq!(echo["month"], "2026-10");
    assert_eq!(echo["businessId"], shop.seeded.business.id.to_string());

    let calls = shop.functions.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, RemoteFunction::CashFlow);
}

#[tokio::test]
async fn report_permissions_follow_the_function() {
    let shop = TestShop::new().await;
    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    let customer = shop.principal(CUSTOMER_EMAIL).await;

    let resp = shop
        .exec("query { shop { runReport(function: ABC_CURVE) } }", json!({}), Some(&detailer))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("FORBIDDEN"));
    let resp = shop
        .exec(
            "mutation { shop { generateMarketingCopy(payload: { service: \"Vitrificação\" }) } }",
            json!({}),
            Some(&customer),
        )
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("FORBIDDEN"));

    let resp = shop
        .exec(
            "query { shop { runReport(function: CASH_FLOW, payload: [1, 2]) } }",
            json!({}),
            Some(&shop.principal(OWNER_EMAIL).await),
        )
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));
    assert!(shop.functions.calls.lock().await.is_empty());
}

#[tokio::test]
async fn reference_lookups_validate_before_calling_out() {
    let shop = TestShop::new().await;
    let resp = shop
        .exec(
            "query { shop { lookupPostalCode(postalCode: \"123\") { city } } }",
            json!({}),
            None,
        )
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));

    let resp = shop
        .exec(
            "query { shop { vehicleModels(make: \"../etc\") { name } } }",
            json!({}),
            None,
        )
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));
}
