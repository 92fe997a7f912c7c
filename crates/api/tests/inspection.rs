mod common;

use api::{
    inspection::{record_phase, InspectionError, Phase, PhaseRecord},
    seed::{CUSTOMER_EMAIL, EMPLOYEE_EMAIL, OWNER_EMAIL},
};
use common::{error_code, TestShop, SIGNATURE};
use serde_json::{json, Value};
use uuid::Uuid;

const INSPECTION: &str = r#"
    query Inspection($id: ID!, $checkOut: Boolean!) {
        shop {
            inspection(appointmentId: $id, checkOutRequested: $checkOut) {
                mode
                defaultChecklist { key }
                inspection {
                    checkInSignatureUrl
                    checkOutSignatureUrl
                    checkedOutAt
                    checklist { key checkIn checkOut note }
                    markers { xPct yPct label phase }
                }
            }
        }
    }
"#;

const CHECK_IN: &str = r#"
    mutation CheckIn($input: InspectionPhaseInput!) {
        shop { checkIn(input: $input) { checkInSignatureUrl markers { phase } } }
    }
"#;

const CHECK_OUT: &str = r#"
    mutation CheckOut($input: InspectionPhaseInput!) {
        shop { checkOut(input: $input) { checkOutSignatureUrl checkedOutAt markers { phase } } }
    }
"#;

async fn book_appointment(shop: &TestShop) -> String {
    let customer = shop.principal(CUSTOMER_EMAIL).await;
    let wash = shop.seeded.services[0].id;
    let data = shop
        .ok(
            r#"
            mutation Book($input: AppointmentRequestInput!) {
                shop { requestAppointment(input: $input) { id status } }
            }
            "#,
            json!({ "input": {
                "scheduledAt": "2026-11-03T12:00:00Z",
                "vehicle": "Toyota Corolla prata",
                "items": [{ "kind": "SERVICE", "itemId": wash.to_string() }],
            }}),
            Some(&customer),
        )
        .await;
    assert_eq!(data["requestAppointment"]["status"], "REQUESTED");
    data["requestAppointment"]["id"].as_str().unwrap().to_string()
}

fn phase_input(appointment_id: &str, signature: &str, markers: Value) -> Value {
    json!({ "input": {
        "appointmentId": appointment_id,
        "signature": signature,
        "checklist": [
            { "key": "paint", "condition": "DAMAGED", "note": "risco na porta traseira" },
            { "key": "tires", "condition": "OK" },
        ],
        "markers": markers,
        "notes": "cliente ciente do risco",
    }})
}

#[tokio::test]
async fn check_in_then_check_out() {
    let shop = TestShop::new().await;
    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    let appointment_id = book_appointment(&shop).await;

    let data = shop
        .ok(INSPECTION, json!({ "id": appointment_id, "checkOut": false }), Some(&detailer))
        .await;
    assert_eq!(data["inspection"]["mode"], "CHECK_IN");
    assert!(data["inspection"]["inspection"].is_null());
    assert_eq!(data["inspection"]["defaultChecklist"].as_array().unwrap().len(), 10);

    let data = shop
        .ok(
            CHECK_IN,
            phase_input(
                &appointment_id,
                SIGNATURE,
                json!([{ "xPct": 25.0, "yPct": 40.5, "label": "risco" }]),
            ),
            Some(&detailer),
        )
        .await;
    let key = format!("inspections/{appointment_id}/check-in-signature.png");
    assert_eq!(data["checkIn"]["checkInSignatureUrl"], format!("memory://{key}"));
    let stored = shop.storage.get(&key).await.unwrap();
    assert_eq!(stored.content_type, "image/png");
    assert!(stored.bytes.starts_with(&[0x89, b'P', b'N', b'G']));

    let data = shop
        .ok(INSPECTION, json!({ "id": appointment_id, "checkOut": false }), Some(&detailer))
        .await;
    assert_eq!(data["inspection"]["mode"], "VIEW_ONLY");
    let data = shop
        .ok(INSPECTION, json!({ "id": appointment_id, "checkOut": true }), Some(&detailer))
        .await;
    assert_eq!(data["inspection"]["mode"], "CHECK_OUT");

    let data = shop
        .ok(
            CHECK_OUT,
            json!({ "input": {
                "appointmentId": appointment_id,
                "signature": SIGNATURE,
                "checklist": [{ "key": "paint", "condition": "DAMAGED" }],
                "markers": [{ "xPct": 80.0, "yPct": 10.0 }],
            }}),
            Some(&detailer),
        )
        .await;
    assert!(data["checkOut"]["checkedOutAt"].is_string());
    let phases: Vec<&str> = data["checkOut"]["markers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["phase"].as_str().unwrap())
        .collect();
    assert_eq!(phases, vec!["CHECK_IN", "CHECK_OUT"]);
    assert_eq!(shop.storage.len().await, 2);

    let data = shop
        .ok(INSPECTION, json!({ "id": appointment_id, "checkOut": true }), Some(&detailer))
        .await;
    let view = &data["inspection"];
    assert_eq!(view["mode"], "VIEW_ONLY");
    let paint = view["inspection"]["checklist"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["key"] == "paint")
        .cloned()
        .unwrap();
    assert_eq!(paint["checkIn"], "DAMAGED");
    assert_eq!(paint["checkOut"], "DAMAGED");
    assert_eq!(paint["note"], "risco na porta traseira");
}

#[tokio::test]
async fn missing_signature_blocks_the_save() {
    let shop = TestShop::new().await;
    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    let appointment_id = book_appointment(&shop).await;

    let resp = shop
        .exec(CHECK_IN, phase_input(&appointment_id, "  ", json!([])), Some(&detailer))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));
    assert_eq!(shop.storage.len().await, 0);

    let data = shop
        .ok(INSPECTION, json!({ "id": appointment_id, "checkOut": false }), Some(&detailer))
        .await;
    assert_eq!(data["inspection"]["mode"], "CHECK_IN");
}

#[tokio::test]
async fn non_png_signature_is_rejected_before_upload() {
    let shop = TestShop::new().await;
    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    let appointment_id = book_appointment(&shop).await;

    let resp = shop
        .exec(
            CHECK_IN,
            phase_input(&appointment_id, "data:image/jpeg;base64,/9j/4AAQ", json!([])),
            Some(&detailer),
        )
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));
    assert_eq!(shop.storage.len().await, 0);

    let data = shop
        .ok(INSPECTION, json!({ "id": appointment_id, "checkOut": false }), Some(&detailer))
        .await;
    assert_eq!(data["inspection"]["mode"], "CHECK_IN");
}

#[tokio::test]
async fn out_of_range_markers_are_rejected() {
    let shop = TestShop::new().await;
    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    let appointment_id = book_appointment(&shop).await;

    let resp = shop
        .exec(
            CHECK_IN,
            phase_input(&appointment_id, SIGNATURE, json!([{ "xPct": 120.0, "yPct": 5.0 }])),
            Some(&detailer),
        )
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("VALIDATION"));
    assert_eq!(shop.storage.len().await, 0);
}

#[tokio::test]
async fn phases_must_happen_in_order() {
    let shop = TestShop::new().await;
    let owner = shop.principal(OWNER_EMAIL).await;
    let appointment_id = book_appointment(&shop).await;

    let resp = shop
        .exec(CHECK_OUT, phase_input(&appointment_id, SIGNATURE, json!([])), Some(&owner))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("CONFLICT"));

    shop.ok(CHECK_IN, phase_input(&appointment_id, SIGNATURE, json!([])), Some(&owner))
        .await;
    let resp = shop
        .exec(CHECK_IN, phase_input(&appointment_id, SIGNATURE, json!([])), Some(&owner))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("CONFLICT"));

    shop.ok(CHECK_OUT, phase_input(&appointment_id, SIGNATURE, json!([])), Some(&owner))
        .await;
    let resp = shop
        .exec(CHECK_OUT, phase_input(&appointment_id, SIGNATURE, json!([])), Some(&owner))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("CONFLICT"));
}

#[tokio::test]
async fn unknown_appointment_and_foreign_tenant_are_not_found() {
    let shop = TestShop::new().await;
    let appointment_id = book_appointment(&shop).await;

    let err = record_phase(
        shop.db.as_ref(),
        shop.storage.as_ref(),
        Phase::CheckIn,
        PhaseRecord {
            business_id: Uuid::new_v4(),
            appointment_id: appointment_id.parse().unwrap(),
            signature_data_url: SIGNATURE.into(),
            checklist: Vec::new(),
            markers: Vec::new(),
            notes: None,
            recorded_by: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, InspectionError::AppointmentNotFound));
    assert_eq!(shop.storage.len().await, 0);
}

#[tokio::test]
async fn customers_cannot_inspect() {
    let shop = TestShop::new().await;
    let customer = shop.principal(CUSTOMER_EMAIL).await;
    let appointment_id = book_appointment(&shop).await;
    let resp = shop
        .exec(CHECK_IN, phase_input(&appointment_id, SIGNATURE, json!([])), Some(&customer))
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("FORBIDDEN"));
}
