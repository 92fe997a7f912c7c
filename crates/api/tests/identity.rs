mod common;

use api::{
    auth,
    identity::{
        resolve_principal, AuthEvent, DbRoleDirectory, Permission, Role, SessionState,
        SessionTracker, Transition,
    },
    seed::{CUSTOMER_EMAIL, DEMO_PASSWORD, EMPLOYEE_EMAIL, OWNER_EMAIL},
};
use chrono::Utc;
use common::{error_code, TestShop};
use entity::employee;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde_json::json;
use uuid::Uuid;

const SIGN_IN: &str = r#"
    mutation SignIn($email: String!, $password: String!) {
        shop {
            signIn(email: $email, password: $password) {
                ok
                errorCode
                error
                token
                viewer { role permissions }
            }
        }
    }
"#;

#[tokio::test]
async fn seeded_accounts_resolve_to_their_roles() {
    let shop = TestShop::new().await;

    let owner = shop.principal(OWNER_EMAIL).await;
    assert_eq!(owner.role, Role::Business);
    assert_eq!(owner.business_id, shop.seeded.business.id);
    assert!(Permission::ALL.iter().all(|p| owner.can(*p)));

    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    assert_eq!(detailer.role, Role::Employee);
    assert_eq!(detailer.employee_id, Some(shop.seeded.employee.id));
    assert!(detailer.can(Permission::Orders));
    assert!(!detailer.can(Permission::Finance));

    let customer = shop.principal(CUSTOMER_EMAIL).await;
    assert_eq!(customer.role, Role::Customer);
    assert_eq!(customer.customer_id, Some(shop.seeded.customer.id));
}

#[tokio::test]
async fn employee_record_outranks_customer_record() {
    let shop = TestShop::new().await;
    let customer = shop.principal(CUSTOMER_EMAIL).await;
    let now = Utc::now().into();
    employee::ActiveModel {
        id: Set(Uuid::new_v4()),
        account_id: Set(customer.account_id),
        business_id: Set(shop.seeded.business.id),
        name: Set("Rafael Souza".into()),
        permissions: Set(json!(["stock"])),
        commission_bps: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(shop.db.as_ref())
    .await
    .unwrap();

    let principal = shop.principal(CUSTOMER_EMAIL).await;
    assert_eq!(principal.role, Role::Employee);
    assert!(principal.can(Permission::Stock));
    assert_eq!(principal.customer_id, None);
}

#[tokio::test]
async fn account_without_profile_is_signed_out() {
    let shop = TestShop::new().await;
    let orphan = auth::create_account(shop.db.as_ref(), "orphan@autodetail.test", DEMO_PASSWORD)
        .await
        .unwrap();

    let directory = DbRoleDirectory::new(shop.db.as_ref());
    assert!(resolve_principal(&directory, orphan.id).await.unwrap().is_none());

    let mut tracker = SessionTracker::default();
    let transition = tracker
        .observe(&directory, AuthEvent::SignedIn { account_id: orphan.id })
        .await
        .unwrap();
    assert_eq!(transition, Transition::ForcedSignOut);
    assert!(matches!(tracker.state(), SessionState::Unauthenticated));

    let resp = shop
        .exec(
            SIGN_IN,
            json!({ "email": "orphan@autodetail.test", "password": DEMO_PASSWORD }),
            None,
        )
        .await;
    assert!(resp.errors.is_empty(), "errors: {:?}", resp.errors);
    let cookie = resp
        .http_headers
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.contains("Max-Age=0"), "cookie: {cookie}");
    let data = resp.data.into_json().unwrap();
    let payload = &data["shop"]["signIn"];
    assert_eq!(payload["ok"], false);
    assert_eq!(payload["errorCode"], "auth/no-profile");
    assert!(payload["token"].is_null());
}

#[tokio::test]
async fn sign_in_issues_a_session_cookie() {
    let shop = TestShop::new().await;
    let resp = shop
        .exec(
            SIGN_IN,
            json!({ "email": " Owner@AutoDetail.test ", "password": DEMO_PASSWORD }),
            None,
        )
        .await;
    assert!(resp.errors.is_empty(), "errors: {:?}", resp.errors);
    let cookie = resp
        .http_headers
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("shop_session="), "cookie: {cookie}");
    assert!(cookie.contains("HttpOnly"));

    let data = resp.data.into_json().unwrap();
    let payload = &data["shop"]["signIn"];
    assert_eq!(payload["ok"], true);
    assert_eq!(payload["viewer"]["role"], "BUSINESS");
    assert_eq!(payload["viewer"]["permissions"], json!(["*"]));
    assert!(payload["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn bad_credentials_come_back_localized() {
    let shop = TestShop::new().await;
    let data = shop
        .ok(
            SIGN_IN,
            json!({ "email": OWNER_EMAIL, "password": "wrong-password" }),
            None,
        )
        .await;
    let payload = &data["signIn"];
    assert_eq!(payload["ok"], false);
    assert_eq!(payload["errorCode"], "auth/invalid-credential");
    assert!(payload["error"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn customer_sign_up_rejects_duplicates_and_weak_passwords() {
    let shop = TestShop::new().await;
    let query = r#"
        mutation SignUp($input: CustomerSignUpInput!) {
            shop { signUpCustomer(input: $input) { ok errorCode viewer { role customerId } } }
        }
    "#;
    let input = |email: &str, password: &str| {
        json!({ "input": {
            "businessId": shop.seeded.business.id.to_string(),
            "email": email,
            "password": password,
            "name": "Carla Mendes",
        }})
    };

    let data = shop.ok(query, input("carla@example.com", "abc"), None).await;
    assert_eq!(data["signUpCustomer"]["errorCode"], "auth/weak-password");

    let data = shop.ok(query, input(CUSTOMER_EMAIL, "secret123"), None).await;
    assert_eq!(data["signUpCustomer"]["errorCode"], "auth/email-already-in-use");

    let data = shop.ok(query, input("carla@example.com", "secret123"), None).await;
    assert_eq!(data["signUpCustomer"]["ok"], true);
    assert_eq!(data["signUpCustomer"]["viewer"]["role"], "CUSTOMER");
}

#[tokio::test]
async fn me_requires_a_session() {
    let shop = TestShop::new().await;
    let resp = shop
        .exec("query { shop { me { role } } }", json!({}), None)
        .await;
    assert_eq!(error_code(&resp).as_deref(), Some("UNAUTHENTICATED"));

    let detailer = shop.principal(EMPLOYEE_EMAIL).await;
    let data = shop
        .ok("query { shop { me { role permissions } } }", json!({}), Some(&detailer))
        .await;
    assert_eq!(data["me"]["role"], "EMPLOYEE");
    assert_eq!(
        data["me"]["permissions"],
        json!(["agenda", "orders", "inspections"])
    );
}
