#![allow(dead_code)]

use std::sync::Arc;

use api::{
    auth::AuthConfig,
    functions::{FunctionError, FunctionInvoker, RemoteFunction},
    identity::{resolve_principal, DbRoleDirectory, Principal},
    reference::{ReferenceConfig, ReferenceDataClient},
    schema::{build_schema, AppSchema, ShopSchema, ShopServices},
    seed::{seed_demo_shop, SeededShop},
    storage::{MemoryObjectStorage, ObjectStorage},
};
use async_graphql::{Request, Response, Value as GqlValue, Variables};
use async_trait::async_trait;
use entity::account;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::{json, Value};
use tokio::sync::Mutex;

/// Echoes every call back and keeps a log of what was sent.
#[derive(Default)]
pub struct RecordingFunctions {
    pub calls: Mutex<Vec<(RemoteFunction, Value)>>,
}

#[async_trait]
impl FunctionInvoker for RecordingFunctions {
    async fn invoke(&self, function: RemoteFunction, payload: Value) -> Result<Value, FunctionError> {
        self.calls.lock().await.push((function, payload.clone()));
        Ok(json!({ "function": function.name(), "echo": payload }))
    }
}

pub struct TestShop {
    pub db: Arc<DatabaseConnection>,
    pub schema: ShopSchema,
    pub seeded: SeededShop,
    pub storage: Arc<MemoryObjectStorage>,
    pub functions: Arc<RecordingFunctions>,
}

impl TestShop {
    pub async fn new() -> Self {
        let conn = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&conn, None).await.unwrap();
        let seeded = seed_demo_shop(&conn).await.unwrap();
        let db = Arc::new(conn);
        let storage = Arc::new(MemoryObjectStorage::default());
        let functions = Arc::new(RecordingFunctions::default());
        let AppSchema(schema) = build_schema(ShopServices {
            db: db.clone(),
            auth: Arc::new(AuthConfig {
                jwt_secret: "integration-test-secret".into(),
                session_ttl_minutes: 60,
            }),
            storage: storage.clone() as Arc<dyn ObjectStorage>,
            functions: functions.clone() as Arc<dyn FunctionInvoker>,
            reference: Arc::new(ReferenceDataClient::new(ReferenceConfig::default()).unwrap()),
        });
        Self {
            db,
            schema,
            seeded,
            storage,
            functions,
        }
    }

    pub async fn principal(&self, email: &str) -> Principal {
        let record = account::Entity::find()
            .filter(account::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .unwrap()
            .unwrap();
        let directory = DbRoleDirectory::new(self.db.as_ref());
        resolve_principal(&directory, record.id).await.unwrap().unwrap()
    }

    pub async fn exec(&self, query: &str, variables: Value, principal: Option<&Principal>) -> Response {
        let mut request = Request::new(query).variables(Variables::from_json(variables));
        if let Some(principal) = principal {
            request = request.data(principal.clone());
        }
        self.schema.execute(request).await
    }

    /// Runs the operation and returns `data.shop`, failing on any error.
    pub async fn ok(&self, query: &str, variables: Value, principal: Option<&Principal>) -> Value {
        let resp = self.exec(query, variables, principal).await;
        assert!(resp.errors.is_empty(), "errors: {:?}", resp.errors);
        resp.data.into_json().unwrap()["shop"].clone()
    }
}

pub fn error_code(resp: &Response) -> Option<String> {
    resp.errors.first().and_then(|err| {
        match err.extensions.as_ref().and_then(|ext| ext.get("code")) {
            Some(GqlValue::String(code)) => Some(code.clone()),
            _ => None,
        }
    })
}

/// A 1x1 transparent PNG.
pub const SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";
