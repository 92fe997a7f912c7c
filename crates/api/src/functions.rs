//! Named procedures on the remote function-execution tier.
//!
//! Financial aggregation, inventory audit and text generation all run
//! remotely; this side only builds the payload and unwraps the reply.

use std::time::Duration;

use async_graphql::Enum;
use async_trait::async_trait;
use platform_api::ApiError;
use serde_json::{json, Map, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::identity::Permission;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum RemoteFunction {
    #[graphql(name = "CASH_FLOW")]
    CashFlow,
    #[graphql(name = "INCOME_STATEMENT")]
    IncomeStatement,
    #[graphql(name = "ABC_CURVE")]
    AbcCurve,
    #[graphql(name = "COMMISSION_REPORT")]
    CommissionReport,
    #[graphql(name = "STOCK_AUDIT")]
    StockAudit,
    #[graphql(name = "GENERATE_MARKETING_COPY")]
    GenerateMarketingCopy,
}

impl RemoteFunction {
    pub fn name(self) -> &'static str {
        match self {
            RemoteFunction::CashFlow => "cashFlow",
            RemoteFunction::IncomeStatement => "incomeStatement",
            RemoteFunction::AbcCurve => "abcCurve",
            RemoteFunction::CommissionReport => "commissionReport",
            RemoteFunction::StockAudit => "stockAudit",
            RemoteFunction::GenerateMarketingCopy => "generateMarketingCopy",
        }
    }

    /// Back-office area a caller needs to run this procedure.
    pub fn permission(self) -> Permission {
        match self {
            RemoteFunction::CashFlow | RemoteFunction::IncomeStatement => Permission::Finance,
            RemoteFunction::AbcCurve | RemoteFunction::CommissionReport => Permission::Reports,
            RemoteFunction::StockAudit => Permission::Stock,
            RemoteFunction::GenerateMarketingCopy => Permission::Marketing,
        }
    }
}

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("function tier is not configured")]
    NotConfigured,
    #[error("payload must be a JSON object")]
    InvalidPayload,
    #[error("{function} failed: {message}")]
    Remote {
        function: &'static str,
        message: String,
    },
    #[error("{function} returned an unexpected reply")]
    MalformedReply { function: &'static str },
    #[error("function call failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid function url: {0}")]
    Url(#[from] url::ParseError),
}

impl From<FunctionError> for ApiError {
    fn from(err: FunctionError) -> Self {
        match err {
            FunctionError::InvalidPayload => ApiError::validation(err.to_string()),
            FunctionError::NotConfigured | FunctionError::Url(_) => {
                ApiError::internal(anyhow::Error::new(err))
            }
            _ => ApiError::Upstream(err.to_string()),
        }
    }
}

#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, function: RemoteFunction, payload: Value) -> Result<Value, FunctionError>;
}

/// The tenant id always goes into the payload, overriding any caller value.
pub fn scoped_payload(business_id: Uuid, payload: Option<Value>) -> Result<Value, FunctionError> {
    let mut object = match payload {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(FunctionError::InvalidPayload),
    };
    object.insert("businessId".into(), Value::String(business_id.to_string()));
    Ok(Value::Object(object))
}

/// `{"result": ..}` on success, `{"error": {"message": ..}}` on failure.
pub fn unwrap_callable_response(
    function: RemoteFunction,
    body: Value,
) -> Result<Value, FunctionError> {
    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(FunctionError::Remote {
            function: function.name(),
            message,
        });
    }
    match body {
        Value::Object(mut map) if map.contains_key("result") => {
            Ok(map.remove("result").unwrap_or(Value::Null))
        }
        _ => Err(FunctionError::MalformedReply {
            function: function.name(),
        }),
    }
}

#[derive(Clone, Debug)]
pub struct FunctionsConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

pub struct HttpFunctionClient {
    client: reqwest::Client,
    base_url: Option<Url>,
    api_key: Option<String>,
}

impl HttpFunctionClient {
    pub fn new(config: FunctionsConfig) -> Result<Self, FunctionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let base_url = config
            .base_url
            .filter(|url| !url.trim().is_empty())
            .map(|url| {
                let normalized = format!("{}/", url.trim().trim_end_matches('/'));
                Url::parse(&normalized)
            })
            .transpose()?;
        Ok(Self {
            client: builder.build()?,
            base_url,
            api_key: config.api_key.filter(|key| !key.is_empty()),
        })
    }

    pub fn endpoint(&self, function: RemoteFunction) -> Result<Url, FunctionError> {
        let base = self.base_url.as_ref().ok_or(FunctionError::NotConfigured)?;
        Ok(base.join(function.name())?)
    }
}

#[async_trait]
impl FunctionInvoker for HttpFunctionClient {
    async fn invoke(&self, function: RemoteFunction, payload: Value) -> Result<Value, FunctionError> {
        let endpoint = self.endpoint(function)?;
        let mut request = self.client.post(endpoint).json(&json!({ "data": payload }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|err| {
            tracing::warn!(function = function.name(), %status, error = %err, "unreadable reply");
            FunctionError::MalformedReply {
                function: function.name(),
            }
        })?;
        let result = unwrap_callable_response(function, body);
        if let Err(err) = &result {
            tracing::warn!(function = function.name(), %status, error = %err, "function call failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_is_always_injected() {
        let business_id = Uuid::new_v4();
        let payload = scoped_payload(
            business_id,
            Some(json!({ "businessId": "someone-else", "month": "2024-05" })),
        )
        .unwrap();
        assert_eq!(payload["businessId"], json!(business_id.to_string()));
        assert_eq!(payload["month"], json!("2024-05"));
        assert_eq!(
            scoped_payload(business_id, None).unwrap(),
            json!({ "businessId": business_id.to_string() })
        );
        assert!(matches!(
            scoped_payload(business_id, Some(json!([1, 2]))),
            Err(FunctionError::InvalidPayload)
        ));
    }

    #[test]
    fn replies_are_unwrapped() {
        let ok = unwrap_callable_response(RemoteFunction::CashFlow, json!({ "result": { "net": 10 } }));
        assert_eq!(ok.unwrap(), json!({ "net": 10 }));

        let err = unwrap_callable_response(
            RemoteFunction::StockAudit,
            json!({ "error": { "message": "no products" } }),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "stockAudit failed: no products");

        assert!(matches!(
            unwrap_callable_response(RemoteFunction::AbcCurve, json!({ "data": 1 })),
            Err(FunctionError::MalformedReply { function: "abcCurve" })
        ));
    }

    #[test]
    fn endpoints_append_the_function_name() {
        let client = HttpFunctionClient::new(FunctionsConfig {
            base_url: Some("https://functions.example.test/api/".into()),
            api_key: None,
            timeout: None,
        })
        .unwrap();
        assert_eq!(
            client.endpoint(RemoteFunction::IncomeStatement).unwrap().as_str(),
            "https://functions.example.test/api/incomeStatement"
        );

        let unconfigured = HttpFunctionClient::new(FunctionsConfig {
            base_url: None,
            api_key: None,
            timeout: None,
        })
        .unwrap();
        assert!(matches!(
            unconfigured.endpoint(RemoteFunction::CashFlow),
            Err(FunctionError::NotConfigured)
        ));
    }

    #[test]
    fn remote_failures_map_to_upstream() {
        let err: ApiError = FunctionError::Remote {
            function: "cashFlow",
            message: "boom".into(),
        }
        .into();
        assert_eq!(err.code(), "UPSTREAM");
    }
}
