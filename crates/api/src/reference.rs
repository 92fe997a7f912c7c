//! Read-only lookups against public Brazilian reference-data APIs.

use std::time::Duration;

use async_graphql::SimpleObject;
use platform_api::ApiError;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_POSTAL_CODE_API_URL: &str = "https://viacep.com.br/ws";
pub const DEFAULT_VEHICLE_API_URL: &str = "https://parallelum.com.br/fipe/api/v1";
pub const DEFAULT_TAX_ID_API_URL: &str = "https://brasilapi.com.br/api/cnpj/v1";

const POSTAL_CODE_DIGITS: usize = 8;
const TAX_ID_DIGITS: usize = 14;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("expected {expected} digits, got {actual}")]
    InvalidInput { expected: usize, actual: usize },
    #[error("`{0}` is not a numeric code")]
    InvalidCode(String),
    #[error("no record found")]
    NotFound,
    #[error("reference service answered {0}")]
    Status(StatusCode),
    #[error("reference lookup failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<ReferenceError> for ApiError {
    fn from(err: ReferenceError) -> Self {
        match err {
            ReferenceError::InvalidInput { .. } | ReferenceError::InvalidCode(_) => ApiError::validation(err.to_string()),
            ReferenceError::NotFound => ApiError::NotFound("reference record"),
            _ => ApiError::Upstream(err.to_string()),
        }
    }
}

pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

fn normalized(value: &str, expected: usize) -> Result<String, ReferenceError> {
    let digits = digits_only(value);
    if digits.len() != expected {
        return Err(ReferenceError::InvalidInput {
            expected,
            actual: digits.len(),
        });
    }
    Ok(digits)
}

/// FIPE codes are numeric; anything else would escape the URL path.
fn code_segment(value: &str) -> Result<String, ReferenceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(ReferenceError::InvalidCode(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
pub struct PostalAddress {
    pub postal_code: String,
    pub street: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
pub struct ReferenceOption {
    pub code: String,
    pub name: String,
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Eq)]
pub struct CompanyRegistration {
    pub tax_id: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
struct ViaCepReply {
    #[serde(default)]
    erro: Option<Value>,
    #[serde(default)]
    cep: String,
    #[serde(default)]
    logradouro: String,
    #[serde(default)]
    complemento: String,
    #[serde(default)]
    bairro: String,
    #[serde(default)]
    localidade: String,
    #[serde(default)]
    uf: String,
}

#[derive(Deserialize)]
struct FipeEntry {
    codigo: Value,
    nome: String,
}

#[derive(Deserialize)]
struct FipeModels {
    modelos: Vec<FipeEntry>,
}

#[derive(Deserialize)]
struct CnpjReply {
    cnpj: String,
    razao_social: String,
    nome_fantasia: Option<String>,
    logradouro: Option<String>,
    numero: Option<String>,
    municipio: Option<String>,
    uf: Option<String>,
    cep: Option<String>,
    descricao_situacao_cadastral: Option<String>,
}

impl From<FipeEntry> for ReferenceOption {
    fn from(entry: FipeEntry) -> Self {
        let code = match entry.codigo {
            Value::String(code) => code,
            other => other.to_string(),
        };
        Self {
            code,
            name: entry.nome,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Clone, Debug)]
pub struct ReferenceConfig {
    pub postal_code_url: String,
    pub vehicle_url: String,
    pub tax_id_url: String,
    pub timeout: Option<Duration>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            postal_code_url: DEFAULT_POSTAL_CODE_API_URL.into(),
            vehicle_url: DEFAULT_VEHICLE_API_URL.into(),
            tax_id_url: DEFAULT_TAX_ID_API_URL.into(),
            timeout: None,
        }
    }
}

pub struct ReferenceDataClient {
    client: reqwest::Client,
    config: ReferenceConfig,
}

impl ReferenceDataClient {
    pub fn new(config: ReferenceConfig) -> Result<Self, ReferenceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ReferenceError> {
        tracing::debug!(%url, "reference lookup");
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Err(ReferenceError::NotFound),
            status if !status.is_success() => Err(ReferenceError::Status(status)),
            _ => Ok(response.json::<T>().await?),
        }
    }

    pub fn postal_code_url(&self, postal_code: &str) -> Result<String, ReferenceError> {
        let digits = normalized(postal_code, POSTAL_CODE_DIGITS)?;
        Ok(format!(
            "{}/{}/json/",
            self.config.postal_code_url.trim_end_matches('/'),
            digits
        ))
    }

    pub fn tax_id_url(&self, tax_id: &str) -> Result<String, ReferenceError> {
        let digits = normalized(tax_id, TAX_ID_DIGITS)?;
        Ok(format!(
            "{}/{}",
            self.config.tax_id_url.trim_end_matches('/'),
            digits
        ))
    }

    fn vehicle_url(&self, path: &str) -> String {
        format!("{}/carros/{}", self.config.vehicle_url.trim_end_matches('/'), path)
    }

    pub async fn lookup_postal_code(&self, postal_code: &str) -> Result<PostalAddress, ReferenceError> {
        let url = self.postal_code_url(postal_code)?;
        let reply: ViaCepReply = self.get_json(url).await?;
        if reply.erro.is_some_and(|flag| flag != Value::Bool(false)) {
            return Err(ReferenceError::NotFound);
        }
        Ok(PostalAddress {
            postal_code: digits_only(&reply.cep),
            street: reply.logradouro,
            complement: reply.complemento,
            neighborhood: reply.bairro,
            city: reply.localidade,
            state: reply.uf,
        })
    }

    pub async fn vehicle_makes(&self) -> Result<Vec<ReferenceOption>, ReferenceError> {
        let entries: Vec<FipeEntry> = self.get_json(self.vehicle_url("marcas")).await?;
        Ok(entries.into_iter().map(ReferenceOption::from).collect())
    }

    pub async fn vehicle_models(&self, make: &str) -> Result<Vec<ReferenceOption>, ReferenceError> {
        let make = code_segment(make)?;
        let reply: FipeModels = self
            .get_json(self.vehicle_url(&format!("marcas/{make}/modelos")))
            .await?;
        Ok(reply.modelos.into_iter().map(ReferenceOption::from).collect())
    }

    pub async fn vehicle_years(
        &self,
        make: &str,
        model: &str,
    ) -> Result<Vec<ReferenceOption>, ReferenceError> {
        let make = code_segment(make)?;
        let model = code_segment(model)?;
        let entries: Vec<FipeEntry> = self
            .get_json(self.vehicle_url(&format!("marcas/{make}/modelos/{model}/anos")))
            .await?;
        Ok(entries.into_iter().map(ReferenceOption::from).collect())
    }

    pub async fn lookup_tax_id(&self, tax_id: &str) -> Result<CompanyRegistration, ReferenceError> {
        let url = self.tax_id_url(tax_id)?;
        let reply: CnpjReply = self.get_json(url).await?;
        Ok(CompanyRegistration {
            tax_id: digits_only(&reply.cnpj),
            legal_name: reply.razao_social,
            trade_name: non_empty(reply.nome_fantasia),
            street: non_empty(reply.logradouro),
            number: non_empty(reply.numero),
            city: non_empty(reply.municipio),
            state: non_empty(reply.uf),
            postal_code: non_empty(reply.cep).map(|cep| digits_only(&cep)),
            status: non_empty(reply.descricao_situacao_cadastral),
        })
    }
}
