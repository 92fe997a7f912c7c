use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{Duration, Utc};
use entity::account;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    prelude::DateTimeWithTimeZone, ActiveModelTrait, ActiveValue::Set, ColumnTrait,
    ConnectionTrait, DbErr, EntityTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "shop_session";
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }
}

/// Claims carry only the account; the role is re-resolved on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

pub fn issue_token(account_id: Uuid, config: &AuthConfig) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now();
    let exp = now
        .checked_add_signed(Duration::minutes(config.session_ttl_minutes))
        .unwrap_or(now)
        .timestamp() as usize;
    let claims = SessionClaims {
        sub: account_id,
        exp,
        iat: now.timestamp() as usize,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &config.encoding_key())
}

pub fn decode_token(
    token: &str,
    config: &AuthConfig,
) -> jsonwebtoken::errors::Result<SessionClaims> {
    jsonwebtoken::decode::<SessionClaims>(token, &config.decoding_key(), &Validation::default())
        .map(|data| data.claims)
}

/// Provider-style authentication failures surfaced to the user.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("{}", self.code())]
    InvalidEmail,
    #[error("{}", self.code())]
    InvalidCredential,
    #[error("{}", self.code())]
    WeakPassword,
    #[error("{}", self.code())]
    EmailAlreadyInUse,
    /// Valid login that is not linked to a business, employee or customer.
    #[error("{}", self.code())]
    NoProfile,
}

impl AuthFailure {
    pub fn code(self) -> &'static str {
        match self {
            AuthFailure::InvalidEmail => "auth/invalid-email",
            AuthFailure::InvalidCredential => "auth/invalid-credential",
            AuthFailure::WeakPassword => "auth/weak-password",
            AuthFailure::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthFailure::NoProfile => "auth/no-profile",
        }
    }

    /// pt-BR message shown to the user.
    pub fn localized_message(self) -> &'static str {
        match self {
            AuthFailure::InvalidEmail => "O e-mail informado não é válido.",
            AuthFailure::InvalidCredential => "E-mail ou senha incorretos.",
            AuthFailure::WeakPassword => "A senha deve ter pelo menos 6 caracteres.",
            AuthFailure::EmailAlreadyInUse => "Este e-mail já está cadastrado.",
            AuthFailure::NoProfile => "Nenhum cadastro encontrado para esta conta.",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Failure(#[from] AuthFailure),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

pub fn normalize_email(value: &str) -> Result<String, AuthFailure> {
    let trimmed = value.trim().to_lowercase();
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !valid || trimmed.chars().any(char::is_whitespace) {
        return Err(AuthFailure::InvalidEmail);
    }
    Ok(trimmed)
}

pub fn check_password_strength(password: &str) -> Result<(), AuthFailure> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthFailure::WeakPassword);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hash(err.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Create a login for a new business owner, employee or customer.
pub async fn create_account<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    password: &str,
) -> Result<account::Model, AuthError> {
    let email = normalize_email(email)?;
    check_password_strength(password)?;
    let existing = account::Entity::find()
        .filter(account::Column::Email.eq(email.clone()))
        .one(conn)
        .await?;
    if existing.is_some() {
        return Err(AuthFailure::EmailAlreadyInUse.into());
    }
    let now: DateTimeWithTimeZone = Utc::now().into();
    let model = account::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        password_hash: Set(hash_password(password)?),
        created_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(model)
}

pub async fn authenticate<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    password: &str,
) -> Result<account::Model, AuthError> {
    let email = normalize_email(email)?;
    let account = account::Entity::find()
        .filter(account::Column::Email.eq(email))
        .one(conn)
        .await?
        .ok_or(AuthFailure::InvalidCredential)?;
    if !verify_password(password, &account.password_hash) {
        return Err(AuthFailure::InvalidCredential.into());
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".into(),
            session_ttl_minutes: 30,
        }
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(
            normalize_email("  Owner@Shop.COM ").unwrap(),
            "owner@shop.com"
        );
        assert_eq!(normalize_email("no-at-sign"), Err(AuthFailure::InvalidEmail));
        assert_eq!(normalize_email("a@localhost"), Err(AuthFailure::InvalidEmail));
        assert_eq!(normalize_email("a b@shop.com"), Err(AuthFailure::InvalidEmail));
    }

    #[test]
    fn short_passwords_are_weak() {
        assert_eq!(check_password_strength("12345"), Err(AuthFailure::WeakPassword));
        assert!(check_password_strength("123456").is_ok());
    }

    #[test]
    fn failures_have_localized_messages() {
        assert_eq!(
            AuthFailure::EmailAlreadyInUse.localized_message(),
            "Este e-mail já está cadastrado."
        );
        assert_eq!(AuthFailure::WeakPassword.code(), "auth/weak-password");
    }

    #[test]
    fn display_is_the_provider_code() {
        for failure in [
            AuthFailure::InvalidEmail,
            AuthFailure::InvalidCredential,
            AuthFailure::WeakPassword,
            AuthFailure::EmailAlreadyInUse,
            AuthFailure::NoProfile,
        ] {
            assert_eq!(failure.to_string(), failure.code());
            assert!(failure.code().starts_with("auth/"));
        }
        assert_eq!(
            AuthError::from(AuthFailure::NoProfile).to_string(),
            "auth/no-profile"
        );
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("polish-and-wax").unwrap();
        assert!(verify_password("polish-and-wax", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("polish-and-wax", "not-a-hash"));
    }

    #[test]
    fn tokens_carry_the_account() {
        let account_id = Uuid::new_v4();
        let token = issue_token(account_id, &config()).unwrap();
        let claims = decode_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, account_id);
        let other = AuthConfig {
            jwt_secret: "other".into(),
            ..config()
        };
        assert!(decode_token(&token, &other).is_err());
    }
}
