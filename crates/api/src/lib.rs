//! Domain components and the GraphQL surface of the detailing shop suite.

pub mod auth;
pub mod board;
pub mod catalog;
pub mod functions;
pub mod identity;
pub mod inspection;
pub mod reference;
pub mod repo;
pub mod schema;
pub mod seed;
pub mod storage;
pub mod workflow;

use platform_api::ApiError;
use sea_orm::DbErr;

pub(crate) fn db_err(err: DbErr) -> ApiError {
    ApiError::internal(err.into())
}
