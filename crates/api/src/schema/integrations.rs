//! Public reference-data lookups used by the sign-up and appointment forms.

use async_graphql::{Context, Object};
use platform_api::ApiError;
use tracing::{info_span, Instrument};

use super::{gql, reference_client};
use crate::reference::{CompanyRegistration, PostalAddress, ReferenceError, ReferenceOption};

fn lookup_error(err: ReferenceError) -> async_graphql::Error {
    tracing::warn!(error = %err, "reference lookup failed");
    gql(ApiError::from(err))
}

#[derive(Default)]
pub struct IntegrationsQuery;

#[Object]
impl IntegrationsQuery {
    async fn lookup_postal_code(
        &self,
        ctx: &Context<'_>,
        postal_code: String,
    ) -> async_graphql::Result<PostalAddress> {
        let client = reference_client(ctx)?;
        client
            .lookup_postal_code(&postal_code)
            .instrument(info_span!("shop.reference.postal_code"))
            .await
            .map_err(lookup_error)
    }

    async fn vehicle_makes(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<ReferenceOption>> {
        let client = reference_client(ctx)?;
        client
            .vehicle_makes()
            .instrument(info_span!("shop.reference.vehicle_makes"))
            .await
            .map_err(lookup_error)
    }

    async fn vehicle_models(
        &self,
        ctx: &Context<'_>,
        make: String,
    ) -> async_graphql::Result<Vec<ReferenceOption>> {
        let client = reference_client(ctx)?;
        client
            .vehicle_models(&make)
            .instrument(info_span!("shop.reference.vehicle_models", %make))
            .await
            .map_err(lookup_error)
    }

    async fn vehicle_years(
        &self,
        ctx: &Context<'_>,
        make: String,
        model: String,
    ) -> async_graphql::Result<Vec<ReferenceOption>> {
        let client = reference_client(ctx)?;
        client
            .vehicle_years(&make, &model)
            .instrument(info_span!("shop.reference.vehicle_years", %make, %model))
            .await
            .map_err(lookup_error)
    }

    async fn lookup_tax_id(
        &self,
        ctx: &Context<'_>,
        tax_id: String,
    ) -> async_graphql::Result<CompanyRegistration> {
        let client = reference_client(ctx)?;
        client
            .lookup_tax_id(&tax_id)
            .instrument(info_span!("shop.reference.tax_id"))
            .await
            .map_err(lookup_error)
    }
}
