use async_graphql::{Context, InputObject, Object, SimpleObject, ID};
use platform_api::ApiError;
use tracing::{info_span, Instrument};

use super::{database, gql, nodes::InspectionNode, object_storage, parse_uuid, require};
use crate::{
    db_err,
    identity::{Permission, Principal},
    inspection::{
        default_checklist, find_for_appointment, record_phase, ChecklistAnswer, ChecklistEntry,
        DamageMarkerInput, InspectionMode, Phase, PhaseRecord,
    },
};

/// What the inspection screen should show for an appointment.
#[derive(Clone, Debug, SimpleObject)]
pub struct InspectionView {
    pub mode: InspectionMode,
    pub inspection: Option<InspectionNode>,
    /// Starting checklist when nothing has been recorded yet.
    pub default_checklist: Vec<ChecklistEntry>,
}

#[derive(Clone, Debug, InputObject)]
pub struct InspectionPhaseInput {
    pub appointment_id: ID,
    /// Base64 PNG data URL captured from the signature pad.
    pub signature: String,
    #[graphql(default)]
    pub checklist: Vec<ChecklistAnswer>,
    #[graphql(default)]
    pub markers: Vec<DamageMarkerInput>,
    pub notes: Option<String>,
}

#[derive(Default)]
pub struct InspectionQuery;

#[Object]
impl InspectionQuery {
    async fn inspection(
        &self,
        ctx: &Context<'_>,
        appointment_id: ID,
        #[graphql(default)] check_out_requested: bool,
    ) -> async_graphql::Result<InspectionView> {
        let principal = require(ctx, Permission::Inspections)?;
        let db = database(ctx)?;
        let existing =
            find_for_appointment(db.as_ref(), principal.business_id, parse_uuid(&appointment_id)?)
                .await
                .map_err(|err| gql(db_err(err)))?;
        let mode = InspectionMode::resolve(existing.as_ref(), check_out_requested);
        Ok(InspectionView {
            mode,
            inspection: existing.map(InspectionNode::from),
            default_checklist: default_checklist(),
        })
    }
}

async fn record(
    ctx: &Context<'_>,
    principal: Principal,
    phase: Phase,
    input: InspectionPhaseInput,
) -> async_graphql::Result<InspectionNode> {
    let db = database(ctx)?;
    let storage = object_storage(ctx)?;
    let appointment_id = parse_uuid(&input.appointment_id)?;
    let record = PhaseRecord {
        business_id: principal.business_id,
        appointment_id,
        signature_data_url: input.signature,
        checklist: input.checklist,
        markers: input.markers,
        notes: input.notes,
        recorded_by: Some(principal.employee_id.unwrap_or(principal.account_id)),
    };
    let span = info_span!(
        "shop.inspection.record",
        phase = phase.slug(),
        appointment_id = %appointment_id,
    );
    let model = record_phase(db.as_ref(), storage.as_ref(), phase, record)
        .instrument(span)
        .await
        .map_err(|err| gql(ApiError::from(err)))?;
    Ok(model.into())
}

#[derive(Default)]
pub struct InspectionMutation;

#[Object]
impl InspectionMutation {
    async fn check_in(
        &self,
        ctx: &Context<'_>,
        input: InspectionPhaseInput,
    ) -> async_graphql::Result<InspectionNode> {
        let principal = require(ctx, Permission::Inspections)?;
        record(ctx, principal, Phase::CheckIn, input).await
    }

    async fn check_out(
        &self,
        ctx: &Context<'_>,
        input: InspectionPhaseInput,
    ) -> async_graphql::Result<InspectionNode> {
        let principal = require(ctx, Permission::Inspections)?;
        record(ctx, principal, Phase::CheckOut, input).await
    }
}
