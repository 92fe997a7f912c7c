//! Two-phase vehicle inspection: check-in when the car arrives, check-out on delivery.

use async_graphql::{Enum, InputObject, SimpleObject};
use chrono::Utc;
use entity::{appointment, inspection};
use platform_api::ApiError;
use sea_orm::{
    prelude::DateTimeWithTimeZone, ActiveModelTrait, ActiveValue::Set, ColumnTrait,
    ConnectionTrait, DbErr, EntityTrait, QueryFilter,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::storage::{decode_data_url, ObjectPath, ObjectStorage, StorageError};

pub const INSPECTIONS_FEATURE: &str = "inspections";
pub const SIGNATURE_CONTENT_TYPE: &str = "image/png";

/// `(key, label)` pairs every new inspection starts with.
pub const DEFAULT_CHECKLIST: &[(&str, &str)] = &[
    ("tires", "Pneus"),
    ("headlights", "Faróis"),
    ("mirrors", "Retrovisores"),
    ("windshield", "Para-brisa"),
    ("paint", "Pintura"),
    ("upholstery", "Estofados"),
    ("floor_mats", "Tapetes"),
    ("documents", "Documentos"),
    ("spare_tire", "Estepe"),
    ("jack_and_wrench", "Macaco e chave de roda"),
];

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum InspectionMode {
    #[graphql(name = "CHECK_IN")]
    CheckIn,
    #[graphql(name = "CHECK_OUT")]
    CheckOut,
    #[graphql(name = "VIEW_ONLY")]
    ViewOnly,
}

impl InspectionMode {
    pub fn resolve(existing: Option<&inspection::Model>, check_out_requested: bool) -> Self {
        match existing {
            None => InspectionMode::CheckIn,
            Some(record) if record.checked_out_at.is_none() && check_out_requested => {
                InspectionMode::CheckOut
            }
            Some(_) => InspectionMode::ViewOnly,
        }
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[graphql(name = "CHECK_IN")]
    CheckIn,
    #[graphql(name = "CHECK_OUT")]
    CheckOut,
}

impl Phase {
    pub fn slug(self) -> &'static str {
        match self {
            Phase::CheckIn => "check-in",
            Phase::CheckOut => "check-out",
        }
    }

    pub fn signature_filename(self) -> String {
        format!("{}-signature.png", self.slug())
    }
}

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCondition {
    #[graphql(name = "OK")]
    Ok,
    #[graphql(name = "DAMAGED")]
    Damaged,
    #[graphql(name = "MISSING")]
    Missing,
    #[graphql(name = "NOT_APPLICABLE")]
    NotApplicable,
}

#[derive(SimpleObject, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistEntry {
    pub key: String,
    pub label: String,
    pub check_in: Option<ItemCondition>,
    pub check_out: Option<ItemCondition>,
    pub note: Option<String>,
}

#[derive(InputObject, Clone, Debug)]
pub struct ChecklistAnswer {
    pub key: String,
    pub condition: ItemCondition,
    pub note: Option<String>,
}

/// A point on the vehicle diagram, in percent of the image size.
#[derive(SimpleObject, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageMarker {
    pub x_pct: f64,
    pub y_pct: f64,
    pub label: Option<String>,
    pub phase: Phase,
}

#[derive(InputObject, Clone, Debug)]
pub struct DamageMarkerInput {
    pub x_pct: f64,
    pub y_pct: f64,
    pub label: Option<String>,
}

impl DamageMarker {
    /// Stamp an input marker with its phase, rejecting points off the image.
    pub fn from_input(input: &DamageMarkerInput, phase: Phase) -> Result<Self, InspectionError> {
        let marker = Self {
            x_pct: input.x_pct,
            y_pct: input.y_pct,
            label: input
                .label
                .as_ref()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            phase,
        };
        marker.validate()?;
        Ok(marker)
    }

    pub fn validate(&self) -> Result<(), InspectionError> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if in_range(self.x_pct) && in_range(self.y_pct) {
            Ok(())
        } else {
            Err(InspectionError::MarkerOutOfRange)
        }
    }
}

#[derive(Debug, Error)]
pub enum InspectionError {
    #[error("a customer signature is required")]
    MissingSignature,
    #[error("signature is not a valid image: {0}")]
    InvalidSignature(StorageError),
    #[error("signature must be a PNG image, got `{0}`")]
    UnsupportedSignatureType(String),
    #[error("unknown checklist item `{0}`")]
    UnknownChecklistItem(String),
    #[error("damage markers must lie within the vehicle image")]
    MarkerOutOfRange,
    #[error("appointment not found")]
    AppointmentNotFound,
    #[error("vehicle already checked in")]
    AlreadyCheckedIn,
    #[error("vehicle has not been checked in")]
    NotCheckedIn,
    #[error("inspection already completed")]
    AlreadyCompleted,
    #[error("signature upload failed: {0}")]
    Storage(StorageError),
    #[error(transparent)]
    Db(#[from] DbErr),
    #[error(transparent)]
    Encoding(#[from] serde_json::Error),
}

impl From<InspectionError> for ApiError {
    fn from(err: InspectionError) -> Self {
        match err {
            InspectionError::MissingSignature
            | InspectionError::InvalidSignature(_)
            | InspectionError::UnsupportedSignatureType(_)
            | InspectionError::UnknownChecklistItem(_)
            | InspectionError::MarkerOutOfRange => ApiError::validation(err.to_string()),
            InspectionError::AppointmentNotFound => ApiError::NotFound("appointment"),
            InspectionError::AlreadyCheckedIn
            | InspectionError::NotCheckedIn
            | InspectionError::AlreadyCompleted => ApiError::Conflict(err.to_string()),
            InspectionError::Storage(_) => ApiError::Upstream(err.to_string()),
            InspectionError::Db(db) => ApiError::internal(db.into()),
            InspectionError::Encoding(e) => ApiError::internal(e.into()),
        }
    }
}

/// Everything captured on the inspection screen for one phase.
#[derive(Clone, Debug)]
pub struct PhaseRecord {
    pub business_id: Uuid,
    pub appointment_id: Uuid,
    pub signature_data_url: String,
    pub checklist: Vec<ChecklistAnswer>,
    pub markers: Vec<DamageMarkerInput>,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
}

pub fn default_checklist() -> Vec<ChecklistEntry> {
    DEFAULT_CHECKLIST
        .iter()
        .map(|(key, label)| ChecklistEntry {
            key: (*key).to_string(),
            label: (*label).to_string(),
            check_in: None,
            check_out: None,
            note: None,
        })
        .collect()
}

/// Each answer is matched to its entry by key; unanswered items keep their value.
pub fn apply_answers(
    entries: &mut [ChecklistEntry],
    answers: &[ChecklistAnswer],
    phase: Phase,
) -> Result<(), InspectionError> {
    for answer in answers {
        let entry = entries
            .iter_mut()
            .find(|entry| entry.key == answer.key)
            .ok_or_else(|| InspectionError::UnknownChecklistItem(answer.key.clone()))?;
        match phase {
            Phase::CheckIn => entry.check_in = Some(answer.condition),
            Phase::CheckOut => entry.check_out = Some(answer.condition),
        }
        if let Some(note) = answer.note.as_ref().filter(|n| !n.trim().is_empty()) {
            entry.note = Some(note.trim().to_string());
        }
    }
    Ok(())
}

pub fn checklist_of(record: &inspection::Model) -> Result<Vec<ChecklistEntry>, InspectionError> {
    Ok(serde_json::from_value(record.checklist.clone())?)
}

pub fn markers_of(record: &inspection::Model) -> Result<Vec<DamageMarker>, InspectionError> {
    Ok(serde_json::from_value(record.markers.clone())?)
}

pub async fn find_for_appointment<C: ConnectionTrait>(
    conn: &C,
    business_id: Uuid,
    appointment_id: Uuid,
) -> Result<Option<inspection::Model>, DbErr> {
    inspection::Entity::find()
        .filter(inspection::Column::BusinessId.eq(business_id))
        .filter(inspection::Column::AppointmentId.eq(appointment_id))
        .one(conn)
        .await
}

/// Validate, upload the signature, then insert (check-in) or update (check-out).
pub async fn record_phase<C, S>(
    conn: &C,
    storage: &S,
    phase: Phase,
    record: PhaseRecord,
) -> Result<inspection::Model, InspectionError>
where
    C: ConnectionTrait,
    S: ObjectStorage + ?Sized,
{
    let signature = signature_png(&record.signature_data_url)?;
    let new_markers = record
        .markers
        .iter()
        .map(|input| DamageMarker::from_input(input, phase))
        .collect::<Result<Vec<_>, _>>()?;

    let existing = find_for_appointment(conn, record.business_id, record.appointment_id).await?;
    let now: DateTimeWithTimeZone = Utc::now().into();

    match phase {
        Phase::CheckIn => {
            if existing.is_some() {
                return Err(InspectionError::AlreadyCheckedIn);
            }
            let appointment = appointment::Entity::find_by_id(record.appointment_id)
                .filter(appointment::Column::BusinessId.eq(record.business_id))
                .one(conn)
                .await?;
            if appointment.is_none() {
                return Err(InspectionError::AppointmentNotFound);
            }
            let mut checklist = default_checklist();
            apply_answers(&mut checklist, &record.checklist, phase)?;
            let url = upload_signature(storage, record.appointment_id, phase, signature).await?;

            let model = inspection::ActiveModel {
                id: Set(Uuid::new_v4()),
                business_id: Set(record.business_id),
                appointment_id: Set(record.appointment_id),
                checklist: Set(serde_json::to_value(&checklist)?),
                markers: Set(serde_json::to_value(&new_markers)?),
                check_in_notes: Set(clean_notes(record.notes)),
                check_out_notes: Set(None),
                check_in_signature_url: Set(url),
                check_out_signature_url: Set(None),
                checked_in_at: Set(now),
                checked_out_at: Set(None),
                created_by: Set(record.recorded_by),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?;
            tracing::info!(appointment_id = %record.appointment_id, "vehicle checked in");
            Ok(model)
        }
        Phase::CheckOut => {
            let existing = existing.ok_or(InspectionError::NotCheckedIn)?;
            if existing.checked_out_at.is_some() {
                return Err(InspectionError::AlreadyCompleted);
            }
            let mut checklist = checklist_of(&existing)?;
            apply_answers(&mut checklist, &record.checklist, phase)?;
            let mut markers = markers_of(&existing)?;
            markers.extend(new_markers);
            let url = upload_signature(storage, record.appointment_id, phase, signature).await?;

            let mut active: inspection::ActiveModel = existing.into();
            active.checklist = Set(serde_json::to_value(&checklist)?);
            active.markers = Set(serde_json::to_value(&markers)?);
            active.check_out_notes = Set(clean_notes(record.notes));
            active.check_out_signature_url = Set(Some(url));
            active.checked_out_at = Set(Some(now));
            active.updated_at = Set(now);
            let model = active.update(conn).await?;
            tracing::info!(appointment_id = %record.appointment_id, "vehicle checked out");
            Ok(model)
        }
    }
}

/// Decode the signature pad's data URL; only PNG is stored.
pub fn signature_png(data_url: &str) -> Result<Vec<u8>, InspectionError> {
    if data_url.trim().is_empty() {
        return Err(InspectionError::MissingSignature);
    }
    let decoded = decode_data_url(data_url).map_err(InspectionError::InvalidSignature)?;
    if !decoded.content_type.eq_ignore_ascii_case(SIGNATURE_CONTENT_TYPE) {
        return Err(InspectionError::UnsupportedSignatureType(decoded.content_type));
    }
    Ok(decoded.bytes)
}

async fn upload_signature<S>(
    storage: &S,
    appointment_id: Uuid,
    phase: Phase,
    bytes: Vec<u8>,
) -> Result<String, InspectionError>
where
    S: ObjectStorage + ?Sized,
{
    let path = ObjectPath::new(INSPECTIONS_FEATURE, appointment_id, phase.signature_filename())
        .map_err(InspectionError::Storage)?;
    storage
        .upload(&path, bytes, SIGNATURE_CONTENT_TYPE)
        .await
        .map_err(InspectionError::Storage)
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}
