use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "inspection")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub business_id: Uuid,
    #[sea_orm(unique)]
    pub appointment_id: Uuid,
    /// JSON array of checklist items with per-phase conditions.
    pub checklist: Json,
    /// JSON array of `{ "xPct", "yPct", "label" }` damage markers.
    pub markers: Json,
    pub check_in_notes: Option<String>,
    pub check_out_notes: Option<String>,
    pub check_in_signature_url: String,
    pub check_out_signature_url: Option<String>,
    pub checked_in_at: DateTimeWithTimeZone,
    pub checked_out_at: Option<DateTimeWithTimeZone>,
    pub created_by: Option<Uuid>,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::appointment::Entity",
        from = "Column::AppointmentId",
        to = "super::appointment::Column::Id",
        on_delete = "Cascade"
    )]
    Appointment,
}

impl Related<super::appointment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appointment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
