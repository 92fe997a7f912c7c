use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "quote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub business_id: Uuid,
    #[sea_orm(indexed)]
    pub customer_id: Uuid,
    pub description: String,
    pub vehicle: Option<String>,
    /// JSON array of `{ "kind": "SERVICE" | "PRODUCT", "itemId": uuid }`.
    pub items: Json,
    pub total_cents: i64,
    pub status: Status,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum Status {
    #[sea_orm(string_value = "requested")]
    Requested,
    #[sea_orm(string_value = "under-review")]
    UnderReview,
    #[sea_orm(string_value = "awaiting-customer")]
    AwaitingCustomer,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "returned-for-revision")]
    ReturnedForRevision,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Approved | Status::Cancelled)
    }
}

impl ActiveModelBehavior for ActiveModel {}
