use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "invoice_line")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub business_id: Uuid,
    #[sea_orm(indexed)]
    pub service_order_id: Uuid,
    pub item_kind: ItemKind,
    pub item_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::service_order::Entity",
        from = "Column::ServiceOrderId",
        to = "super::service_order::Column::Id",
        on_delete = "Cascade"
    )]
    ServiceOrder,
}

impl Related<super::service_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceOrder.def()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
pub enum ItemKind {
    #[sea_orm(string_value = "SERVICE")]
    Service,
    #[sea_orm(string_value = "PRODUCT")]
    Product,
}

impl ActiveModelBehavior for ActiveModel {}
