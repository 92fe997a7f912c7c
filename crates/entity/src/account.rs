use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "account")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Business,
    Employee,
    Customer,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Business => Entity::has_one(super::business::Entity).into(),
            Relation::Employee => Entity::has_many(super::employee::Entity).into(),
            Relation::Customer => Entity::has_many(super::customer::Entity).into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}
