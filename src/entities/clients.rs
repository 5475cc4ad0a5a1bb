use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Subscriber identifier assigned by Phantom
    #[sea_orm(unique)]
    pub external_id: String,

    pub first_name: String,

    pub last_name: String,

    pub phone: String,

    pub address: String,

    pub city: String,

    /// `ContactStatus` variant name
    pub contact_status: Option<String>,

    pub notes: String,

    pub updated_at: String,

    pub last_contacted_by_user_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sales::Entity")]
    Sales,
}

impl Related<super::sales::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
