use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "addons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    pub package_id: Uuid,
    pub name: String,
    pub price: i64,
    pub addon_type: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::packages::Entity",
        from = "Column::PackageId",
        to = "super::packages::Column::Id"
    )]
    Packages,
    #[sea_orm(has_many = "super::booking_addons::Entity")]
    BookingAddons,
}

impl Related<super::packages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Packages.def()
    }
}

impl Related<super::booking_addons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingAddons.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
